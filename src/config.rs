//! Configuration types: the TOML run configuration, invocation flags and
//! download timing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest accepted `delay_file_download_seconds`; lower values are ignored.
pub const MIN_DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Timing and retry configuration for download batches.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Number of retry rounds per batch.
    pub max_rounds: u32,
    /// Maximum wait for a UI element to appear and become visible.
    pub element_timeout: Duration,
    /// Pause after navigating to a file before looking for the loaded marker.
    pub settle_delay: Duration,
    /// Interval between staging directory checks.
    pub poll_interval: Duration,
    /// Total time a saved file may take to land in staging.
    pub download_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            element_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(2),
            poll_interval: Duration::from_millis(500),
            download_timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl DownloadConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of retry rounds.
    #[must_use]
    pub const fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Sets the element wait timeout.
    #[must_use]
    pub const fn with_element_timeout(mut self, timeout: Duration) -> Self {
        self.element_timeout = timeout;
        self
    }

    /// Sets the post-navigation settle delay.
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the staging poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the download timeout.
    #[must_use]
    pub const fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Number of staging checks that fit in the download timeout, rounded up.
    #[must_use]
    pub fn poll_iterations(&self) -> u64 {
        let interval = self.poll_interval.as_millis().max(1);
        let iterations = self.download_timeout.as_millis().div_ceil(interval);
        u64::try_from(iterations).unwrap_or(u64::MAX).max(1)
    }
}

/// A team whose projects are backed up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
}

/// One account to back up.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Login e-mail used on the sign-in form.
    pub login: String,
    /// Password used on the sign-in form.
    pub password: String,
    /// Personal access token for the catalog API.
    pub token: String,
    /// Teams whose projects should be saved.
    #[serde(default)]
    pub teams: Vec<Team>,
    /// Whether to also save qualifying files from the "recent files" view.
    #[serde(default)]
    pub download_recent: bool,
}

impl fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserConfig")
            .field("login", &self.login)
            .field("password", &"********")
            .field("token", &"********")
            .field("teams", &self.teams)
            .field("download_recent", &self.download_recent)
            .finish()
    }
}

/// Outbound mail settings for the end-of-run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Sender address; defaults to `user@host`.
    pub from: Option<String>,
    /// Recipient addresses. An empty list disables mail delivery.
    #[serde(default)]
    pub receivers: Vec<String>,
    /// Sendmail-compatible program that reads a message on stdin.
    #[serde(default = "default_mail_program")]
    pub program: String,
    /// Arguments passed to `program`.
    #[serde(default = "default_mail_args")]
    pub args: Vec<String>,
}

fn default_mail_program() -> String {
    "/usr/sbin/sendmail".to_string()
}

fn default_mail_args() -> Vec<String> {
    vec!["-t".to_string(), "-i".to_string()]
}

/// Where to reach the WebDriver server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDriverConfig {
    #[serde(default = "default_webdriver_url")]
    pub url: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

const fn default_headless() -> bool {
    true
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: default_webdriver_url(),
            headless: default_headless(),
        }
    }
}

const fn default_hours_for_partial_backup() -> u64 {
    48
}

const fn default_days_for_auto_incremental_backup() -> u64 {
    8
}

/// The run configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Root of every destination directory; staging lives in `temp` below it.
    pub base_folder: PathBuf,
    /// Accounts to back up, in order.
    pub users: Vec<UserConfig>,
    /// Age limit for partial backups.
    #[serde(default = "default_hours_for_partial_backup")]
    pub hours_for_partial_backup: u64,
    /// Age limit used by `--auto-incremental` on the weekly full-backup day.
    #[serde(default = "default_days_for_auto_incremental_backup")]
    pub days_for_auto_incremental_backup: u64,
    /// Download timeout override in seconds.
    pub delay_file_download_seconds: Option<u64>,
    /// Report delivery; reports go to stdout when absent.
    pub mail: Option<MailConfig>,
    #[serde(default)]
    pub webdriver: WebDriverConfig,
}

impl BackupConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this schema or
    /// fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Resolves the configuration path.
    ///
    /// `FIGMA_BACKUP_CONFIG` wins, then `./config.toml` if it exists, then
    /// the per-user config directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("FIGMA_BACKUP_CONFIG") {
            return PathBuf::from(path);
        }
        let local = PathBuf::from("config.toml");
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("figma-backup")
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if self.base_folder.as_os_str().is_empty() {
            return Err(Error::Config("base_folder must not be empty".to_string()));
        }
        if let Some(user) = self.users.iter().find(|u| u.login.trim().is_empty()) {
            return Err(Error::Config(format!(
                "user with empty login (teams: {})",
                user.teams.len()
            )));
        }
        Ok(())
    }

    /// Shared scratch directory the browser saves into.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.base_folder.join("temp")
    }

    /// Download timeout, honouring the configured override when it is at
    /// least [`MIN_DOWNLOAD_TIMEOUT_SECS`].
    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        match self.delay_file_download_seconds {
            Some(secs) if secs >= MIN_DOWNLOAD_TIMEOUT_SECS => Duration::from_secs(secs),
            Some(secs) => {
                log::warn!(
                    "delay_file_download_seconds = {secs} is below {MIN_DOWNLOAD_TIMEOUT_SECS}, using default"
                );
                DownloadConfig::default().download_timeout
            }
            None => DownloadConfig::default().download_timeout,
        }
    }

    /// Download configuration derived from this file.
    #[must_use]
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig::new().with_download_timeout(self.download_timeout())
    }
}

/// Boolean invocation flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub verbose: bool,
    pub debug: bool,
    /// Download everything regardless of modification time.
    pub all: bool,
    /// Widen the window on the weekly full-backup day.
    pub auto_incremental: bool,
    pub help: bool,
}

impl RunOptions {
    /// Parses flags, returning the options and every argument it did not
    /// recognise. Parsing happens before logging is set up, so reporting
    /// the leftovers is up to the caller.
    #[must_use]
    pub fn from_args<I, S>(args: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();
        let mut unknown = Vec::new();
        for arg in args {
            match arg.as_ref() {
                "--verbose" => options.verbose = true,
                "--debug" => options.debug = true,
                "--all" => options.all = true,
                "--auto-incremental" => options.auto_incremental = true,
                "-h" | "--help" => options.help = true,
                other => unknown.push(other.to_string()),
            }
        }
        (options, unknown)
    }

    /// Log filter matching the requested verbosity.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}
