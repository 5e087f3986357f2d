//! The run driver: one session per user, teams first, then recent files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Datelike, Local, Utc, Weekday};
use tokio::time::Instant;
use uuid::Uuid;

use crate::automation::{AutomationChannel, SessionFactory, selectors, wait_and_get, wait_and_get_all};
use crate::catalog::{Catalog, resolve_links};
use crate::config::{BackupConfig, DownloadConfig, RunOptions, UserConfig};
use crate::download::{DownloadTask, Downloader};
use crate::error::{Error, Result};
use crate::format::format_duration;
use crate::fs::{FileSystem, folder_path};
use crate::recent::parse_tile;
use crate::report::{Notification, Report, compose_notification};
use crate::saver::TitleRegistry;
use crate::window::{BackupWindow, RunMode};

/// Folder below the user's directory that receives recent files.
pub const RECENT_FOLDER: &str = "Recent";

const RECENT_PAGE_SETTLE: Duration = Duration::from_secs(2);
const TILE_SELECT_DELAY: Duration = Duration::from_millis(5);

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub reports: Vec<Report>,
    pub elapsed: Duration,
    pub window: BackupWindow,
}

impl RunSummary {
    #[must_use]
    pub fn notification(&self) -> Notification {
        compose_notification(&self.reports, self.elapsed, self.window, self.run_id)
    }
}

/// Backs up every configured user, one after another.
pub struct Backuper<K: Catalog, S: SessionFactory, F: FileSystem> {
    config: BackupConfig,
    options: RunOptions,
    download: DownloadConfig,
    catalog: K,
    sessions: S,
    fs: F,
}

impl<K: Catalog, S: SessionFactory, F: FileSystem> Backuper<K, S, F> {
    pub fn new(config: BackupConfig, options: RunOptions, catalog: K, sessions: S, fs: F) -> Self {
        let download = config.download_config();
        Self {
            config,
            options,
            download,
            catalog,
            sessions,
            fs,
        }
    }

    /// Overrides the timings derived from the configuration file.
    #[must_use]
    pub fn with_download_config(mut self, download: DownloadConfig) -> Self {
        self.download = download;
        self
    }

    /// Window for a run started on `weekday`.
    #[must_use]
    pub fn window(&self, weekday: Weekday) -> BackupWindow {
        BackupWindow::compute(
            RunMode::from_options(&self.options),
            weekday,
            self.config.hours_for_partial_backup,
            self.config.days_for_auto_incremental_backup,
        )
    }

    /// Runs the backup for every user.
    ///
    /// Per-user failures end up in that user's report; only a staging
    /// directory that cannot be created fails the run.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the staging directory cannot be created.
    pub async fn run(&self, now: DateTime<Local>) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let window = self.window(now.weekday());
        log::info!(
            "run {run_id}: {} user(s), window {:?}",
            self.config.users.len(),
            window
        );

        let staging = self.config.staging_dir();
        self.fs.create_dir_all(&staging).await?;

        let mut registry = TitleRegistry::new();
        let mut reports = Vec::with_capacity(self.config.users.len());
        for user in &self.config.users {
            let report = self
                .backup_user(user, window, now.with_timezone(&Utc), &staging, &mut registry)
                .await;
            reports.push(report);
        }

        let elapsed = started.elapsed();
        log::info!("run {run_id} finished in {}", format_duration(elapsed));
        Ok(RunSummary {
            run_id,
            reports,
            elapsed,
            window,
        })
    }

    async fn backup_user(
        &self,
        user: &UserConfig,
        window: BackupWindow,
        now: DateTime<Utc>,
        staging: &Path,
        registry: &mut TitleRegistry,
    ) -> Report {
        let started = Instant::now();
        let mut report = Report::new(&user.login, self.options.verbose);
        log::info!("backup for {} started", user.login);

        match self.sessions.open(staging).await {
            Err(e) => {
                log::error!("cannot open a browser session for {}: {e}", user.login);
                report.record_user_failure(format!("{}: cannot open browser session: {e}", user.login));
            }
            Ok(channel) => {
                match login(&channel, user, self.download.element_timeout).await {
                    Err(e) => {
                        log::error!("{e}");
                        report.record_user_failure(e.to_string());
                    }
                    Ok(()) => {
                        let mut session = UserSession {
                            backuper: self,
                            channel: &channel,
                            user,
                            staging,
                            registry: &mut *registry,
                            report: &mut report,
                        };
                        session.backup(window, now).await;
                    }
                }
                if let Err(e) = self.sessions.close(channel).await {
                    log::warn!("closing the session for {} failed: {e}", user.login);
                }
            }
        }

        let total = format_duration(started.elapsed());
        log::info!("backup for {} done in {total}", user.login);
        report.push_statistic(format!("Total time used: {total}"));
        report
    }
}

/// State for one logged-in user.
struct UserSession<'a, K: Catalog, S: SessionFactory, F: FileSystem> {
    backuper: &'a Backuper<K, S, F>,
    channel: &'a S::Channel,
    user: &'a UserConfig,
    staging: &'a Path,
    registry: &'a mut TitleRegistry,
    report: &'a mut Report,
}

impl<K: Catalog, S: SessionFactory, F: FileSystem> UserSession<'_, K, S, F> {
    async fn backup(&mut self, window: BackupWindow, now: DateTime<Utc>) {
        if !self.user.teams.is_empty() {
            if let Err(e) = self.backup_teams(window, now).await {
                log::error!("{}: team backup aborted: {e}", self.user.login);
                self.report
                    .record_user_failure(format!("{}: cannot list files: {e}", self.user.login));
            }
        }

        if self.user.download_recent {
            if let Err(e) = self.backup_recent(window).await {
                log::error!("{}: recent files backup aborted: {e}", self.user.login);
                self.report
                    .record_user_failure(format!("{}: cannot read recent files: {e}", self.user.login));
            }
        }
    }

    fn user_folder(&self, parts: &[&str]) -> PathBuf {
        let mut all = Vec::with_capacity(parts.len() + 1);
        all.push(self.user.login.as_str());
        all.extend_from_slice(parts);
        folder_path(&self.backuper.config.base_folder, &all)
    }

    async fn backup_teams(&mut self, window: BackupWindow, now: DateTime<Utc>) -> Result<()> {
        let links = resolve_links(
            &self.backuper.catalog,
            &self.user.teams,
            &self.user.token,
            window,
            now,
        )
        .await?;
        log::info!("{}: {} file(s) from teams qualify", self.user.login, links.len());

        let mut tasks = Vec::with_capacity(links.len());
        for linked in links {
            let folder = self.user_folder(&[linked.team.name.as_str(), linked.project.name.as_str()]);
            self.backuper.fs.create_dir_all(&folder).await?;
            tasks.push(DownloadTask::new(linked.link, folder));
        }
        self.download(tasks).await;
        Ok(())
    }

    async fn backup_recent(&mut self, window: BackupWindow) -> Result<()> {
        let channel = self.channel;
        channel.navigate(selectors::RECENT_URL).await?;
        channel.sleep(RECENT_PAGE_SETTLE).await;
        let rows = wait_and_get_all(
            channel,
            selectors::RECENT_FILES,
            self.backuper.download.element_timeout,
        )
        .await?;

        let folder = self.user_folder(&[RECENT_FOLDER]);
        self.backuper.fs.create_dir_all(&folder).await?;

        let mut tasks = Vec::new();
        for row in &rows {
            channel.click(row).await?;
            channel.sleep(TILE_SELECT_DELAY).await;
            let href = channel.get_attribute(row, "href").await?;
            let html = channel.get_attribute(row, "innerHTML").await?;
            let entry = parse_tile(&href, &html);

            let admitted = match (window, entry.edited.as_deref()) {
                (BackupWindow::Unbounded, _) => true,
                (_, Some(edited)) => window.admits_relative(edited),
                (_, None) => {
                    log::warn!("no edit time on recent tile {href}, skipping");
                    false
                }
            };
            log::debug!("recent {:?} edited {:?}: {admitted}", entry.title, entry.edited);
            if admitted {
                tasks.push(DownloadTask::new(entry.link, folder.clone()));
            }
        }
        log::info!("{}: {} recent file(s) qualify", self.user.login, tasks.len());

        self.download(tasks).await;
        Ok(())
    }

    async fn download(&mut self, tasks: Vec<DownloadTask>) {
        if tasks.is_empty() {
            return;
        }
        let mut downloader = Downloader::new(
            self.channel,
            &self.backuper.fs,
            &mut *self.registry,
            self.staging,
            &self.backuper.download,
        );
        let stats = downloader.run_batch(tasks, &mut *self.report).await;
        self.report.add_batch(&stats);
    }
}

/// Signs `user` in and waits for the projects page.
///
/// # Errors
///
/// Any failure is reported as `LoginFailed`.
pub async fn login<C: AutomationChannel + ?Sized>(
    channel: &C,
    user: &UserConfig,
    timeout: Duration,
) -> Result<()> {
    login_steps(channel, user, timeout)
        .await
        .map_err(|e| Error::LoginFailed {
            login: user.login.clone(),
            reason: e.to_string(),
        })
}

async fn login_steps<C: AutomationChannel + ?Sized>(
    channel: &C,
    user: &UserConfig,
    timeout: Duration,
) -> Result<()> {
    channel.navigate(selectors::LOGIN_URL).await?;
    wait_and_get(channel, selectors::AUTH_BLOCK, timeout).await?;

    let email = wait_and_get(channel, selectors::AUTH_FIELD_LOGIN, timeout).await?;
    let password = wait_and_get(channel, selectors::AUTH_FIELD_PASSWORD, timeout).await?;
    let button = wait_and_get(channel, selectors::LOGIN_BUTTON, timeout).await?;

    channel.send_keys(&email, &user.login).await?;
    channel.send_keys(&password, &user.password).await?;
    channel.click(&button).await?;
    log::debug!("login form submitted for {}", user.login);

    wait_and_get(channel, selectors::MENU_DRAFTS, timeout).await?;
    log::debug!("projects page opened for {}", user.login);
    Ok(())
}
