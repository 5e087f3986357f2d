//! Saving an open document to disk: trigger the save, wait for the file to
//! land in staging, give it a unique name and move it into place.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::automation::{AutomationChannel, find_element, keys, selectors};
use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::fs::{FileSystem, saved_file_path};

/// Name the web application gives to documents that were never renamed.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Pause between the keystrokes of the save sequence.
const KEYSTROKE_DELAY: std::time::Duration = std::time::Duration::from_millis(200);

/// Derives the on-disk title from a file link.
///
/// Takes the last path segment and replaces escaped and literal path
/// separators with `_`, so `.../file/KEY/Icons%2FArrows?node-id=1` becomes
/// `Icons_Arrows`.
#[must_use]
pub fn derive_title(link: &str) -> String {
    let path = link.split(['?', '#']).next().unwrap_or(link);
    let segment = path.rsplit('/').next().unwrap_or(path);
    segment.replace("%2F", "_").replace("%2f", "_").replace('/', "_")
}

/// Titles handed out during one run, keyed by destination folder.
#[derive(Debug, Default)]
pub struct TitleRegistry {
    used: HashSet<(String, PathBuf)>,
}

impl TitleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a unique title for `folder`: `title` if unused, otherwise the
    /// first free `title (N)` for N = 1, 2, .... The claim is recorded
    /// immediately.
    pub fn claim(&mut self, title: &str, folder: &Path) -> String {
        let mut candidate = title.to_string();
        let mut n = 1u32;
        while self.contains(&candidate, folder) {
            candidate = format!("{title} ({n})");
            n += 1;
        }
        self.used.insert((candidate.clone(), folder.to_path_buf()));
        candidate
    }

    #[must_use]
    pub fn contains(&self, title: &str, folder: &Path) -> bool {
        self.used.contains(&(title.to_string(), folder.to_path_buf()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Saves documents from the browser into their destination folders.
pub struct Saver<'a, F: FileSystem> {
    fs: &'a F,
    registry: &'a mut TitleRegistry,
    staging_dir: &'a Path,
    config: &'a DownloadConfig,
}

impl<'a, F: FileSystem> Saver<'a, F> {
    pub const fn new(
        fs: &'a F,
        registry: &'a mut TitleRegistry,
        staging_dir: &'a Path,
        config: &'a DownloadConfig,
    ) -> Self {
        Self {
            fs,
            registry,
            staging_dir,
            config,
        }
    }

    /// Reserves the title a download for `folder` will be saved under.
    ///
    /// Call once per task; retries reuse the returned title.
    pub fn claim(&mut self, title: &str, folder: &Path) -> String {
        let claimed = self.registry.claim(title, folder);
        if claimed != title {
            log::debug!("{title} already saved to {} in this run, expecting {claimed}", folder.display());
        }
        claimed
    }

    /// Saves the document currently open in `channel` as the claimed `title`
    /// inside `folder` and returns the final path.
    ///
    /// # Errors
    ///
    /// Returns the channel's error if the save command cannot be issued,
    /// `FileNotAppeared` if the file never shows up in staging, or an I/O
    /// error if the move fails.
    pub async fn save_and_await<C: AutomationChannel + ?Sized>(
        &self,
        channel: &C,
        title: &str,
        folder: &Path,
    ) -> Result<PathBuf> {
        trigger_save(channel).await?;

        // The staging directory is shared by every destination, so only the
        // title identifies the file there.
        let staged = saved_file_path(self.staging_dir, title);
        let destination = saved_file_path(folder, title);

        for _ in 0..self.config.poll_iterations() {
            if self.fs.file_exists(&staged).await {
                self.fs.rename_file(&staged, &destination).await?;
                if is_default_title(title) {
                    // Let a second default-named save settle before the next poll can claim it.
                    channel.sleep(self.config.poll_interval * 2).await;
                }
                log::info!("saved {}", destination.display());
                return Ok(destination);
            }
            channel.sleep(self.config.poll_interval).await;
        }

        log::warn!("{title} did not appear in {}", self.staging_dir.display());
        Err(Error::FileNotAppeared {
            title: title.to_string(),
        })
    }
}

/// `Untitled` or one of its numbered copies.
fn is_default_title(title: &str) -> bool {
    title
        .strip_prefix(DEFAULT_TITLE)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(" ("))
}

/// Opens the quick-actions palette and runs the save command.
async fn trigger_save<C: AutomationChannel + ?Sized>(channel: &C) -> Result<()> {
    let root = find_element(channel, selectors::ROOT).await?;
    channel
        .send_keys(&root, &format!("{}/", keys::CONTROL))
        .await?;
    channel.sleep(KEYSTROKE_DELAY).await;

    let input = find_element(channel, selectors::QUICK_ACTIONS_INPUT).await?;
    log::debug!("quick actions open, sending {:?}", selectors::SAVE_COMMAND);
    channel.send_keys(&input, selectors::SAVE_COMMAND).await?;
    channel.sleep(KEYSTROKE_DELAY).await;
    channel.send_keys(&input, keys::ENTER).await
}
