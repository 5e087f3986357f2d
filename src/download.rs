//! Batch download orchestration: bounded retry rounds over one serialized
//! automation session.

use std::path::{Path, PathBuf};

use tokio::time::Instant;

use crate::automation::{AutomationChannel, selectors, wait_and_get};
use crate::config::DownloadConfig;
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::saver::{Saver, TitleRegistry, derive_title};
use crate::stats::{AttemptStats, BatchStats, BatchStatsBuilder};

/// A file to save: its link, where it goes, and how many rounds it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub link: String,
    pub folder: PathBuf,
    pub attempts: u32,
    /// Title reserved on the first attempt that reached the save step.
    pub claimed_title: Option<String>,
}

impl DownloadTask {
    #[must_use]
    pub fn new(link: impl Into<String>, folder: PathBuf) -> Self {
        Self {
            link: link.into(),
            folder,
            attempts: 0,
            claimed_title: None,
        }
    }
}

/// Trait for receiving batch progress updates.
///
/// All methods have default no-op implementations for convenience.
pub trait DownloadProgress {
    /// Called before each round with the number of tasks it will attempt.
    fn on_round_start(&mut self, _round: u32, _pending: usize) {}

    /// Called when an attempt saved its file.
    fn on_attempt_complete(&mut self, _task: &DownloadTask, _stats: &AttemptStats) {}

    /// Called when an attempt failed; the task is retried next round.
    fn on_attempt_failed(&mut self, _task: &DownloadTask, _stats: &AttemptStats, _error: &Error) {}

    /// Called once per task still failing after the last round.
    fn on_permanent_failure(&mut self, _task: &DownloadTask) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Drives one automation session through batches of downloads.
pub struct Downloader<'a, C: AutomationChannel + ?Sized, F: FileSystem> {
    channel: &'a C,
    fs: &'a F,
    saver: Saver<'a, F>,
    config: &'a DownloadConfig,
}

impl<'a, C: AutomationChannel + ?Sized, F: FileSystem> Downloader<'a, C, F> {
    /// Creates a downloader saving through `channel` into `staging_dir`.
    pub const fn new(
        channel: &'a C,
        fs: &'a F,
        registry: &'a mut TitleRegistry,
        staging_dir: &'a Path,
        config: &'a DownloadConfig,
    ) -> Self {
        Self {
            channel,
            fs,
            saver: Saver::new(fs, registry, staging_dir, config),
            config,
        }
    }

    /// Returns a reference to the download configuration.
    #[must_use]
    pub const fn config(&self) -> &DownloadConfig {
        self.config
    }

    /// Runs `tasks` in up to `max_rounds` rounds.
    ///
    /// Each round attempts every still-failing task once, in queue order.
    /// Failed tasks move to the next round with `attempts + 1`; the loop
    /// stops as soon as a round has no failures. Errors never abort the
    /// batch: they are reported to `progress` and retried.
    pub async fn run_batch(
        &mut self,
        tasks: Vec<DownloadTask>,
        progress: &mut dyn DownloadProgress,
    ) -> BatchStats {
        let mut builder = BatchStatsBuilder::new(tasks.len());
        let mut pending = tasks;

        for round in 1..=self.config.max_rounds {
            if pending.is_empty() {
                break;
            }
            builder.start_round();
            progress.on_round_start(round, pending.len());
            log::info!("round {round}: {} file(s) to save", pending.len());

            let mut failing = Vec::new();
            for mut task in pending {
                let started = Instant::now();
                let result = self.attempt_one(&mut task).await;
                let mut stats = AttemptStats {
                    title: derive_title(&task.link),
                    attempt: task.attempts + 1,
                    elapsed: started.elapsed(),
                    size: None,
                };

                match result {
                    Ok(path) => {
                        stats.size = self.fs.file_size(&path).await;
                        builder.add_saved(&stats);
                        progress.on_attempt_complete(&task, &stats);
                    }
                    Err(e) => {
                        log::warn!("attempt {} for {} failed: {e}", stats.attempt, task.link);
                        progress.on_attempt_failed(&task, &stats, &e);
                        task.attempts += 1;
                        failing.push(task);
                    }
                }
            }
            pending = failing;
        }

        for task in &pending {
            log::error!("giving up on {} after {} attempts", task.link, task.attempts);
            progress.on_permanent_failure(task);
        }
        builder.build(pending)
    }

    /// Opens `task.link`, waits for the document to load and saves it.
    ///
    /// The title is claimed on the first attempt that gets this far and
    /// kept on the task for later rounds.
    ///
    /// # Errors
    ///
    /// Returns whatever stopped the attempt: a navigation or element error
    /// from the channel, `FileNotAppeared`, or an I/O error from the move.
    pub async fn attempt_one(&mut self, task: &mut DownloadTask) -> Result<PathBuf> {
        log::debug!("opening {}", task.link);
        self.channel.navigate(&task.link).await?;
        self.channel.sleep(self.config.settle_delay).await;
        wait_and_get(
            self.channel,
            selectors::DOCUMENT_LOADED,
            self.config.element_timeout,
        )
        .await?;

        let title = match &task.claimed_title {
            Some(title) => title.clone(),
            None => {
                let title = self.saver.claim(&derive_title(&task.link), &task.folder);
                task.claimed_title = Some(title.clone());
                title
            }
        };
        self.saver
            .save_and_await(self.channel, &title, &task.folder)
            .await
    }
}
