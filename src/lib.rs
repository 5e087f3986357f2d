//! figma-backup - unattended incremental backup of Figma files.
//!
//! The library discovers which files changed within the backup window,
//! drives a browser session to save each one locally, moves the saved files
//! into per-user, per-team, per-project folders and reports the outcome.
//!
//! # Example
//!
//! ```no_run
//! use figma_backup::{BackupConfig, Backuper, HttpCatalog, RunOptions, TokioFileSystem, WebDriverLauncher};
//!
//! # async fn example() -> figma_backup::Result<()> {
//! let config = BackupConfig::load(&BackupConfig::default_path())?;
//! let (options, _) = RunOptions::from_args(["--verbose"]);
//!
//! let http = reqwest::Client::new();
//! let catalog = HttpCatalog::new(http.clone());
//! let sessions = WebDriverLauncher::new(http, config.webdriver.clone(), 3);
//!
//! let backuper = Backuper::new(config, options, catalog, sessions, TokioFileSystem::new());
//! let summary = backuper.run(chrono::Local::now()).await?;
//! println!("{}", summary.notification().subject);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod automation;
pub mod backup;
pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod format;
pub mod fs;
pub mod notify;
pub mod recent;
pub mod report;
pub mod saver;
pub mod stats;
pub mod window;

// Re-export main types for convenience
pub use automation::{AutomationChannel, Element, SessionFactory, WebDriverChannel, WebDriverLauncher};
pub use backup::{Backuper, RunSummary};
pub use catalog::{Catalog, HttpCatalog, LinkedFile};
pub use config::{BackupConfig, DownloadConfig, RunOptions};
pub use download::{DownloadProgress, DownloadTask, Downloader, NoProgress};
pub use error::{Error, Result};
pub use fs::{FileSystem, TokioFileSystem};
pub use notify::{NotificationSink, SendmailSink, StdoutSink, sink_for};
pub use report::{Notification, Outcome, Report};
pub use saver::TitleRegistry;
pub use stats::{AttemptStats, BatchStats};
pub use window::{BackupWindow, RunMode};
