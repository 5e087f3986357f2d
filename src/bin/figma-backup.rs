//! figma-backup CLI - saves recently changed Figma files of every configured user.

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::env;

use figma_backup::{
    BackupConfig, Backuper, HttpCatalog, Outcome, RunOptions, TokioFileSystem, WebDriverLauncher,
    sink_for,
};

fn print_usage() {
    eprintln!("Usage: figma-backup [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --all               Save every file regardless of modification time");
    eprintln!("  --auto-incremental  Widen the window on the weekly full-backup day");
    eprintln!("  --verbose           Log progress and add per-file statistics to the report");
    eprintln!("  --debug             Log everything, including browser steps");
    eprintln!("  -h, --help          Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FIGMA_BACKUP_CONFIG Path to the configuration file");
    eprintln!("  RUST_LOG            Overrides the log filter");
}

/// Chrome `--log-level` matching the requested verbosity.
const fn chrome_log_level(options: &RunOptions) -> u8 {
    if options.debug {
        1
    } else if options.verbose {
        2
    } else {
        3
    }
}

#[tokio::main]
async fn main() -> figma_backup::Result<()> {
    let (options, unknown) = RunOptions::from_args(env::args().skip(1));
    if options.help {
        print_usage();
        return Ok(());
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(options.log_level()))
        .init();
    for arg in &unknown {
        log::warn!("ignoring unknown argument {arg}");
    }

    let config_path = BackupConfig::default_path();
    log::info!("loading configuration from {}", config_path.display());
    let config = BackupConfig::load(&config_path)?;
    let mail = config.mail.clone();

    let http = reqwest::Client::new();
    let catalog = HttpCatalog::new(http.clone());
    let sessions = WebDriverLauncher::new(http, config.webdriver.clone(), chrome_log_level(&options));

    let backuper = Backuper::new(config, options, catalog, sessions, TokioFileSystem::new());
    let summary = backuper.run(chrono::Local::now()).await?;

    for report in &summary.reports {
        if report.outcome() == Outcome::Failed {
            log::warn!("backup for {} failed", report.login);
        }
    }

    sink_for(mail.as_ref()).deliver(&summary.notification()).await
}
