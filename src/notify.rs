//! Delivery of the end-of-run notification.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::MailConfig;
use crate::error::{Error, Result};
use crate::report::Notification;

/// Somewhere a finished report can be sent.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Prints the report to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

#[async_trait]
impl NotificationSink for StdoutSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        println!("{}\n\n{}", notification.subject, notification.html);
        Ok(())
    }
}

/// Pipes an HTML mail to a sendmail-compatible program.
#[derive(Debug, Clone)]
pub struct SendmailSink {
    from: String,
    receivers: Vec<String>,
    program: String,
    args: Vec<String>,
}

impl SendmailSink {
    #[must_use]
    pub fn new(config: &MailConfig) -> Self {
        Self {
            from: config.from.clone().unwrap_or_else(default_sender),
            receivers: config.receivers.clone(),
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }

    /// Renders the RFC 5322 message written to the program's stdin.
    #[must_use]
    pub fn message(&self, notification: &Notification) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/html; charset=utf-8\r\n\r\n{}\r\n",
            self.from,
            self.receivers.join(", "),
            notification.subject,
            notification.html.replace('\n', "\r\n"),
        )
    }
}

/// `user@host` of the process running the backup.
fn default_sender() -> String {
    let host = hostname::get().map_or_else(|_| "localhost".to_string(), |h| h.to_string_lossy().into_owned());
    format!("{}@{host}", whoami::username())
}

#[async_trait]
impl NotificationSink for SendmailSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Notify(format!("cannot start {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Notify("mail program has no stdin".to_string()))?;
        stdin.write_all(self.message(notification).as_bytes()).await?;
        drop(stdin);

        let status = child.wait().await?;
        if !status.success() {
            return Err(Error::Notify(format!("{} exited with {status}", self.program)));
        }
        log::info!("report mailed to {}", self.receivers.join(", "));
        Ok(())
    }
}

/// Picks the sink for a run: mail when receivers are configured, stdout otherwise.
#[must_use]
pub fn sink_for(mail: Option<&MailConfig>) -> Box<dyn NotificationSink> {
    match mail {
        Some(config) if !config.receivers.is_empty() => Box::new(SendmailSink::new(config)),
        _ => {
            log::info!("no mail receivers configured, printing report");
            Box::new(StdoutSink)
        }
    }
}
