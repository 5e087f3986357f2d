//! Per-user run reports and the end-of-run notification.

use std::fmt::Write as _;
use std::time::Duration;

use uuid::Uuid;

use crate::download::{DownloadProgress, DownloadTask};
use crate::error::Error;
use crate::format::{format_bytes, format_duration};
use crate::stats::{AttemptStats, BatchStats};
use crate::window::BackupWindow;

/// Classification of one user's backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every required file was saved and nothing went wrong.
    Complete,
    /// Every required file was saved, but errors were recorded.
    Partial,
    /// Some required file is missing, or part of the backup never ran.
    Failed,
}

/// What happened for one user during a run.
#[derive(Debug, Clone)]
pub struct Report {
    pub login: String,
    pub files_should_be: usize,
    pub files_saved: usize,
    pub errors: Vec<String>,
    pub statistics: Vec<String>,
    /// Login or discovery aborted part of the backup.
    pub user_failed: bool,
    verbose: bool,
}

impl Report {
    #[must_use]
    pub fn new(login: impl Into<String>, verbose: bool) -> Self {
        Self {
            login: login.into(),
            files_should_be: 0,
            files_saved: 0,
            errors: Vec::new(),
            statistics: Vec::new(),
            user_failed: false,
            verbose,
        }
    }

    /// Folds a finished batch into the totals.
    pub fn add_batch(&mut self, batch: &BatchStats) {
        self.files_should_be += batch.submitted;
        self.files_saved += batch.saved;
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Appends a statistics line. Ignored unless the report is verbose.
    pub fn push_statistic(&mut self, line: impl Into<String>) {
        if self.verbose {
            self.statistics.push(line.into());
        }
    }

    /// Records a failure that stopped part of this user's backup.
    pub fn record_user_failure(&mut self, error: impl Into<String>) {
        self.user_failed = true;
        self.push_error(error);
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        if self.user_failed || self.files_saved < self.files_should_be {
            Outcome::Failed
        } else if self.errors.is_empty() {
            Outcome::Complete
        } else {
            Outcome::Partial
        }
    }

    /// Nothing was due and nothing went wrong.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files_should_be == 0 && self.errors.is_empty() && !self.user_failed
    }
}

impl DownloadProgress for Report {
    fn on_round_start(&mut self, round: u32, pending: usize) {
        if round > 1 {
            self.push_statistic(format!("===== retry round {round}, {pending} file(s) left ====="));
        }
    }

    fn on_attempt_complete(&mut self, _task: &DownloadTask, stats: &AttemptStats) {
        self.push_statistic(format!(
            "Saved {} (attempt {}) in {}, {}",
            stats.title,
            stats.attempt,
            format_duration(stats.elapsed),
            format_bytes(stats.size.unwrap_or(0)),
        ));
    }

    fn on_attempt_failed(&mut self, _task: &DownloadTask, stats: &AttemptStats, error: &Error) {
        self.push_statistic(format!(
            "NOT saved {} (attempt {}) after {}: {error}",
            stats.title,
            stats.attempt,
            format_duration(stats.elapsed),
        ));
    }

    fn on_permanent_failure(&mut self, task: &DownloadTask) {
        self.push_error(format!("Can't download {}", task.link));
    }
}

/// A rendered report ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub html: String,
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn empty_message(window: BackupWindow) -> String {
    match window {
        BackupWindow::Unbounded => "file list is empty".to_string(),
        BackupWindow::Hours(hours) => format!("no files changed in the last {hours}h"),
    }
}

fn render_section(out: &mut String, report: &Report, window: BackupWindow) {
    let login = escape_html(&report.login);
    if report.is_empty() {
        let _ = writeln!(out, "<h1>{login}: {}</h1>", empty_message(window));
        return;
    }

    let (color, verdict) = match report.outcome() {
        Outcome::Complete => ("green", "all OK"),
        Outcome::Partial => ("orange", "OK with warnings"),
        Outcome::Failed => ("red", "NOT OK"),
    };
    let _ = writeln!(out, r#"<h1 style="color:{color}">{login}: {verdict}</h1>"#);
    let _ = writeln!(
        out,
        "<p>files saved: {}/{}</p>",
        report.files_saved, report.files_should_be
    );
    if !report.statistics.is_empty() {
        let lines: Vec<String> = report.statistics.iter().map(|s| escape_html(s)).collect();
        let _ = writeln!(out, "<hr>\n<p>{}</p>", lines.join("<br>\n"));
    }
    let _ = writeln!(out, "<hr>\n<p>errors: {}</p>", report.errors.len());
    if !report.errors.is_empty() {
        let lines: Vec<String> = report.errors.iter().map(|e| escape_html(e)).collect();
        let _ = writeln!(out, "<p>{}</p>", lines.join("<br>\n"));
    }
}

/// Renders every user's report into one message.
#[must_use]
pub fn compose_notification(
    reports: &[Report],
    total_elapsed: Duration,
    window: BackupWindow,
    run_id: Uuid,
) -> Notification {
    let mut html = String::new();
    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            html.push_str("<br><hr><hr>\n");
        }
        render_section(&mut html, report, window);
    }

    let host = hostname::get().map_or_else(|_| "unknown host".to_string(), |h| h.to_string_lossy().into_owned());
    let _ = write!(
        html,
        "<br>\n<p>Total time: {}</p>\n<p><small>{} / run {run_id}</small></p>\n",
        format_duration(total_elapsed),
        escape_html(&host),
    );

    let failed = reports.iter().filter(|r| r.outcome() == Outcome::Failed).count();
    let subject = if failed == 0 {
        format!("Figma backup report: {} user(s) OK", reports.len())
    } else {
        format!("Figma backup report: {failed} of {} user(s) FAILED", reports.len())
    };

    Notification { subject, html }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn task(link: &str, attempts: u32) -> DownloadTask {
        DownloadTask {
            link: link.to_string(),
            folder: PathBuf::from("/b"),
            attempts,
            claimed_title: None,
        }
    }

    fn attempt(title: &str, n: u32, size: Option<u64>) -> AttemptStats {
        AttemptStats {
            title: title.to_string(),
            attempt: n,
            elapsed: Duration::from_secs(4),
            size,
        }
    }

    fn batch(submitted: usize, saved: usize) -> BatchStats {
        BatchStats {
            submitted,
            saved,
            failed: (saved..submitted)
                .map(|i| task(&format!("https://www.figma.com/file/K{i}/F"), 10))
                .collect(),
            rounds: 1,
            elapsed: Duration::from_secs(1),
            total_bytes: 0,
        }
    }

    #[test]
    fn outcome_classification() {
        let mut report = Report::new("a@b.c", false);
        report.add_batch(&batch(2, 2));
        assert_eq!(report.outcome(), Outcome::Complete);

        report.push_error("something odd");
        assert_eq!(report.outcome(), Outcome::Partial);

        report.add_batch(&batch(3, 1));
        assert_eq!(report.files_should_be, 5);
        assert_eq!(report.files_saved, 3);
        assert_eq!(report.outcome(), Outcome::Failed);
    }

    #[test]
    fn user_failure_fails_even_without_files() {
        let mut report = Report::new("a@b.c", false);
        report.record_user_failure("login failed");
        assert!(!report.is_empty());
        assert_eq!(report.outcome(), Outcome::Failed);
    }

    #[test]
    fn statistics_only_when_verbose() {
        let mut quiet = Report::new("q", false);
        quiet.on_attempt_complete(&task("l", 0), &attempt("Logo", 1, Some(10)));
        assert!(quiet.statistics.is_empty());

        let mut loud = Report::new("l", true);
        loud.on_round_start(1, 3);
        loud.on_attempt_complete(&task("l", 0), &attempt("Logo", 1, Some(2048)));
        loud.on_round_start(2, 1);
        assert_eq!(loud.statistics.len(), 2);
        assert_eq!(loud.statistics[0], "Saved Logo (attempt 1) in 4s, 2.00 KB");
        assert!(loud.statistics[1].starts_with("====="));
    }

    #[test]
    fn failed_attempts_are_statistics_not_errors() {
        let mut report = Report::new("u", true);
        let err = Error::FileNotAppeared { title: "Logo".to_string() };
        report.on_attempt_failed(&task("l", 0), &attempt("Logo", 1, None), &err);
        assert!(report.errors.is_empty());
        assert_eq!(report.statistics.len(), 1);

        report.on_permanent_failure(&task("https://www.figma.com/file/K/Logo", 10));
        assert_eq!(report.errors, vec!["Can't download https://www.figma.com/file/K/Logo"]);
    }

    #[test]
    fn notification_sections() {
        let mut ok = Report::new("ok@x", false);
        ok.add_batch(&batch(1, 1));
        let mut bad = Report::new("bad<x>", false);
        bad.add_batch(&batch(2, 1));
        bad.push_error("Can't download <link>");
        let idle = Report::new("idle@x", false);

        let n = compose_notification(
            &[ok, bad, idle],
            Duration::from_secs(65),
            BackupWindow::Hours(48),
            Uuid::nil(),
        );
        assert_eq!(n.subject, "Figma backup report: 1 of 3 user(s) FAILED");
        assert!(n.html.contains(r#"<h1 style="color:green">ok@x: all OK</h1>"#));
        assert!(n.html.contains(r#"<h1 style="color:red">bad&lt;x&gt;: NOT OK</h1>"#));
        assert!(n.html.contains("files saved: 1/2"));
        assert!(n.html.contains("Can&#39;t download &lt;link&gt;"));
        assert!(n.html.contains("<h1>idle@x: no files changed in the last 48h</h1>"));
        assert!(n.html.contains("Total time: 1m 5s"));
    }

    #[test]
    fn empty_run_with_unbounded_window() {
        let n = compose_notification(
            &[Report::new("u", false)],
            Duration::ZERO,
            BackupWindow::Unbounded,
            Uuid::nil(),
        );
        assert!(n.html.contains("u: file list is empty"));
        assert_eq!(n.subject, "Figma backup report: 1 user(s) OK");
    }
}
