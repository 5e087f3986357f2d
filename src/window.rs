//! Backup window policy: which remote files qualify for this run.

use std::sync::LazyLock;

use chrono::{DateTime, Utc, Weekday};
use regex::Regex;

use crate::config::RunOptions;

/// Weekday on which `--auto-incremental` widens the window.
pub const FULL_BACKUP_WEEKDAY: Weekday = Weekday::Sat;

const MINUTES_PER_HOUR: u64 = 60;
const MINUTES_PER_DAY: u64 = 60 * 24;

static RELATIVE_AGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<num>\d+|last)\s(?P<unit>minute|hour|day|month|year)s?(\sago)?")
        .expect("valid regex")
});

/// How the run selects files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Every file, regardless of modification time.
    All,
    /// Files changed within `hours_for_partial_backup`.
    Partial,
    /// Partial, except on [`FULL_BACKUP_WEEKDAY`].
    AutoIncremental,
}

impl RunMode {
    #[must_use]
    pub const fn from_options(options: &RunOptions) -> Self {
        if options.all {
            Self::All
        } else if options.auto_incremental {
            Self::AutoIncremental
        } else {
            Self::Partial
        }
    }
}

/// Maximum age a file may have to be saved in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupWindow {
    Unbounded,
    Hours(u64),
}

impl BackupWindow {
    /// Computes the window for a run started on `weekday`.
    #[must_use]
    pub fn compute(
        mode: RunMode,
        weekday: Weekday,
        hours_for_partial_backup: u64,
        days_for_auto_incremental_backup: u64,
    ) -> Self {
        match mode {
            RunMode::All => Self::Unbounded,
            RunMode::AutoIncremental if weekday == FULL_BACKUP_WEEKDAY => {
                Self::Hours(days_for_auto_incremental_backup.saturating_mul(24))
            }
            RunMode::AutoIncremental | RunMode::Partial => Self::Hours(hours_for_partial_backup),
        }
    }

    /// Cutoff in minutes, `None` when unbounded.
    #[must_use]
    pub const fn cutoff_minutes(&self) -> Option<u64> {
        match *self {
            Self::Unbounded => None,
            Self::Hours(hours) => Some(hours.saturating_mul(MINUTES_PER_HOUR)),
        }
    }

    /// Whether a file `age_minutes` old qualifies. The boundary is inclusive.
    #[must_use]
    pub const fn admits_age(&self, age_minutes: u64) -> bool {
        match self.cutoff_minutes() {
            None => true,
            Some(cutoff) => age_minutes <= cutoff,
        }
    }

    /// Whether a file last modified at `modified` qualifies at `now`.
    #[must_use]
    pub fn admits_timestamp(&self, modified: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(modified).num_minutes();
        // Clock skew can put `modified` slightly in the future.
        self.admits_age(u64::try_from(age).unwrap_or(0))
    }

    /// Applies [`admits_timestamp`](Self::admits_timestamp) to RFC 3339 text.
    /// Unparseable timestamps are excluded.
    #[must_use]
    pub fn admits_timestamp_text(&self, text: &str, now: DateTime<Utc>) -> bool {
        if *self == Self::Unbounded {
            return true;
        }
        match DateTime::parse_from_rfc3339(text) {
            Ok(modified) => self.admits_timestamp(modified.with_timezone(&Utc), now),
            Err(e) => {
                log::warn!("unrecognised modification time {text:?} ({e}), skipping file");
                false
            }
        }
    }

    /// Applies [`admits_age`](Self::admits_age) to UI text such as
    /// `"3 hours ago"`. Unparseable text is excluded.
    #[must_use]
    pub fn admits_relative(&self, text: &str) -> bool {
        if *self == Self::Unbounded {
            return true;
        }
        match parse_relative_age(text) {
            Some(minutes) => self.admits_age(minutes),
            None => {
                log::warn!("unrecognised relative time {text:?}, skipping file");
                false
            }
        }
    }
}

/// Parses "yesterday", "16 hours ago", "last month" and the like into an age
/// in minutes. Months are 30 days and years 365 days.
#[must_use]
pub fn parse_relative_age(text: &str) -> Option<u64> {
    let text = text.trim();
    if text == "yesterday" {
        return Some(MINUTES_PER_DAY);
    }

    let caps = RELATIVE_AGE_RE.captures(text)?;
    let count = match &caps["num"] {
        "last" => 1,
        digits => digits.parse::<u64>().ok()?,
    };
    let unit = match &caps["unit"] {
        "minute" => 1,
        "hour" => MINUTES_PER_HOUR,
        "day" => MINUTES_PER_DAY,
        "month" => 30 * MINUTES_PER_DAY,
        _ => 365 * MINUTES_PER_DAY,
    };
    Some(count.saturating_mul(unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn relative_age_examples() {
        assert_eq!(parse_relative_age("3 hours ago"), Some(180));
        assert_eq!(parse_relative_age("yesterday"), Some(1440));
        assert_eq!(parse_relative_age("last year"), Some(525_600));
        assert_eq!(parse_relative_age("1 hour ago"), Some(60));
        assert_eq!(parse_relative_age("20 days ago"), Some(28_800));
        assert_eq!(parse_relative_age("4 months ago"), Some(172_800));
        assert_eq!(parse_relative_age("2 years ago"), Some(1_051_200));
        assert_eq!(parse_relative_age("5 minutes"), Some(5));
        assert_eq!(parse_relative_age("Edited 16 hours ago"), Some(960));
    }

    #[test]
    fn relative_age_rejects_unknown_text() {
        assert_eq!(parse_relative_age("just now"), None);
        assert_eq!(parse_relative_age(""), None);
        assert_eq!(parse_relative_age("3 weeks ago"), None);
    }

    #[test]
    fn window_for_modes() {
        assert_eq!(
            BackupWindow::compute(RunMode::All, Weekday::Sat, 48, 8),
            BackupWindow::Unbounded
        );
        assert_eq!(
            BackupWindow::compute(RunMode::Partial, Weekday::Sat, 48, 8),
            BackupWindow::Hours(48)
        );
        assert_eq!(
            BackupWindow::compute(RunMode::AutoIncremental, Weekday::Sat, 48, 8),
            BackupWindow::Hours(192)
        );
        assert_eq!(
            BackupWindow::compute(RunMode::AutoIncremental, Weekday::Fri, 48, 8),
            BackupWindow::Hours(48)
        );
    }

    #[test]
    fn oversized_full_backup_days_saturate() {
        let window = BackupWindow::compute(RunMode::AutoIncremental, Weekday::Sat, 48, u64::MAX);
        assert_eq!(window, BackupWindow::Hours(u64::MAX));
        assert_eq!(window.cutoff_minutes(), Some(u64::MAX));
        assert!(window.admits_age(u64::MAX));
    }

    #[test]
    fn run_mode_prefers_all() {
        let options = RunOptions {
            all: true,
            auto_incremental: true,
            ..RunOptions::default()
        };
        assert_eq!(RunMode::from_options(&options), RunMode::All);
        assert_eq!(RunMode::from_options(&RunOptions::default()), RunMode::Partial);
    }

    #[test]
    fn cutoff_boundary_is_inclusive() {
        let window = BackupWindow::Hours(48);
        assert!(window.admits_age(47 * 60 + 59));
        assert!(window.admits_age(48 * 60));
        assert!(!window.admits_age(48 * 60 + 1));
        assert!(BackupWindow::Unbounded.admits_age(u64::MAX));
    }

    #[test]
    fn timestamps_against_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let window = BackupWindow::Hours(48);
        assert!(window.admits_timestamp(now - Duration::minutes(47 * 60 + 59), now));
        assert!(!window.admits_timestamp(now - Duration::minutes(48 * 60 + 1), now));
        assert!(window.admits_timestamp(now + Duration::minutes(5), now));

        assert!(window.admits_timestamp_text("2024-03-08T12:00:00Z", now));
        assert!(!window.admits_timestamp_text("2024-03-01T12:00:00.000Z", now));
        assert!(!window.admits_timestamp_text("not a date", now));
        assert!(BackupWindow::Unbounded.admits_timestamp_text("not a date", now));
    }

    #[test]
    fn relative_text_against_window() {
        let window = BackupWindow::Hours(48);
        assert!(window.admits_relative("yesterday"));
        assert!(window.admits_relative("2 days ago"));
        assert!(!window.admits_relative("3 days ago"));
        assert!(!window.admits_relative("just now"));
        assert!(BackupWindow::Unbounded.admits_relative("just now"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics(text in ".*") {
                let _ = parse_relative_age(&text);
            }

            #[test]
            fn hours_scale_linearly(n in 0u64..100_000) {
                prop_assert_eq!(parse_relative_age(&format!("{n} hours ago")), Some(n * 60));
            }
        }
    }
}
