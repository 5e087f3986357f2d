//! Download statistics types.

use std::time::{Duration, Instant};

use crate::download::DownloadTask;

/// Statistics for a single save attempt.
#[derive(Debug, Clone)]
pub struct AttemptStats {
    /// Title derived from the link.
    pub title: String,
    /// 1-based attempt number for this task.
    pub attempt: u32,
    /// Time from navigation to the file landing (or giving up).
    pub elapsed: Duration,
    /// Size of the saved file, when it was saved.
    pub size: Option<u64>,
}

/// Result of one batch.
#[derive(Debug, Clone)]
pub struct BatchStats {
    /// Number of tasks submitted.
    pub submitted: usize,
    /// Number of tasks whose file was saved.
    pub saved: usize,
    /// Tasks still failing after the last round.
    pub failed: Vec<DownloadTask>,
    /// Rounds actually run.
    pub rounds: u32,
    /// Total elapsed time for the batch.
    pub elapsed: Duration,
    /// Total bytes saved.
    pub total_bytes: u64,
}

impl BatchStats {
    /// Returns true if every submitted task was saved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Builder for accumulating batch statistics while rounds run.
pub struct BatchStatsBuilder {
    submitted: usize,
    saved: usize,
    rounds: u32,
    total_bytes: u64,
    start_time: Instant,
}

impl BatchStatsBuilder {
    #[must_use]
    pub fn new(submitted: usize) -> Self {
        Self {
            submitted,
            saved: 0,
            rounds: 0,
            total_bytes: 0,
            start_time: Instant::now(),
        }
    }

    /// Records the start of a round.
    pub const fn start_round(&mut self) {
        self.rounds += 1;
    }

    /// Records a saved file.
    pub fn add_saved(&mut self, stats: &AttemptStats) {
        self.saved += 1;
        self.total_bytes += stats.size.unwrap_or(0);
    }

    /// Builds the final statistics with the tasks that never succeeded.
    #[must_use]
    pub fn build(self, failed: Vec<DownloadTask>) -> BatchStats {
        debug_assert_eq!(self.saved + failed.len(), self.submitted);
        BatchStats {
            submitted: self.submitted,
            saved: self.saved,
            failed,
            rounds: self.rounds,
            elapsed: self.start_time.elapsed(),
            total_bytes: self.total_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn attempt(size: Option<u64>) -> AttemptStats {
        AttemptStats {
            title: "Logo".to_string(),
            attempt: 1,
            elapsed: Duration::from_secs(3),
            size,
        }
    }

    #[test]
    fn builder_counts_saved_and_bytes() {
        let mut builder = BatchStatsBuilder::new(3);
        builder.start_round();
        builder.add_saved(&attempt(Some(500)));
        builder.add_saved(&attempt(None));
        builder.start_round();

        let failed = vec![DownloadTask::new("https://www.figma.com/file/K/Deck", PathBuf::from("/b"))];
        let stats = builder.build(failed);
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.saved, 2);
        assert_eq!(stats.rounds, 2);
        assert_eq!(stats.total_bytes, 500);
        assert!(!stats.is_complete());
    }

    #[test]
    fn empty_batch_is_complete() {
        let stats = BatchStatsBuilder::new(0).build(Vec::new());
        assert!(stats.is_complete());
        assert_eq!(stats.rounds, 0);
    }
}
