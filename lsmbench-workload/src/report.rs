//! Console reports printed after every epoch.

use std::fmt::Write as _;
use std::time::{Duration, SystemTime};

use lsmbench_engine::MetricsSnapshot;

use crate::writer::EpochStats;

/// Prints a timestamped engine metrics block to stdout once per epoch.
///
/// Every block and every compaction line is written with a single call, so output of concurrent
/// writers is never mixed within a block. Another writer's block may still land between a block
/// and the compaction line that follows it.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatsReporter {
    epoch_timings: bool,
}

impl StatsReporter {
    /// Creates a reporter. With `epoch_timings`, reports include the epoch number and durations.
    pub fn new(epoch_timings: bool) -> Self {
        Self { epoch_timings }
    }

    /// Prints the report for a finished insert phase.
    pub fn report(&self, stats: &EpochStats, snapshot: &MetricsSnapshot) {
        print!("{}", self.format(SystemTime::now(), stats, snapshot));
    }

    /// Prints the duration of a compaction, if epoch timings are enabled.
    pub fn report_compaction(&self, stats: &EpochStats, elapsed: Duration) {
        if let Some(line) = self.format_compaction(stats, elapsed) {
            print!("{line}");
        }
    }

    /// Renders the compaction line, or `None` without epoch timings.
    pub fn format_compaction(&self, stats: &EpochStats, elapsed: Duration) -> Option<String> {
        self.epoch_timings.then(|| {
            format!(
                "writer {} epoch {}: compacted in {}ms\n",
                stats.writer,
                stats.epoch,
                elapsed.as_millis()
            )
        })
    }

    /// Renders the report block.
    pub fn format(
        &self,
        now: SystemTime,
        stats: &EpochStats,
        snapshot: &MetricsSnapshot,
    ) -> String {
        let mut block = format!("{}:\n{snapshot}", humantime::format_rfc3339_nanos(now));
        if self.epoch_timings {
            let _ = writeln!(
                block,
                "writer {} epoch {}: inserted {} in {}ms",
                stats.writer,
                stats.epoch,
                stats.inserted,
                stats.insert_time.as_millis()
            );
        }
        block.push('\n');
        block
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    fn stats() -> EpochStats {
        EpochStats {
            writer: 0,
            epoch: 7,
            prefix: 42,
            inserted: 10,
            insert_time: Duration::from_millis(12),
        }
    }

    #[test]
    fn formats_timestamp_and_snapshot() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let snapshot = MetricsSnapshot::new("test").field("keys", 10);

        let block = StatsReporter::new(false).format(now, &stats(), &snapshot);
        assert_eq!(
            block,
            "2023-11-14T22:13:20.000000000Z:\nengine: test\n  keys  10\n\n"
        );
    }

    #[test]
    fn includes_epoch_timings() {
        let now = UNIX_EPOCH;
        let snapshot = MetricsSnapshot::new("test");

        let block = StatsReporter::new(true).format(now, &stats(), &snapshot);
        assert!(block.contains("writer 0 epoch 7: inserted 10 in 12ms\n"));
    }

    #[test]
    fn compaction_line_needs_epoch_timings() {
        let elapsed = Duration::from_millis(250);

        assert_eq!(StatsReporter::new(false).format_compaction(&stats(), elapsed), None);
        assert_eq!(
            StatsReporter::new(true).format_compaction(&stats(), elapsed).as_deref(),
            Some("writer 0 epoch 7: compacted in 250ms\n")
        );
    }
}
