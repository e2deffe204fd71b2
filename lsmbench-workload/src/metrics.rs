//! Process-wide benchmark counters and their Prometheus text exposition.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeMetric, MetricEncoder};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Total number of records written.
pub const INSERTED_AMOUNT: &str = "pebble_benchmark_inserted_amount";
/// Cumulative nanoseconds spent in insert and apply calls.
pub const INSERT_TIME: &str = "pebble_benchmark_insert";
/// Cumulative nanoseconds spent in compaction calls.
pub const COMPACT_TIME: &str = "pebble_benchmark_compact";

/// A monotonically increasing counter with lock-free increments.
///
/// Unlike the OpenMetrics counters of `prometheus_client`, samples are exposed under the bare
/// metric name without a `_total` suffix, which keeps the series names dashboards already query.
#[derive(Clone, Debug, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    /// Adds `value` to the counter.
    pub fn inc_by(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    /// Returns the current value.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl EncodeMetric for Counter {
    fn encode(&self, mut encoder: MetricEncoder) -> Result<(), fmt::Error> {
        let value = i64::try_from(self.get()).unwrap_or(i64::MAX);
        encoder.encode_gauge(&value)
    }

    fn metric_type(&self) -> MetricType {
        MetricType::Counter
    }
}

/// The benchmark's metrics registry.
///
/// Created once at startup and shared by every writer and the exporter. Counters are only ever
/// incremented; concurrent increments may interleave in any order.
#[derive(Debug)]
pub struct BenchMetrics {
    registry: Registry,
    inserted: Counter,
    insert_time: Counter,
    compact_time: Option<Counter>,
    uptime: Gauge,
    started: Instant,
}

impl BenchMetrics {
    /// Creates the registry.
    ///
    /// The compaction counter is only registered if `compaction` is enabled for this run.
    pub fn new(compaction: bool) -> Self {
        let mut registry = Registry::default();

        let inserted = Counter::default();
        registry.register(INSERTED_AMOUNT, "Amount of inserted items", inserted.clone());

        let insert_time = Counter::default();
        registry.register(INSERT_TIME, "Time consumed by inserting", insert_time.clone());

        let compact_time = compaction.then(|| {
            let counter = Counter::default();
            registry.register(COMPACT_TIME, "Time consumed by compacting", counter.clone());
            counter
        });

        let start_time = Gauge::<i64>::default();
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        start_time.set(since_epoch.as_secs() as i64);
        registry.register(
            "process_start_time_seconds",
            "Start time of the process since unix epoch in seconds",
            start_time,
        );

        let uptime = Gauge::<i64>::default();
        registry.register(
            "process_uptime_seconds",
            "Seconds since the process started",
            uptime.clone(),
        );

        Self {
            registry,
            inserted,
            insert_time,
            compact_time,
            uptime,
            started: Instant::now(),
        }
    }

    /// Counts `amount` written records.
    pub fn record_inserted(&self, amount: u64) {
        self.inserted.inc_by(amount);
    }

    /// Accumulates time spent in an insert or apply call.
    pub fn record_insert_time(&self, elapsed: Duration) {
        self.insert_time.inc_by(as_nanos(elapsed));
    }

    /// Accumulates time spent in a compaction call.
    ///
    /// Ignored if compaction was not enabled when the registry was created.
    pub fn record_compact_time(&self, elapsed: Duration) {
        match &self.compact_time {
            Some(counter) => counter.inc_by(as_nanos(elapsed)),
            None => tracing::warn!("compaction time recorded without compaction enabled"),
        }
    }

    /// Total number of records written.
    pub fn inserted(&self) -> u64 {
        self.inserted.get()
    }

    /// Cumulative time spent in insert and apply calls.
    pub fn insert_time(&self) -> Duration {
        Duration::from_nanos(self.insert_time.get())
    }

    /// Cumulative time spent in compaction calls.
    pub fn compact_time(&self) -> Duration {
        Duration::from_nanos(self.compact_time.as_ref().map_or(0, Counter::get))
    }

    /// Renders all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, fmt::Error> {
        self.uptime.set(self.started.elapsed().as_secs() as i64);

        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

/// Converts to nanoseconds for a counter.
///
/// Clock granularity can report zero for very fast calls; every completed call counts at least
/// one nanosecond.
fn as_nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos())
        .unwrap_or(u64::MAX)
        .max(1)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn exposes_counters() {
        let metrics = BenchMetrics::new(false);
        metrics.record_inserted(3);
        metrics.record_insert_time(Duration::from_nanos(1500));

        let text = metrics.encode().unwrap();
        assert!(text.contains("# TYPE pebble_benchmark_inserted_amount counter"));
        assert!(text.contains("pebble_benchmark_inserted_amount 3\n"));
        assert!(text.contains("pebble_benchmark_insert 1500\n"));
        assert!(text.contains("process_uptime_seconds"));
        assert!(!text.contains(COMPACT_TIME));
    }

    #[test]
    fn compaction_counter_only_when_enabled() {
        let metrics = BenchMetrics::new(true);
        metrics.record_compact_time(Duration::from_millis(2));

        assert_eq!(metrics.compact_time(), Duration::from_millis(2));
        assert!(metrics.encode().unwrap().contains("pebble_benchmark_compact 2000000\n"));

        let metrics = BenchMetrics::new(false);
        metrics.record_compact_time(Duration::from_millis(2));
        assert_eq!(metrics.compact_time(), Duration::ZERO);
    }

    #[test]
    fn zero_durations_still_advance() {
        let metrics = BenchMetrics::new(false);
        metrics.record_insert_time(Duration::ZERO);
        assert_eq!(metrics.insert_time(), Duration::from_nanos(1));
    }

    #[test]
    fn concurrent_increments_sum_up() {
        let metrics = Arc::new(BenchMetrics::new(false));
        let increments: Vec<u64> = (1..=1000).collect();

        thread::scope(|scope| {
            for chunk in increments.chunks(100) {
                let metrics = &metrics;
                scope.spawn(move || {
                    for &amount in chunk {
                        metrics.record_inserted(amount);
                        metrics.record_insert_time(Duration::from_nanos(amount));
                    }
                });
            }
        });

        let serial: u64 = increments.iter().sum();
        assert_eq!(metrics.inserted(), serial);
        assert_eq!(metrics.insert_time(), Duration::from_nanos(serial));
    }
}
