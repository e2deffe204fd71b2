//! Log capture for integration tests.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: the benchmark crates at full detail, the rest quiet.
const DEFAULT_DIRECTIVES: &str =
    "warn,lsmbench_engine=trace,lsmbench_server=trace,lsmbench_workload=trace";

/// Installs a global subscriber writing into the output captured by the test harness.
///
/// `RUST_LOG` replaces the default filter. Only the first call in a test binary installs the
/// subscriber; later calls do nothing.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_test_writer()
        .without_time()
        .try_init()
        .ok();
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_are_valid() {
        let filter = EnvFilter::try_new(DEFAULT_DIRECTIVES).unwrap();
        let rendered = filter.to_string();

        assert!(rendered.contains("lsmbench_workload=trace"));
        assert!(rendered.contains("warn"));
    }

    #[test]
    fn init_twice() {
        init();
        init();
    }
}
