//! Exposes an in-process metrics exporter for use in integration tests.
//!
//! ```
//! use std::sync::Arc;
//!
//! use lsmbench_test::server::TestExporter;
//! use lsmbench_workload::BenchMetrics;
//!
//! #[tokio::main]
//! async fn main() {
//!    let exporter = TestExporter::new(Arc::new(BenchMetrics::new(false)));
//!    let url = exporter.url("/metrics");
//!    // use the URL in tests...
//! }
//! ```

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;

use lsmbench_server::config;
use lsmbench_server::exporter::Exporter;
use lsmbench_workload::BenchMetrics;
use tokio_util::sync::CancellationToken;

/// An in-process exporter for use in integration tests.
///
/// Serves the given metrics with the default exporter configuration on a random available port on
/// localhost. The exporter stops when dropped.
#[derive(Debug)]
pub struct TestExporter {
    handle: tokio::task::JoinHandle<()>,
    shutdown: CancellationToken,
    socket: SocketAddr,
}

impl TestExporter {
    /// Starts serving `metrics`. Must be called from within a Tokio runtime.
    pub fn new(metrics: Arc<BenchMetrics>) -> Self {
        Self::with_config(metrics, &config::Exporter::default())
    }

    /// Starts serving `metrics` with a custom exporter configuration.
    ///
    /// The configured address is ignored.
    pub fn with_config(metrics: Arc<BenchMetrics>, config: &config::Exporter) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let exporter = Exporter::new(metrics, config);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                exporter.serve(listener, shutdown).await.unwrap();
            }
        });

        Self {
            handle,
            shutdown,
            socket,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://{}/{}", self.socket, path)
    }
}

impl Drop for TestExporter {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.handle.abort();
    }
}
