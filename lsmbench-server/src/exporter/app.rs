use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use lsmbench_workload::BenchMetrics;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnFailure, TraceLayer};
use tracing::Level;

use crate::config;
use crate::exporter::middleware as m;

/// Content type of the Prometheus text exposition format.
const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Back-off after a failed `accept`, for example when running out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// The metrics exporter application.
#[derive(Debug)]
pub struct Exporter {
    router: Router,
    header_read_timeout: Duration,
}

impl Exporter {
    /// Creates the exporter for the given metrics registry.
    ///
    /// Serves the registry at the configured path and a liveness probe at `/health`. Use
    /// [`serve`](Self::serve) to run the server future.
    pub fn new(metrics: Arc<BenchMetrics>, config: &config::Exporter) -> Self {
        let router = Router::new()
            .route(&config.path, routing::get(scrape))
            .route("/health", routing::get(health));
        let router = with_middleware(router, config).with_state(metrics);

        Self {
            router,
            // Keep-alive connections wait for their next request headers under the same timer.
            header_read_timeout: config.read_timeout.min(config.idle_timeout),
        }
    }

    /// Runs the exporter until `shutdown` is cancelled.
    ///
    /// Connections are served over HTTP/1.1 on separate tasks. Connections that are still open at
    /// shutdown are not awaited.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let Self {
            router,
            header_read_timeout,
        } = self;

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(header_read_timeout);

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown.cancelled() => break,
            };

            let (stream, remote) = match accepted {
                Ok(accepted) => accepted,
                Err(error) => {
                    tracing::warn!(error = &error as &dyn std::error::Error, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let service = router
                .clone()
                .map_request(move |mut request: hyper::Request<Incoming>| {
                    request.extensions_mut().insert(ConnectInfo::<SocketAddr>(remote));
                    request
                });

            let connection =
                builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(service));

            tokio::spawn(async move {
                if let Err(error) = connection.await {
                    tracing::debug!(
                        %remote,
                        error = &error as &dyn std::error::Error,
                        "connection closed"
                    );
                }
            });
        }

        tracing::debug!("exporter stopped");
        Ok(())
    }
}

/// Wraps all routes of `router` in the exporter's middleware stack.
///
/// Requests that take longer than the write timeout are answered with `408 Request Timeout`.
fn with_middleware<S>(router: Router<S>, config: &config::Exporter) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // Requests go from top to bottom, responses from bottom to top.
    let middleware = ServiceBuilder::new()
        .layer(m::set_server_header())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(m::make_http_span)
                .on_failure(DefaultOnFailure::new().level(Level::DEBUG)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.write_timeout,
        ));

    router.layer(middleware)
}

async fn scrape(State(metrics): State<Arc<BenchMetrics>>) -> Response {
    match metrics.encode() {
        Ok(body) => (
            [(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE))],
            body,
        )
            .into_response(),
        Err(error) => {
            tracing::error!(
                error = &error as &dyn std::error::Error,
                "failed to encode metrics"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    "OK"
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;

    use super::*;

    #[tokio::test]
    async fn slow_requests_time_out() {
        let config = config::Exporter {
            write_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let router = Router::new().route(
            "/slow",
            routing::get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );

        let request = Request::get("/slow").body(Body::empty()).unwrap();
        let response = with_middleware(router, &config)
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(response.headers().contains_key(header::SERVER));
    }

    #[tokio::test]
    async fn serves_metrics_path() {
        let metrics = Arc::new(BenchMetrics::new(false));
        metrics.record_inserted(3);
        let exporter = Exporter::new(metrics, &config::Exporter::default());

        let request = Request::get("/metrics").body(Body::empty()).unwrap();
        let response = exporter.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], CONTENT_TYPE);
    }
}
