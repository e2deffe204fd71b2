use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::exporter::Exporter;

/// The maximum backlog for TCP listen sockets before refusing connections.
const TCP_LISTEN_BACKLOG: u32 = 1024;

/// Binds the exporter address and serves `exporter` in the background.
///
/// A failure to bind is logged and returns `None`; the benchmark continues without an exporter.
pub fn spawn(
    exporter: Exporter,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    let listener = match listen(addr).context("failed to start metrics exporter") {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!("{error:#}");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        if let Err(error) = exporter.serve(listener, shutdown).await {
            tracing::error!("metrics exporter failed: {error:#}");
        }
    }))
}

/// Opens a TCP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn listen(addr: SocketAddr) -> Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }?;

    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;

    let listener = socket.listen(TCP_LISTEN_BACKLOG)?;
    tracing::info!("metrics exporter listening on {}", listener.local_addr()?);

    Ok(listener)
}
