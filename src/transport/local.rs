//! Listening socket bootstrap and local address discovery.

use anyhow::{Context, Result};
use std::net::{SocketAddr, TcpListener, UdpSocket};
use tokio::task::JoinHandle;

/// A server accepting connections in the background.
pub struct LocalServer {
    pub addr: SocketAddr,
    pub handle: axum_server::Handle,
    pub task: JoinHandle<std::io::Result<()>>,
}

/// Bind `address:port` and serve `app` on it. Port 0 picks a free port.
pub fn start_local_server(app: axum::Router, address: &str, port: u16) -> Result<LocalServer> {
    let listener = TcpListener::bind((address, port)).with_context(|| {
        format!(
            "Failed to bind {address}:{port} - port already in use?\n\n\
             Is another packnow host running?\n\
             Or is another service using this port?"
        )
    })?;

    listener
        .set_nonblocking(true)
        .context("Failed to set listener to non-blocking mode")?;

    let addr = listener.local_addr()?;

    let handle = axum_server::Handle::new();
    let server_handle = handle.clone();

    let task = tokio::spawn(async move {
        axum_server::from_tcp(listener)
            .handle(server_handle)
            .serve(app.into_make_service())
            .await
    });

    tracing::debug!(%addr, "listening");
    Ok(LocalServer { addr, handle, task })
}

/// Best-effort local non-loopback IP discovery for the announced URL.
pub fn get_local_ip() -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind socket for IP detection")?;

    // no packets are sent; connect only picks the outbound interface
    socket
        .connect("8.8.8.8:80")
        .context("Failed to connect socket for IP detection")?;

    let local_addr = socket.local_addr().context("Failed to get local address")?;

    Ok(local_addr.ip().to_string())
}
