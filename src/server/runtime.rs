//! Host lifecycle: bind, announce, serve until Ctrl+C, shut down.

use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::output;
use crate::server::routes;
use crate::server::session::TransferSession;
use crate::server::state::HostState;
use crate::transport::{announce_url, start_local_server, LocalServer};

/// Everything a host needs, passed explicitly by the caller.
#[derive(Debug, Clone)]
pub struct HostOptions {
    pub address: String,
    pub port: u16,
    pub file: PathBuf,
    /// Empty or `None` leaves the archive unprotected
    pub secret: Option<String>,
    /// Announced URL override
    pub public_url: Option<String>,
}

/// How often a draining host rechecks its transfer count.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// A bound host serving in the background.
pub struct RunningHost {
    pub url: String,
    state: HostState,
    server: LocalServer,
}

impl RunningHost {
    pub fn local_addr(&self) -> SocketAddr {
        self.server.addr
    }

    /// Stop accepting connections, let archive transfers in flight finish,
    /// then close everything, idle keep-alive connections included. `force`
    /// cuts transfers that are still running.
    pub async fn shutdown_with<F>(self, force: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let RunningHost { state, server, .. } = self;
        let LocalServer { handle, task, .. } = server;

        handle.graceful_shutdown(None);
        tracing::info!("Server stopped accepting new connections");

        let forced = tokio::select! {
            _ = wait_for_transfers(&state) => false,
            _ = force => true,
        };
        if forced {
            tracing::warn!(
                "Forced shutdown with {} transfer(s) in flight",
                state.transfer_count()
            );
        }
        handle.shutdown();

        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) if forced => tracing::warn!("server error during forced shutdown: {err}"),
            Err(err) if forced => tracing::warn!("server task failed during forced shutdown: {err}"),
            Ok(Err(err)) => return Err(anyhow::Error::new(err).context("server error")),
            Err(err) => return Err(anyhow::Error::new(err).context("server task panicked")),
        }

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Resolve once no archive body is being streamed.
async fn wait_for_transfers(state: &HostState) {
    let mut last_count = state.transfer_count();
    if last_count == 0 {
        return;
    }
    tracing::info!("{last_count} transfer(s) in flight - press Ctrl+C again to cut them off");

    loop {
        tokio::time::sleep(DRAIN_POLL).await;
        let current_count = state.transfer_count();
        if current_count == 0 {
            tracing::info!("All transfers completed");
            return;
        }
        if current_count != last_count {
            tracing::info!("{current_count} transfer(s) remaining...");
            last_count = current_count;
        }
    }
}

/// Validate the archive, bind, and start serving. Does not block.
pub fn start_host(options: &HostOptions) -> Result<RunningHost> {
    let session = TransferSession::new(&options.file, options.secret.clone())?;
    tracing::info!(
        file = %session.path().display(),
        protected = session.requires_secret(),
        "hosting archive"
    );

    let state = HostState::new(session);
    let app = routes::create_host_router(&state);
    let server = start_local_server(app, &options.address, options.port)?;

    let url = announce_url(
        options.public_url.as_deref(),
        &options.address,
        server.addr.port(),
    );

    Ok(RunningHost { url, state, server })
}

/// Host until Ctrl+C. A second Ctrl+C drops in-flight transfers.
pub async fn run_host(options: HostOptions) -> Result<()> {
    let host = start_host(&options)?;
    output::host_banner(&host.url);

    wait_for_ctrl_c().await?;
    tracing::info!("Ctrl+C received - initiating graceful shutdown");
    output::host_closing();

    host.shutdown_with(async {
        if wait_for_ctrl_c().await.is_ok() {
            tracing::info!("Force shutdown requested");
        } else {
            // no second signal possible: let transfers drain
            std::future::pending::<()>().await;
        }
    })
    .await
}

async fn wait_for_ctrl_c() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")
}
