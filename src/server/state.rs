use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

use crate::server::session::TransferSession;

/// Shared handler state. Handlers only read the session.
#[derive(Clone)]
pub struct HostState {
    pub session: Arc<TransferSession>,
    active_transfers: Arc<AtomicUsize>,
}

impl HostState {
    pub fn new(session: TransferSession) -> Self {
        Self {
            session: Arc::new(session),
            active_transfers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Archive bodies currently being streamed.
    pub fn transfer_count(&self) -> usize {
        self.active_transfers.load(Ordering::SeqCst)
    }

    /// Count one transfer until the returned guard drops.
    pub fn begin_transfer(&self) -> TransferGuard {
        self.active_transfers.fetch_add(1, Ordering::SeqCst);
        TransferGuard {
            active: self.active_transfers.clone(),
        }
    }
}

/// RAII: one in-flight transfer.
pub struct TransferGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Reader that keeps its transfer counted for as long as the body lives.
pub struct GuardedReader<R> {
    inner: R,
    _guard: TransferGuard,
}

impl<R> GuardedReader<R> {
    pub fn new(inner: R, guard: TransferGuard) -> Self {
        Self {
            inner,
            _guard: guard,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for GuardedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}
