//! Streaming adapter from a blocking CID iterator to an async stream.
//!
//! A single worker on tokio's blocking pool drains the iterator into two
//! capacity-1 channels, one for values and one for errors. The first error is
//! sent and then both channels close; no value follows an error.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use indexprov_core::Cid;

use crate::error::SupplierError;
use crate::supplier::CidIterator;

/// Capacity of each channel.
pub const CHANNEL_CAPACITY: usize = 1;

/// Sets the shared flag when dropped, unless disarmed.
struct CancelGuard {
    flag: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(true, Ordering::SeqCst);
        }
    }
}

/// An async stream of CIDs fed by a blocking worker.
///
/// Yields every value, then the error (if any) last. Dropping the stream
/// cancels the worker.
pub struct EntryStream {
    values: mpsc::Receiver<Cid>,
    errors: mpsc::Receiver<SupplierError>,
    values_done: bool,
    finished: bool,
    guard: CancelGuard,
}

impl EntryStream {
    /// Start draining `iter` on the blocking pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(iter: CidIterator) -> Self {
        let (value_tx, values) = mpsc::channel(CHANNEL_CAPACITY);
        let (error_tx, errors) = mpsc::channel(CHANNEL_CAPACITY);
        let cancelled = Arc::new(AtomicBool::new(false));

        let flag = cancelled.clone();
        tokio::task::spawn_blocking(move || drain(iter, value_tx, error_tx, flag));

        Self {
            values,
            errors,
            values_done: false,
            finished: false,
            guard: CancelGuard {
                flag: cancelled,
                armed: true,
            },
        }
    }

    /// Stop the worker and close both channels.
    ///
    /// Values already buffered are still delivered.
    pub fn cancel(&mut self) {
        self.guard.flag.store(true, Ordering::SeqCst);
        self.values.close();
        self.errors.close();
    }

    pub fn is_cancelled(&self) -> bool {
        self.guard.flag.load(Ordering::SeqCst)
    }

    /// The raw value and error channels.
    ///
    /// Consumers must drain values before waiting on errors; the worker blocks
    /// on a full value channel. Dropping both receivers cancels the worker.
    pub fn into_channels(mut self) -> (mpsc::Receiver<Cid>, mpsc::Receiver<SupplierError>) {
        self.guard.armed = false;
        let EntryStream { values, errors, .. } = self;
        (values, errors)
    }
}

fn drain(
    iter: CidIterator,
    values: mpsc::Sender<Cid>,
    errors: mpsc::Sender<SupplierError>,
    cancelled: Arc<AtomicBool>,
) {
    let mut sent = 0usize;
    for item in iter {
        if cancelled.load(Ordering::SeqCst) {
            tracing::debug!(sent, "entry stream cancelled");
            return;
        }
        match item {
            Ok(cid) => {
                if values.blocking_send(cid).is_err() {
                    tracing::debug!(sent, "entry stream receiver dropped");
                    return;
                }
                sent += 1;
            }
            Err(e) => {
                tracing::warn!(sent, error = %e, "entry stream stopped on error");
                let _ = errors.blocking_send(e);
                return;
            }
        }
    }
    tracing::debug!(sent, "entry stream exhausted");
}

impl Stream for EntryStream {
    type Item = Result<Cid, SupplierError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if !this.values_done {
            match this.values.poll_recv(cx) {
                Poll::Ready(Some(cid)) => return Poll::Ready(Some(Ok(cid))),
                Poll::Ready(None) => this.values_done = true,
                Poll::Pending => return Poll::Pending,
            }
        }

        // The worker sends its error before dropping the value sender, so it is
        // already buffered once the value channel reports closed.
        match this.errors.poll_recv(cx) {
            Poll::Ready(Some(e)) => {
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
