//! Acquisition driver shared by the panels.
//!
//! One driver per panel. It owns the panel's cancellation token, applies the
//! acquisition timeout, and hands out generation numbers so a reply from a
//! superseded acquisition can never overwrite newer state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bus::error::AcquisitionError;
use crate::bus::transport::{RemoteObject, Transport};
use crate::bus::ServiceAddress;

pub struct AcquisitionDriver {
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    acquire_timeout: Duration,
    generation: AtomicU64,
}

impl AcquisitionDriver {
    pub fn new(
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            cancel,
            acquire_timeout,
            generation: AtomicU64::new(0),
        }
    }

    /// Token guarding every acquisition and follow-up issued through this
    /// driver. Cancelling it is idempotent and safe after completion.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Starts a new acquisition round and returns its generation. Replies
    /// carrying an older generation must be discarded by the caller.
    pub fn begin_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Resolves `address` into a remote object.
    ///
    /// Returns `None` when the driver was cancelled before completion; in
    /// that case no state may be mutated on behalf of this attempt and no
    /// completion event is reported at all. Otherwise exactly one
    /// success-or-failure result is produced.
    pub async fn acquire(
        &self,
        address: &ServiceAddress,
    ) -> Option<Result<Arc<dyn RemoteObject>, AcquisitionError>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        debug!(service = %address, "acquiring proxy");
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = timeout(self.acquire_timeout, self.transport.connect(address)) => {
                Some(match result {
                    Ok(connected) => connected,
                    Err(_) => Err(AcquisitionError::Timeout(self.acquire_timeout)),
                })
            }
        }
    }
}
