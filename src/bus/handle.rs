//! A capability wrapping one acquired remote-service connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;
use zbus::zvariant::OwnedValue;

use crate::bus::error::CallError;
use crate::bus::transport::RemoteObject;
use crate::bus::ServiceAddress;

/// Lifecycle of a tracked service proxy. A handle reaches `Acquired` or
/// `Failed` at most once per acquisition attempt.
#[derive(Clone, Default)]
pub enum HandleState {
    #[default]
    Unacquired,
    Acquiring,
    Acquired(Arc<dyn RemoteObject>),
    Failed,
}

impl HandleState {
    pub fn name(&self) -> &'static str {
        match self {
            HandleState::Unacquired => "unacquired",
            HandleState::Acquiring => "acquiring",
            HandleState::Acquired(_) => "acquired",
            HandleState::Failed => "failed",
        }
    }
}

/// Typed call surface over one remote interface.
///
/// Cloning is cheap and yields a snapshot of the current state, so callers
/// can issue calls without holding the owning panel's lock across an await.
#[derive(Clone)]
pub struct ServiceHandle {
    address: ServiceAddress,
    state: HandleState,
    call_timeout: Duration,
}

impl ServiceHandle {
    pub fn new(address: ServiceAddress, call_timeout: Duration) -> Self {
        Self {
            address,
            state: HandleState::Unacquired,
            call_timeout,
        }
    }

    pub fn address(&self) -> &ServiceAddress {
        &self.address
    }

    pub fn state(&self) -> &HandleState {
        &self.state
    }

    pub fn is_acquired(&self) -> bool {
        matches!(self.state, HandleState::Acquired(_))
    }

    pub fn mark_acquiring(&mut self) {
        self.state = HandleState::Acquiring;
    }

    /// Completes the acquisition attempt with a live remote object.
    pub fn attach(&mut self, remote: Arc<dyn RemoteObject>) {
        if self.is_acquired() {
            warn!(service = %self.address, "handle already acquired, replacing remote");
        }
        self.state = HandleState::Acquired(remote);
    }

    pub fn mark_failed(&mut self) {
        self.state = HandleState::Failed;
    }

    fn remote(&self) -> Result<&Arc<dyn RemoteObject>, CallError> {
        match &self.state {
            HandleState::Acquired(remote) => Ok(remote),
            _ => Err(CallError::NotReady),
        }
    }

    /// Result-bearing call. `NotReady` unless the handle is `Acquired`.
    pub async fn call(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<OwnedValue, CallError> {
        let remote = self.remote()?;
        match timeout(self.call_timeout, remote.invoke(method, args)).await {
            Ok(result) => result,
            Err(_) => Err(CallError::Timeout(self.call_timeout)),
        }
    }

    /// Result-bearing call whose reply is a keyed dictionary of field
    /// dictionaries, returned in reply order.
    pub async fn call_keyed_fields(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<Vec<(String, HashMap<String, OwnedValue>)>, CallError> {
        let remote = self.remote()?;
        match timeout(self.call_timeout, remote.invoke_keyed_fields(method, args)).await {
            Ok(result) => result,
            Err(_) => Err(CallError::Timeout(self.call_timeout)),
        }
    }

    /// Call with an empty reply body; the remote's verdict is still awaited.
    pub async fn call_unit(&self, method: &str, args: Vec<OwnedValue>) -> Result<(), CallError> {
        let remote = self.remote()?;
        match timeout(self.call_timeout, remote.invoke_unit(method, args)).await {
            Ok(result) => result,
            Err(_) => Err(CallError::Timeout(self.call_timeout)),
        }
    }

    /// Fire-and-forget call for simple command methods. Failures are logged
    /// with the method name, never propagated.
    pub async fn call_fire_and_forget(&self, method: &str, args: Vec<OwnedValue>) {
        let result = match self.remote() {
            Ok(remote) => remote.invoke_fire_and_forget(method, args).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            warn!(service = %self.address, method, error = %err, "fire-and-forget call failed");
        }
    }

    /// Cached-property read; never blocks and never round-trips.
    pub fn cached_property(&self, name: &str) -> Option<OwnedValue> {
        match &self.state {
            HandleState::Acquired(remote) => remote.cached_property(name),
            _ => None,
        }
    }
}
