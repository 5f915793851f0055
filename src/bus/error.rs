//! Error taxonomy for the proxy layer.
//!
//! Nothing in here is fatal: acquisition and call failures are logged and
//! surfaced to the UI as notices, validation failures are rejected before any
//! bus traffic, and decode failures discard the offending reply.

use std::time::Duration;

use thiserror::Error;

/// Failure to resolve a named service into a callable handle.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("acquisition timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of a remote call against an acquired handle.
#[derive(Debug, Error)]
pub enum CallError {
    /// The handle is not in the `Acquired` state. Reported without touching
    /// the bus; calling an unacquired handle is a programming error.
    #[error("service handle is not ready")]
    NotReady,
    #[error("remote rejected the call: {0}")]
    RemoteRejected(String),
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("call was cancelled")]
    Cancelled,
}

/// A reply payload that does not match the expected shape.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Rejection of user-supplied input before any call is dispatched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("session identifiers may only contain digits")]
    NonNumericInput,
}

/// Umbrella error for panel-level operations exposed to the UI layer.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("selection does not resolve to a record")]
    NoSelection,
}

impl AcquisitionError {
    /// Maps a transport error onto the acquisition taxonomy by its D-Bus
    /// error name.
    pub(crate) fn from_zbus(err: zbus::Error) -> Self {
        if let zbus::Error::MethodError(name, detail, _) = &err {
            let detail = detail.clone().unwrap_or_default();
            return match name.as_str() {
                "org.freedesktop.DBus.Error.AccessDenied" => Self::PermissionDenied(detail),
                "org.freedesktop.DBus.Error.NoReply"
                | "org.freedesktop.DBus.Error.TimedOut" => {
                    Self::ServiceUnavailable(format!("no reply: {detail}"))
                }
                _ => Self::ServiceUnavailable(detail),
            };
        }
        Self::ServiceUnavailable(err.to_string())
    }
}

impl CallError {
    pub(crate) fn from_zbus(err: zbus::Error) -> Self {
        match &err {
            zbus::Error::MethodError(name, detail, _) => Self::RemoteRejected(format!(
                "{}: {}",
                name.as_str(),
                detail.clone().unwrap_or_default()
            )),
            _ => Self::RemoteRejected(err.to_string()),
        }
    }
}
