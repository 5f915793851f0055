//! Bus-facing plumbing: service addressing, the transport seam, acquired
//! handles and the acquisition driver.

use std::fmt;
use std::sync::Arc;

use zbus::zvariant::{OwnedValue, Str};

pub mod error;
pub mod handle;
pub mod manager;
pub mod transport;

pub use error::{AcquisitionError, CallError, DecodeError, PanelError, ValidationError};
pub use handle::{HandleState, ServiceHandle};
pub use manager::AcquisitionDriver;
pub use transport::{RemoteObject, Transport, ZbusTransport};

/// Which message bus a service lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusKind {
    Session,
    System,
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusKind::Session => f.write_str("session"),
            BusKind::System => f.write_str("system"),
        }
    }
}

/// The (bus, name, path, interface) tuple a proxy acquisition resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceAddress {
    pub bus: BusKind,
    pub bus_name: String,
    pub object_path: String,
    pub interface: String,
}

impl ServiceAddress {
    pub fn new(
        bus: BusKind,
        bus_name: impl Into<String>,
        object_path: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            bus_name: bus_name.into(),
            object_path: object_path.into(),
            interface: interface.into(),
        }
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bus)", self.interface, self.bus)
    }
}

/// Packs a string into a call-argument value.
pub fn string_arg(s: &str) -> OwnedValue {
    OwnedValue::from(Str::from(s.to_owned()))
}

/// Implemented by every panel that registers proxies on the bus.
///
/// Registration kicks off the panel's asynchronous acquisitions and returns
/// immediately; completion is reported through the panel's event stream.
pub trait Registrable: Send + Sync {
    fn register_on_bus(self: &Arc<Self>);
}
