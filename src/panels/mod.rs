//! Service-specific panels and the event stream they expose to the UI layer.

use tokio::sync::mpsc;
use tracing::warn;

use crate::bus::error::AcquisitionError;
use crate::bus::ServiceAddress;
use crate::records::ServiceRecord;

pub mod sessions;
pub mod shell;

pub use sessions::SessionPanel;
pub use shell::ShellPanel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Shell,
    Sessions,
}

/// What the UI layer consumes: render-ready record lists, action enablement,
/// and non-fatal failure notices.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    RecordsRefreshed {
        panel: PanelKind,
        records: Vec<ServiceRecord>,
    },
    ShellVersion(String),
    ActionEnablement {
        panel: PanelKind,
        enabled: bool,
    },
    ServiceFailure {
        service: String,
        message: String,
    },
}

/// Sender half of the UI event stream. A closed receiver is not an error;
/// events are simply dropped once nobody is rendering.
#[derive(Clone)]
pub struct PanelSender {
    tx: mpsc::UnboundedSender<PanelEvent>,
}

impl PanelSender {
    pub fn new(tx: mpsc::UnboundedSender<PanelEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PanelEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, event: PanelEvent) {
        let _ = self.tx.send(event);
    }

    pub fn refreshed(&self, panel: PanelKind, records: Vec<ServiceRecord>) {
        self.send(PanelEvent::RecordsRefreshed { panel, records });
    }

    pub fn enablement(&self, panel: PanelKind, enabled: bool) {
        self.send(PanelEvent::ActionEnablement { panel, enabled });
    }

    pub fn acquisition_failed(&self, address: &ServiceAddress, err: &AcquisitionError) {
        warn!(service = %address, error = %err, "proxy acquisition failed");
        self.send(PanelEvent::ServiceFailure {
            service: address.interface.clone(),
            message: err.to_string(),
        });
    }

    pub fn call_failed(&self, address: &ServiceAddress, method: &str, message: String) {
        warn!(service = %address, method, message, "remote call failed");
        self.send(PanelEvent::ServiceFailure {
            service: address.interface.clone(),
            message,
        });
    }
}
