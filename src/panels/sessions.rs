//! Sessions panel: talks to the privileged session manager on the system
//! bus.
//!
//! `ListSessions` fills the record store on acquisition; `LockSession` is
//! guarded by numeric-only validation of the identifier before any call is
//! dispatched.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zbus::zvariant::Value;

use crate::bus::error::{CallError, PanelError, ValidationError};
use crate::bus::{AcquisitionDriver, Registrable, ServiceHandle, Transport};
use crate::config::Settings;
use crate::decode::decode_sessions;
use crate::panels::{PanelKind, PanelSender};
use crate::records::{ServiceRecord, SessionInfo, SharedRecordStore};

const LIST_SESSIONS: &str = "ListSessions";
const LOCK_SESSION: &str = "LockSession";

/// Rejects identifiers that are empty or contain any non-digit character.
/// Runs before any bus traffic is attempted.
pub fn validate_session_id(input: &str) -> Result<&str, ValidationError> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::NonNumericInput);
    }
    Ok(input)
}

pub struct SessionPanel {
    driver: AcquisitionDriver,
    state: Mutex<SessionState>,
    store: SharedRecordStore,
    events: PanelSender,
}

struct SessionState {
    manager: ServiceHandle,
}

impl SessionPanel {
    pub fn new(
        transport: Arc<dyn Transport>,
        settings: &Settings,
        events: PanelSender,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            driver: AcquisitionDriver::new(transport, cancel, settings.acquire_timeout()),
            state: Mutex::new(SessionState {
                manager: ServiceHandle::new(
                    settings.session_manager_address(),
                    settings.call_timeout(),
                ),
            }),
            store: SharedRecordStore::new(),
            events,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        self.driver.cancel_token()
    }

    pub fn store(&self) -> &SharedRecordStore {
        &self.store
    }

    pub async fn start(&self) {
        if self.driver.is_cancelled() {
            return;
        }
        let generation = self.driver.begin_generation();
        {
            let mut state = self.state.lock().await;
            state.manager.mark_acquiring();
        }
        self.acquire_manager(generation).await;
    }

    pub async fn refresh(&self) {
        self.start().await;
    }

    fn superseded(&self, generation: u64) -> bool {
        self.driver.is_cancelled() || self.driver.current_generation() != generation
    }

    async fn acquire_manager(&self, generation: u64) {
        let address = { self.state.lock().await.manager.address().clone() };
        match self.driver.acquire(&address).await {
            None => {}
            Some(Err(err)) => {
                let mut state = self.state.lock().await;
                if self.superseded(generation) {
                    return;
                }
                state.manager.mark_failed();
                // Earlier rounds' records must not stay resolvable against
                // a failed handle.
                self.store.clear();
                drop(state);
                self.events.enablement(PanelKind::Sessions, false);
                self.events.acquisition_failed(&address, &err);
            }
            Some(Ok(remote)) => {
                {
                    let mut state = self.state.lock().await;
                    if self.superseded(generation) {
                        return;
                    }
                    state.manager.attach(remote);
                }
                info!(service = %address, "proxy acquired");
                self.refresh_sessions(generation).await;
            }
        }
    }

    async fn refresh_sessions(&self, generation: u64) {
        let handle = { self.state.lock().await.manager.clone() };
        let reply = match handle.call(LIST_SESSIONS, Vec::new()).await {
            Ok(reply) => reply,
            Err(err) => {
                self.events
                    .call_failed(handle.address(), LIST_SESSIONS, err.to_string());
                return;
            }
        };
        let records = match decode_sessions(&Value::from(reply)) {
            Ok(records) => records,
            Err(err) => {
                self.events
                    .call_failed(handle.address(), LIST_SESSIONS, err.to_string());
                return;
            }
        };

        let guard = self.state.lock().await;
        if self.superseded(generation) {
            return;
        }
        self.store.replace(records.clone());
        drop(guard);

        debug!(count = records.len(), "session list refreshed");
        self.events.refreshed(PanelKind::Sessions, records);
    }

    pub fn resolve_selection(&self, key: Option<&str>) -> Option<SessionInfo> {
        match self.store.find(key?)? {
            ServiceRecord::Session(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_action_enabled(&self, key: Option<&str>) -> bool {
        self.resolve_selection(key).is_some()
    }

    pub fn selection_changed(&self, key: Option<&str>) -> bool {
        let enabled = self.is_action_enabled(key);
        self.events.enablement(PanelKind::Sessions, enabled);
        enabled
    }

    /// Locks the session named by `raw_id` (typically the text of the
    /// session-id entry). The identifier must be all digits.
    pub async fn lock_session(&self, raw_id: &str) -> Result<(), PanelError> {
        let session_id = validate_session_id(raw_id)?;
        let handle = { self.state.lock().await.manager.clone() };
        if !handle.is_acquired() {
            return Err(CallError::NotReady.into());
        }
        debug!(session_id, "locking session");
        handle
            .call_fire_and_forget(LOCK_SESSION, vec![crate::bus::string_arg(session_id)])
            .await;
        Ok(())
    }
}

impl Registrable for SessionPanel {
    fn register_on_bus(self: &Arc<Self>) {
        let panel = Arc::clone(self);
        tokio::spawn(async move { panel.start().await });
    }
}
