//! Shell panel: talks to the display-server shell and its extensions
//! service on the session bus.
//!
//! Two proxies are acquired independently; losing one leaves the other's
//! affordances intact. The shell proxy only serves fire-and-forget commands
//! and the cached `ShellVersion` property; the extensions proxy feeds the
//! record store through `ListExtensions`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::error::{CallError, PanelError};
use crate::bus::{AcquisitionDriver, Registrable, ServiceHandle, Transport};
use crate::config::Settings;
use crate::decode::decode_extensions;
use crate::panels::{PanelEvent, PanelKind, PanelSender};
use crate::records::{ExtensionInfo, ServiceRecord, SharedRecordStore};

const FOCUS_SEARCH: &str = "FocusSearch";
const SHOW_APPLICATIONS: &str = "ShowApplications";
const SHELL_VERSION_PROPERTY: &str = "ShellVersion";
const LIST_EXTENSIONS: &str = "ListExtensions";
const LAUNCH_EXTENSION_PREFS: &str = "LaunchExtensionPrefs";

pub struct ShellPanel {
    driver: AcquisitionDriver,
    state: Mutex<ShellState>,
    store: SharedRecordStore,
    events: PanelSender,
}

struct ShellState {
    shell: ServiceHandle,
    extensions: ServiceHandle,
    shell_version: Option<String>,
}

impl ShellPanel {
    pub fn new(
        transport: Arc<dyn Transport>,
        settings: &Settings,
        events: PanelSender,
        cancel: CancellationToken,
    ) -> Self {
        let call_timeout = settings.call_timeout();
        Self {
            driver: AcquisitionDriver::new(transport, cancel, settings.acquire_timeout()),
            state: Mutex::new(ShellState {
                shell: ServiceHandle::new(settings.shell_address(), call_timeout),
                extensions: ServiceHandle::new(settings.shell_extensions_address(), call_timeout),
                shell_version: None,
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

    /// Acquires both proxies concurrently and issues the follow-up queries.
    /// One service failing never blocks the other.
    pub async fn start(&self) {
        if self.driver.is_cancelled() {
            return;
        }
        let generation = self.driver.begin_generation();
        {
            let mut state = self.state.lock().await;
            state.shell.mark_acquiring();
            state.extensions.mark_acquiring();
        }
        tokio::join!(
            self.acquire_shell(generation),
            self.acquire_extensions(generation)
        );
    }

    /// Re-runs the acquire-then-query sequence under a new generation.
    /// Replies belonging to the superseded round are discarded.
    pub async fn refresh(&self) {
        self.start().await;
    }

    fn superseded(&self, generation: u64) -> bool {
        self.driver.is_cancelled() || self.driver.current_generation() != generation
    }

    async fn acquire_shell(&self, generation: u64) {
        let address = { self.state.lock().await.shell.address().clone() };
        match self.driver.acquire(&address).await {
            None => {}
            Some(Err(err)) => {
                let mut state = self.state.lock().await;
                if self.superseded(generation) {
                    return;
                }
                state.shell.mark_failed();
                drop(state);
                self.events.acquisition_failed(&address, &err);
            }
            Some(Ok(remote)) => {
                let version = {
                    let mut state = self.state.lock().await;
                    if self.superseded(generation) {
                        return;
                    }
                    state.shell.attach(remote);
                    let version = state
                        .shell
                        .cached_property(SHELL_VERSION_PROPERTY)
                        .and_then(|value| String::try_from(value).ok())
                        .filter(|version| !version.is_empty());
                    state.shell_version.clone_from(&version);
                    version
                };
                info!(service = %address, "proxy acquired");
                match version {
                    Some(version) => self.events.send(PanelEvent::ShellVersion(version)),
                    None => warn!("{SHELL_VERSION_PROPERTY} property is not cached yet"),
                }
            }
        }
    }

    async fn acquire_extensions(&self, generation: u64) {
        let address = { self.state.lock().await.extensions.address().clone() };
        match self.driver.acquire(&address).await {
            None => {}
            Some(Err(err)) => {
                let mut state = self.state.lock().await;
                if self.superseded(generation) {
                    return;
                }
                state.extensions.mark_failed();
                // Earlier rounds' records must not stay resolvable against
                // a failed handle.
                self.store.clear();
                drop(state);
                self.events.enablement(PanelKind::Shell, false);
                self.events.acquisition_failed(&address, &err);
            }
            Some(Ok(remote)) => {
                {
                    let mut state = self.state.lock().await;
                    if self.superseded(generation) {
                        return;
                    }
                    state.extensions.attach(remote);
                }
                info!(service = %address, "proxy acquired");
                self.refresh_extensions(generation).await;
            }
        }
    }

    async fn refresh_extensions(&self, generation: u64) {
        let handle = { self.state.lock().await.extensions.clone() };
        let entries = match handle.call_keyed_fields(LIST_EXTENSIONS, Vec::new()).await {
            Ok(entries) => entries,
            Err(err) => {
                self.events
                    .call_failed(handle.address(), LIST_EXTENSIONS, err.to_string());
                return;
            }
        };
        let records = match decode_extensions(&entries) {
            Ok(records) => records,
            Err(err) => {
                self.events
                    .call_failed(handle.address(), LIST_EXTENSIONS, err.to_string());
                return;
            }
        };

        // Hold the state lock while swapping so a newer round cannot
        // interleave between the generation check and the replace.
        let guard = self.state.lock().await;
        if self.superseded(generation) {
            return;
        }
        self.store.replace(records.clone());
        drop(guard);

        debug!(count = records.len(), "extension list refreshed");
        self.events.refreshed(PanelKind::Shell, records);
    }

    pub async fn focus_search(&self) {
        let handle = { self.state.lock().await.shell.clone() };
        handle.call_fire_and_forget(FOCUS_SEARCH, Vec::new()).await;
    }

    pub async fn show_applications(&self) {
        let handle = { self.state.lock().await.shell.clone() };
        handle
            .call_fire_and_forget(SHOW_APPLICATIONS, Vec::new())
            .await;
    }

    pub async fn shell_version(&self) -> Option<String> {
        self.state.lock().await.shell_version.clone()
    }

    /// Maps a displayed row back to its extension record. A missing or
    /// unmatched key resolves to nothing.
    pub fn resolve_selection(&self, key: Option<&str>) -> Option<ExtensionInfo> {
        match self.store.find(key?)? {
            ServiceRecord::Extension(info) => Some(info),
            _ => None,
        }
    }

    /// Whether identifier-dependent actions are currently valid. Pure
    /// in-memory lookup, recomputed on every selection change.
    pub fn is_action_enabled(&self, key: Option<&str>) -> bool {
        self.resolve_selection(key).is_some()
    }

    /// Called by the UI on every selection change; republishes enablement.
    pub fn selection_changed(&self, key: Option<&str>) -> bool {
        let enabled = self.is_action_enabled(key);
        self.events.enablement(PanelKind::Shell, enabled);
        enabled
    }

    /// Opens the preferences dialog of the selected extension.
    pub async fn launch_extension_prefs(&self, selection: Option<&str>) -> Result<(), PanelError> {
        let info = self
            .resolve_selection(selection)
            .ok_or(PanelError::NoSelection)?;
        let handle = { self.state.lock().await.extensions.clone() };
        if !handle.is_acquired() {
            return Err(CallError::NotReady.into());
        }
        debug!(uuid = %info.uuid, "launching extension preferences");
        handle
            .call_fire_and_forget(LAUNCH_EXTENSION_PREFS, vec![crate::bus::string_arg(&info.uuid)])
            .await;
        Ok(())
    }
}

impl Registrable for ShellPanel {
    fn register_on_bus(self: &Arc<Self>) {
        let panel = Arc::clone(self);
        tokio::spawn(async move { panel.start().await });
    }
}
