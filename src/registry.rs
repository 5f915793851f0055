//! Application-root registry of panel instances.
//!
//! At most one live instance per panel kind, constructed lazily on first use
//! and handed out as `Arc`s. The registry is owned by the application root
//! and passed by reference; there is no process-global state. `shutdown`
//! cancels every panel's token before anything else is released and is safe
//! to call repeatedly from any path.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bus::{Registrable, Transport};
use crate::config::Settings;
use crate::panels::{PanelSender, SessionPanel, ShellPanel};

pub struct PanelRegistry {
    transport: Arc<dyn Transport>,
    settings: Settings,
    events: PanelSender,
    cancel: CancellationToken,
    shell: OnceCell<Arc<ShellPanel>>,
    sessions: OnceCell<Arc<SessionPanel>>,
}

impl PanelRegistry {
    pub fn new(transport: Arc<dyn Transport>, settings: Settings, events: PanelSender) -> Self {
        Self {
            transport,
            settings,
            events,
            cancel: CancellationToken::new(),
            shell: OnceCell::new(),
            sessions: OnceCell::new(),
        }
    }

    /// The shell panel, created and registered on the bus on first use.
    pub async fn shell_panel(&self) -> Arc<ShellPanel> {
        self.shell
            .get_or_init(|| async {
                let panel = Arc::new(ShellPanel::new(
                    Arc::clone(&self.transport),
                    &self.settings,
                    self.events.clone(),
                    self.cancel.child_token(),
                ));
                panel.register_on_bus();
                panel
            })
            .await
            .clone()
    }

    /// The sessions panel, created and registered on the bus on first use.
    pub async fn session_panel(&self) -> Arc<SessionPanel> {
        self.sessions
            .get_or_init(|| async {
                let panel = Arc::new(SessionPanel::new(
                    Arc::clone(&self.transport),
                    &self.settings,
                    self.events.clone(),
                    self.cancel.child_token(),
                ));
                panel.register_on_bus();
                panel
            })
            .await
            .clone()
    }

    /// Cancels all in-flight acquisitions and calls. Idempotent; a panel
    /// requested after shutdown is constructed but never acquires anything,
    /// since its token is born cancelled.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!("shutting down panel registry");
            self.cancel.cancel();
        }
    }
}

impl Drop for PanelRegistry {
    fn drop(&mut self) {
        // Tokens fire before any panel resources are released.
        self.shutdown();
    }
}
