//! Headless runner for the control-panel service layer.
//!
//! Stands in for the GUI: connects to the real buses, registers both panels,
//! and logs every event a frontend would render. Exits on ctrl-c.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use deskbus::bus::ZbusTransport;
use deskbus::config::Settings;
use deskbus::panels::{PanelEvent, PanelSender};
use deskbus::registry::PanelRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let settings = Settings::load();
    let (events, mut rx) = PanelSender::channel();
    let transport = Arc::new(ZbusTransport::new());
    let registry = PanelRegistry::new(transport, settings, events);

    let shell = registry.shell_panel().await;
    let _sessions = registry.session_panel().await;
    info!("panels registered, waiting for events");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            event = rx.recv() => match event {
                Some(event) => report(&event),
                None => break,
            }
        }
    }

    if let Some(version) = shell.shell_version().await {
        info!(version, "shell version at exit");
    }

    registry.shutdown();
    Ok(())
}

fn report(event: &PanelEvent) {
    match event {
        PanelEvent::RecordsRefreshed { panel, records } => {
            info!(?panel, count = records.len(), "records refreshed");
            for record in records {
                info!(id = record.identifier(), "  record");
            }
        }
        PanelEvent::ShellVersion(version) => info!(version, "shell version"),
        PanelEvent::ActionEnablement { panel, enabled } => {
            info!(?panel, enabled, "action enablement")
        }
        PanelEvent::ServiceFailure { service, message } => {
            warn!(service, message, "service failure")
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
