//! Runtime settings, overridable through an optional `deskbus.toml` next to
//! the binary. Constructed once in `main` and passed down by reference.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bus::{BusKind, ServiceAddress};

const CONFIG_FILE: &str = "deskbus.toml";

const SHELL_INTERFACE: &str = "org.gnome.Shell";
const SHELL_EXTENSIONS_INTERFACE: &str = "org.gnome.Shell.Extensions";
const SESSION_MANAGER_INTERFACE: &str = "org.freedesktop.login1.Manager";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Upper bound on one proxy acquisition, in milliseconds.
    pub acquire_timeout_ms: u64,
    /// Upper bound on one result-bearing call, in milliseconds.
    pub call_timeout_ms: u64,
    pub shell_bus_name: String,
    pub shell_object_path: String,
    pub session_manager_bus_name: String,
    pub session_manager_object_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 25_000,
            call_timeout_ms: 25_000,
            shell_bus_name: "org.gnome.Shell".to_string(),
            shell_object_path: "/org/gnome/Shell".to_string(),
            session_manager_bus_name: "org.freedesktop.login1".to_string(),
            session_manager_object_path: "/org/freedesktop/login1".to_string(),
        }
    }
}

impl Settings {
    /// Loads `deskbus.toml` when present; otherwise the defaults. A file
    /// that fails to parse is reported and ignored.
    pub fn load() -> Self {
        match std::fs::read_to_string(CONFIG_FILE) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!("Failed to parse {CONFIG_FILE}: {err}");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn shell_address(&self) -> ServiceAddress {
        ServiceAddress::new(
            BusKind::Session,
            &self.shell_bus_name,
            &self.shell_object_path,
            SHELL_INTERFACE,
        )
    }

    /// The extensions interface lives on the same name and path as the
    /// shell itself.
    pub fn shell_extensions_address(&self) -> ServiceAddress {
        ServiceAddress::new(
            BusKind::Session,
            &self.shell_bus_name,
            &self.shell_object_path,
            SHELL_EXTENSIONS_INTERFACE,
        )
    }

    pub fn session_manager_address(&self) -> ServiceAddress {
        ServiceAddress::new(
            BusKind::System,
            &self.session_manager_bus_name,
            &self.session_manager_object_path,
            SESSION_MANAGER_INTERFACE,
        )
    }
}
