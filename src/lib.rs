//! Asynchronous D-Bus service-proxy and session-cache layer for a desktop
//! control panel.
//!
//! The panel's GUI is a thin external collaborator; everything with actual
//! behavior lives here: acquiring named service proxies on the session and
//! system buses, issuing calls against them, decoding bus replies into typed
//! records, and caching those records so user selections can be resolved back
//! into call arguments. See `DESIGN.md` for the layout.

pub mod bus;
pub mod config;
pub mod decode;
pub mod panels;
pub mod records;
pub mod registry;
