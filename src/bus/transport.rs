//! Transport seam over the bus client library.
//!
//! The rest of the crate only sees [`Transport`] and [`RemoteObject`]; the
//! production implementation speaks zbus, tests substitute a mock. Both buses
//! are connected lazily on first use.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;
use zbus::proxy::CacheProperties;
use zbus::zvariant::{OwnedValue, StructureBuilder, Value};
use zbus::{Connection, Proxy};

use crate::bus::error::{AcquisitionError, CallError};
use crate::bus::{BusKind, ServiceAddress};

/// Resolves a [`ServiceAddress`] into a callable remote object.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(
        &self,
        address: &ServiceAddress,
    ) -> Result<Arc<dyn RemoteObject>, AcquisitionError>;
}

/// One acquired connection to a named remote interface.
#[async_trait]
pub trait RemoteObject: Send + Sync + 'static {
    /// Result-bearing call; the reply body is returned as an opaque value.
    async fn invoke(&self, method: &str, args: Vec<OwnedValue>) -> Result<OwnedValue, CallError>;

    /// Result-bearing call whose reply is a string-keyed dictionary of field
    /// dictionaries (`a{sa{sv}}`). Entries come back in reply order.
    async fn invoke_keyed_fields(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<Vec<(String, HashMap<String, OwnedValue>)>, CallError>;

    /// Call whose reply carries no body; completion is still awaited so the
    /// remote error, if any, is observable.
    async fn invoke_unit(&self, method: &str, args: Vec<OwnedValue>) -> Result<(), CallError>;

    /// Fire-and-forget call; no reply is requested from the remote.
    async fn invoke_fire_and_forget(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<(), CallError>;

    /// Reads a property from the local cache. Never triggers a round-trip;
    /// `None` until the cache has been populated by the remote.
    fn cached_property(&self, name: &str) -> Option<OwnedValue>;
}

/// Production transport backed by zbus, one lazily-established connection per
/// bus kind.
#[derive(Default)]
pub struct ZbusTransport {
    session: OnceCell<Connection>,
    system: OnceCell<Connection>,
}

impl ZbusTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn connection(&self, bus: BusKind) -> zbus::Result<&Connection> {
        match bus {
            BusKind::Session => self.session.get_or_try_init(Connection::session).await,
            BusKind::System => self.system.get_or_try_init(Connection::system).await,
        }
    }
}

#[async_trait]
impl Transport for ZbusTransport {
    async fn connect(
        &self,
        address: &ServiceAddress,
    ) -> Result<Arc<dyn RemoteObject>, AcquisitionError> {
        let connection = self
            .connection(address.bus)
            .await
            .map_err(AcquisitionError::from_zbus)?;

        // CacheProperties::Yes mirrors the GetAll-at-construction behavior
        // the panels rely on for cached-property reads.
        let proxy = zbus::proxy::Builder::new(connection)
            .destination(address.bus_name.clone())
            .map_err(AcquisitionError::from_zbus)?
            .path(address.object_path.clone())
            .map_err(AcquisitionError::from_zbus)?
            .interface(address.interface.clone())
            .map_err(AcquisitionError::from_zbus)?
            .cache_properties(CacheProperties::Yes)
            .build()
            .await
            .map_err(AcquisitionError::from_zbus)?;

        debug!(service = %address, "proxy built");
        Ok(Arc::new(ZbusRemote { proxy }))
    }
}

struct ZbusRemote {
    proxy: Proxy<'static>,
}

impl ZbusRemote {
    async fn call_raw(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> zbus::Result<zbus::message::Message> {
        if args.is_empty() {
            self.proxy.call_method(method, &()).await
        } else {
            let mut builder = StructureBuilder::new();
            for arg in args {
                builder = builder.append_field(Value::from(arg));
            }
            self.proxy.call_method(method, &builder.build()).await
        }
    }
}

#[async_trait]
impl RemoteObject for ZbusRemote {
    async fn invoke(&self, method: &str, args: Vec<OwnedValue>) -> Result<OwnedValue, CallError> {
        let reply = self
            .call_raw(method, args)
            .await
            .map_err(CallError::from_zbus)?;
        let body = reply.body();
        let value: Value = body.deserialize().map_err(CallError::from_zbus)?;
        OwnedValue::try_from(value)
            .map_err(|err| CallError::RemoteRejected(format!("unreadable reply body: {err}")))
    }

    async fn invoke_keyed_fields(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<Vec<(String, HashMap<String, OwnedValue>)>, CallError> {
        let reply = self
            .call_raw(method, args)
            .await
            .map_err(CallError::from_zbus)?;
        let body = reply.body();
        // Deserializing as an array of entry structs keeps the reply's entry
        // order (dict entries and structs share the same wire layout);
        // zvariant's own Dict is key-sorted.
        let entries: Vec<(String, HashMap<String, OwnedValue>)> = body
            .deserialize_unchecked()
            .map_err(CallError::from_zbus)?;
        Ok(entries)
    }

    async fn invoke_unit(&self, method: &str, args: Vec<OwnedValue>) -> Result<(), CallError> {
        self.call_raw(method, args)
            .await
            .map(|_| ())
            .map_err(CallError::from_zbus)
    }

    async fn invoke_fire_and_forget(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<(), CallError> {
        if args.is_empty() {
            self.proxy
                .call_noreply(method, &())
                .await
                .map_err(CallError::from_zbus)
        } else {
            let mut builder = StructureBuilder::new();
            for arg in args {
                builder = builder.append_field(Value::from(arg));
            }
            self.proxy
                .call_noreply(method, &builder.build())
                .await
                .map_err(CallError::from_zbus)
        }
    }

    fn cached_property(&self, name: &str) -> Option<OwnedValue> {
        let value = self.proxy.cached_property_raw(name)?;
        value.try_to_owned().ok()
    }
}
