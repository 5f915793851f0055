//! Shared test doubles: an in-memory transport and bus payload builders.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use zbus::zvariant::{Array, ObjectPath, OwnedValue, Signature, StructureBuilder, Value};

use deskbus::bus::{
    string_arg, AcquisitionError, CallError, RemoteObject, ServiceAddress, Transport,
};
use deskbus::decode::FieldMap;

pub type KeyedEntries = Vec<(String, FieldMap)>;

/// One scripted remote service. Replies and cached properties are keyed by
/// method/property name; every invocation is logged for assertions.
#[derive(Default)]
pub struct MockService {
    replies: Mutex<HashMap<String, OwnedValue>>,
    keyed_replies: Mutex<HashMap<String, KeyedEntries>>,
    properties: Mutex<HashMap<String, OwnedValue>>,
    invocations: Mutex<Vec<(String, Vec<String>)>>,
    gate: Mutex<Option<(Arc<Semaphore>, KeyedEntries)>>,
}

impl MockService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_reply(&self, method: &str, reply: OwnedValue) {
        self.replies.lock().unwrap().insert(method.to_string(), reply);
    }

    pub fn set_keyed_reply(&self, method: &str, entries: KeyedEntries) {
        self.keyed_replies
            .lock()
            .unwrap()
            .insert(method.to_string(), entries);
    }

    pub fn set_property(&self, name: &str, value: OwnedValue) {
        self.properties.lock().unwrap().insert(name.to_string(), value);
    }

    /// Makes the next keyed-fields invocation park until a permit is added
    /// to `gate`, then answer with `entries` instead of the scripted reply.
    /// Only the first call after this is held.
    pub fn hold_next_keyed_reply(&self, gate: Arc<Semaphore>, entries: KeyedEntries) {
        *self.gate.lock().unwrap() = Some((gate, entries));
    }

    pub fn invocations(&self) -> Vec<(String, Vec<String>)> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn invoked_methods(&self) -> Vec<String> {
        self.invocations().into_iter().map(|(m, _)| m).collect()
    }

    fn log(&self, method: &str, args: &[OwnedValue]) {
        let rendered = args
            .iter()
            .map(|arg| {
                arg.try_clone()
                    .ok()
                    .and_then(|owned| String::try_from(owned).ok())
                    .unwrap_or_default()
            })
            .collect();
        self.invocations
            .lock()
            .unwrap()
            .push((method.to_string(), rendered));
    }
}

fn clone_entries(entries: &[(String, FieldMap)]) -> Result<KeyedEntries, CallError> {
    entries
        .iter()
        .map(|(key, fields)| {
            let fields = fields
                .iter()
                .map(|(name, value)| Ok((name.clone(), value.try_clone()?)))
                .collect::<Result<FieldMap, zbus::zvariant::Error>>()?;
            Ok((key.clone(), fields))
        })
        .collect::<Result<KeyedEntries, zbus::zvariant::Error>>()
        .map_err(|err| CallError::RemoteRejected(err.to_string()))
}

#[async_trait]
impl RemoteObject for MockService {
    async fn invoke(&self, method: &str, args: Vec<OwnedValue>) -> Result<OwnedValue, CallError> {
        self.log(method, &args);
        let replies = self.replies.lock().unwrap();
        match replies.get(method) {
            Some(reply) => reply
                .try_clone()
                .map_err(|err| CallError::RemoteRejected(err.to_string())),
            None => Err(CallError::RemoteRejected(format!(
                "no reply scripted for {method}"
            ))),
        }
    }

    async fn invoke_keyed_fields(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<Vec<(String, FieldMap)>, CallError> {
        self.log(method, &args);
        let gate = self.gate.lock().unwrap().take();
        if let Some((gate, entries)) = gate {
            let _permit = gate.acquire().await.unwrap();
            return clone_entries(&entries);
        }
        let replies = self.keyed_replies.lock().unwrap();
        match replies.get(method) {
            Some(entries) => clone_entries(entries),
            None => Err(CallError::RemoteRejected(format!(
                "no reply scripted for {method}"
            ))),
        }
    }

    async fn invoke_unit(&self, method: &str, args: Vec<OwnedValue>) -> Result<(), CallError> {
        self.log(method, &args);
        Ok(())
    }

    async fn invoke_fire_and_forget(
        &self,
        method: &str,
        args: Vec<OwnedValue>,
    ) -> Result<(), CallError> {
        self.log(method, &args);
        Ok(())
    }

    fn cached_property(&self, name: &str) -> Option<OwnedValue> {
        self.properties
            .lock()
            .unwrap()
            .get(name)
            .and_then(|value| value.try_clone().ok())
    }
}

#[derive(Clone)]
enum Outcome {
    Service(Arc<MockService>),
    Hang,
}

/// Transport whose services are scripted per interface name. Interfaces with
/// no entry are unavailable.
#[derive(Default)]
pub struct MockTransport {
    services: Mutex<HashMap<String, Outcome>>,
    connects: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, interface: &str, service: Arc<MockService>) {
        self.services
            .lock()
            .unwrap()
            .insert(interface.to_string(), Outcome::Service(service));
    }

    /// Acquisition of `interface` never completes (until cancelled).
    pub fn hang(&self, interface: &str) {
        self.services
            .lock()
            .unwrap()
            .insert(interface.to_string(), Outcome::Hang);
    }

    /// Makes `interface` unavailable for subsequent acquisitions.
    pub fn withdraw(&self, interface: &str) {
        self.services.lock().unwrap().remove(interface);
    }

    pub fn connect_attempts(&self) -> Vec<String> {
        self.connects.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        address: &ServiceAddress,
    ) -> Result<Arc<dyn RemoteObject>, AcquisitionError> {
        self.connects
            .lock()
            .unwrap()
            .push(address.interface.clone());
        let outcome = self.services.lock().unwrap().get(&address.interface).cloned();
        match outcome {
            Some(Outcome::Service(service)) => Ok(service as Arc<dyn RemoteObject>),
            Some(Outcome::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Err(AcquisitionError::ServiceUnavailable(format!(
                "{} is not registered",
                address.interface
            ))),
        }
    }
}

/// Builds ordered extension-list entries from
/// `(uuid, name, description, url)` rows, as the wire would deliver them.
pub fn extension_entries(rows: &[(&str, &str, &str, &str)]) -> KeyedEntries {
    rows.iter()
        .map(|(uuid, name, description, url)| {
            let mut fields = FieldMap::new();
            for (key, value) in [
                ("uuid", uuid),
                ("name", name),
                ("description", description),
                ("url", url),
            ] {
                fields.insert(key.to_string(), string_arg(value));
            }
            ((*uuid).to_string(), fields)
        })
        .collect()
}

/// Builds an `a(susso)` session-list payload from
/// `(session_id, user_id, user_name, seat_id, object_path)` rows.
pub fn sessions_payload(rows: &[(&str, u32, &str, &str, &str)]) -> OwnedValue {
    let mut array = Array::new(Signature::try_from("(susso)").unwrap());
    for (session_id, user_id, user_name, seat_id, object_path) in rows {
        let structure = StructureBuilder::new()
            .add_field(session_id.to_string())
            .add_field(*user_id)
            .add_field(user_name.to_string())
            .add_field(seat_id.to_string())
            .append_field(Value::ObjectPath(
                ObjectPath::try_from(object_path.to_string()).unwrap(),
            ))
            .build();
        array.append(Value::from(structure)).unwrap();
    }
    OwnedValue::try_from(Value::Array(array)).unwrap()
}
