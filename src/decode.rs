//! Pure decoding of bus reply payloads into typed records.
//!
//! No I/O happens here; every function takes already-received reply data and
//! either produces a full record list or rejects the payload outright. A
//! malformed payload never yields a partial list.

use std::collections::HashMap;

use zbus::zvariant::{OwnedValue, Value};

pub use crate::bus::error::DecodeError;
use crate::records::{ExtensionInfo, ServiceRecord, SessionInfo};

/// String-keyed field dictionary of one reply entry (`a{sv}` on the wire).
pub type FieldMap = HashMap<String, OwnedValue>;

/// Decodes uuid-keyed extension entries (`a{sa{sv}}`), one record per entry,
/// in the order the reply listed them. An entry with an empty identifier key
/// rejects the whole payload.
pub fn decode_extensions(
    entries: &[(String, FieldMap)],
) -> Result<Vec<ServiceRecord>, DecodeError> {
    let mut records = Vec::with_capacity(entries.len());
    for (key, fields) in entries {
        if key.is_empty() {
            return Err(DecodeError::MalformedPayload(
                "extension entry has an empty uuid key".into(),
            ));
        }

        // The inner uuid field and the outer key carry the same value on the
        // wire; fall back to the key so the identifier is always non-empty.
        let uuid = field_string(fields, "uuid")
            .filter(|uuid| !uuid.is_empty())
            .unwrap_or_else(|| key.clone());

        records.push(ServiceRecord::Extension(ExtensionInfo {
            name: field_string(fields, "name").unwrap_or_default(),
            description: field_string(fields, "description").unwrap_or_default(),
            url: field_string(fields, "url").unwrap_or_default(),
            uuid,
        }));
    }

    Ok(records)
}

/// Non-string or absent fields read as absent.
fn field_string(fields: &FieldMap, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(|value| value.try_clone().ok())
        .and_then(|value| String::try_from(value).ok())
}

/// Strips nested variant wrappers.
fn unwrap_variant<'a, 'v>(value: &'a Value<'v>) -> &'a Value<'v> {
    match value {
        Value::Value(inner) => unwrap_variant(inner),
        other => other,
    }
}

fn as_str<'a>(value: &'a Value<'_>) -> Option<&'a str> {
    match unwrap_variant(value) {
        Value::Str(s) => Some(s.as_str()),
        Value::ObjectPath(p) => Some(p.as_str()),
        _ => None,
    }
}

fn as_u32(value: &Value<'_>) -> Option<u32> {
    match unwrap_variant(value) {
        Value::U32(n) => Some(*n),
        _ => None,
    }
}

/// Decodes an `a(susso)` session-list reply, strictly positional.
pub fn decode_sessions(value: &Value<'_>) -> Result<Vec<ServiceRecord>, DecodeError> {
    let value = unwrap_variant(value);
    let Value::Array(array) = value else {
        return Err(DecodeError::MalformedPayload(format!(
            "expected a(susso) array, got `{}`",
            value.value_signature()
        )));
    };

    let mut records = Vec::new();
    for item in array.iter() {
        let Value::Structure(tuple) = unwrap_variant(item) else {
            return Err(DecodeError::MalformedPayload(
                "session entry is not a tuple".into(),
            ));
        };
        let fields = tuple.fields();
        if fields.len() != 5 {
            return Err(DecodeError::MalformedPayload(format!(
                "session tuple has arity {}, expected 5",
                fields.len()
            )));
        }

        let session_id = as_str(&fields[0])
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                DecodeError::MalformedPayload("session tuple has no session id".into())
            })?
            .to_owned();
        let user_id = as_u32(&fields[1]).ok_or_else(|| {
            DecodeError::MalformedPayload(format!(
                "session `{session_id}` user id is not a uint32"
            ))
        })?;

        records.push(ServiceRecord::Session(SessionInfo {
            session_id,
            user_id,
            user_name: as_str(&fields[2]).unwrap_or_default().to_owned(),
            seat_id: as_str(&fields[3]).unwrap_or_default().to_owned(),
            object_path: as_str(&fields[4]).unwrap_or_default().to_owned(),
        }));
    }

    Ok(records)
}
