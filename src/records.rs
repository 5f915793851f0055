//! Typed snapshots of remote entities and the cache that holds them.

use std::sync::{Arc, Mutex, PoisonError};

/// One installed shell extension, as reported by the shell-extensions
/// service. `uuid` is the stable identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub name: String,
    pub description: String,
    pub url: String,
    pub uuid: String,
}

/// One logind session. `session_id` is the stable identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: u32,
    pub user_name: String,
    pub seat_id: String,
    pub object_path: String,
}

/// A decoded record from exactly one list query. Immutable after
/// construction; refreshes replace the whole collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceRecord {
    Extension(ExtensionInfo),
    Session(SessionInfo),
}

impl ServiceRecord {
    /// The stable identifier a UI selection maps back to.
    pub fn identifier(&self) -> &str {
        match self {
            ServiceRecord::Extension(info) => &info.uuid,
            ServiceRecord::Session(info) => &info.session_id,
        }
    }
}

/// Holds the records of the most recent successful list query.
///
/// `revision` counts every mutation, which lets tests observe that a
/// cancelled or superseded operation performed none.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<ServiceRecord>,
    revision: u64,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically swaps the contents. Identifiers from a prior `replace` that
    /// are absent from `records` are gone afterwards.
    pub fn replace(&mut self, records: Vec<ServiceRecord>) {
        self.records = records;
        self.revision += 1;
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.revision += 1;
    }

    pub fn find(&self, identifier: &str) -> Option<&ServiceRecord> {
        self.records.iter().find(|r| r.identifier() == identifier)
    }

    pub fn records(&self) -> &[ServiceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Shared view of a [`RecordStore`], lock-scoped and synchronous.
///
/// The lock is never held across an await point, so selection resolution
/// stays a pure in-memory lookup.
#[derive(Clone, Default)]
pub struct SharedRecordStore {
    inner: Arc<Mutex<RecordStore>>,
}

impl SharedRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn replace(&self, records: Vec<ServiceRecord>) {
        self.lock().replace(records);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn find(&self, identifier: &str) -> Option<ServiceRecord> {
        self.lock().find(identifier).cloned()
    }

    pub fn snapshot(&self) -> Vec<ServiceRecord> {
        self.lock().records().to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision()
    }
}
