use crate::material::Material;
use crate::store::{DataStore, TaskRecord};
use crate::user::User;
use crate::validation::ValidationError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use std::collections::HashMap;
use std::io;

/// Key of the slot that mirrors the signed-in user.
pub const SESSION_SLOT_KEY: &str = "music-flow-user";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<ValidationError> for PersistenceError {
    fn from(value: ValidationError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Named string slots that outlive the process, in the manner of browser
/// local storage.
pub trait SessionStorage: Send + Sync {
    fn read_slot(&self, key: &str) -> PersistenceResult<Option<String>>;
    fn write_slot(&self, key: &str, value: &str) -> PersistenceResult<()>;
    fn remove_slot(&self, key: &str) -> PersistenceResult<()>;
}

/// Whole-store persistence.
pub trait StoreBackend: Send + Sync {
    fn save_store(&self, store: &DataStore) -> PersistenceResult<()>;
    fn load_store(&self) -> PersistenceResult<Option<DataStore>>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn read_slot(&self, key: &str) -> PersistenceResult<Option<String>> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn write_slot(&self, key: &str, value: &str) -> PersistenceResult<()> {
        self.slots.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_slot(&self, key: &str) -> PersistenceResult<()> {
        self.slots.lock().remove(key);
        Ok(())
    }
}

/// Keeps the last saved snapshot in memory; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: Mutex<Option<StoreSnapshot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn save_store(&self, store: &DataStore) -> PersistenceResult<()> {
        *self.snapshot.lock() = Some(StoreSnapshot::from_store(store));
        Ok(())
    }

    fn load_store(&self) -> PersistenceResult<Option<DataStore>> {
        self.snapshot
            .lock()
            .clone()
            .map(StoreSnapshot::into_store)
            .transpose()
    }
}

/// Serialisable image of every collection in a [`DataStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub users: Vec<User>,
    pub files: Vec<Material>,
    pub tasks: Vec<TaskRecord>,
}

impl StoreSnapshot {
    pub fn from_store(store: &DataStore) -> Self {
        Self {
            users: store.users().to_vec(),
            files: store.files().to_vec(),
            tasks: store.task_records().to_vec(),
        }
    }

    pub fn into_store(self) -> PersistenceResult<DataStore> {
        Ok(DataStore::from_parts(self.users, self.files, self.tasks)?)
    }
}

pub mod file;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file::{
    FileSessionStorage, JsonFileBackend, load_store_from_json, load_tasks_from_csv,
    save_store_to_json, save_tasks_to_csv,
};
