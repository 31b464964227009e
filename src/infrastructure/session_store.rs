//! Session Store
//!
//! Durable record of the last acquired session so a later run can reconnect
//! without discovery. The on-disk layout is a flat JSON object:
//!
//! ```json
//! { "socket_uuid": "...", "mac_address": "..." }
//! ```
//!
//! A record missing either key is not an auto-reconnect target.

use crate::domain::models::SessionParams;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<SessionParams>;
    fn save(&self, params: &SessionParams) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;

    fn has_saved_session(&self) -> bool {
        self.load().is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SessionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    socket_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mac_address: Option<String>,
}

impl SessionRecord {
    fn params(&self) -> Option<SessionParams> {
        match (&self.socket_uuid, &self.mac_address) {
            (Some(uuid), Some(mac)) if !uuid.is_empty() && !mac.is_empty() => {
                Some(SessionParams {
                    device_uuid: uuid.clone(),
                    physical_address: mac.clone(),
                })
            }
            _ => None,
        }
    }
}

/// File-backed store. The file is read once on open; afterwards the in-memory
/// copy is authoritative and every change rewrites the file.
pub struct JsonSessionStore {
    path: PathBuf,
    record: Mutex<SessionRecord>,
}

impl JsonSessionStore {
    pub fn open(path: PathBuf) -> Self {
        let record = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring unreadable session record {:?}: {}", path, e);
                SessionRecord::default()
            }),
            Err(_) => SessionRecord::default(),
        };
        debug!(
            "Session record loaded from {:?} (complete: {})",
            path,
            record.params().is_some()
        );
        Self {
            path,
            record: Mutex::new(record),
        }
    }

    fn write(&self, record: &SessionRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(record)?)?;
        Ok(())
    }
}

impl SessionStore for JsonSessionStore {
    fn load(&self) -> Option<SessionParams> {
        self.record.lock().ok()?.params()
    }

    fn save(&self, params: &SessionParams) -> Result<(), StoreError> {
        let record = SessionRecord {
            socket_uuid: Some(params.device_uuid.clone()),
            mac_address: Some(params.physical_address.clone()),
        };
        self.write(&record)?;
        if let Ok(mut guard) = self.record.lock() {
            *guard = record;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        if let Ok(mut guard) = self.record.lock() {
            *guard = SessionRecord::default();
        }
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Volatile store, for tests and runs without a config directory.
#[derive(Default)]
pub struct MemorySessionStore {
    params: Mutex<Option<SessionParams>>,
}

impl MemorySessionStore {
    pub fn with_params(params: SessionParams) -> Self {
        Self {
            params: Mutex::new(Some(params)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<SessionParams> {
        self.params.lock().ok()?.clone()
    }

    fn save(&self, params: &SessionParams) -> Result<(), StoreError> {
        if let Ok(mut guard) = self.params.lock() {
            *guard = Some(params.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        if let Ok(mut guard) = self.params.lock() {
            *guard = None;
        }
        Ok(())
    }
}
