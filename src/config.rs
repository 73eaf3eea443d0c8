//! Persisted zone configuration.
//!
//! The store keeps only what the hardware cannot report: zone names and
//! max-volume caps. Layout mirrors the sparse zone grid -- a list indexed by
//! controller id, each entry a list indexed by zone id, with `None` for
//! absent slots.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

pub const DEFAULT_MAX_VOLUME: u8 = 100;

/// One persisted zone entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneEntry {
    pub name: String,
    /// Only stored when a cap below the default is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxvol: Option<u8>,
}

/// Full persisted configuration: `zones[controller][zone]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    #[serde(default)]
    pub zones: Vec<Vec<Option<ZoneEntry>>>,
}

/// Backing store for the zone configuration.
pub trait ZoneStore: Send {
    fn load(&self) -> Result<ZoneConfig>;
    fn save(&self, config: &ZoneConfig) -> Result<()>;
}

/// JSON file store. A missing file loads as the empty configuration.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ZoneStore for JsonFileStore {
    fn load(&self) -> Result<ZoneConfig> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no zone configuration file, starting empty");
                Ok(ZoneConfig::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn save(&self, config: &ZoneConfig) -> Result<()> {
        let json = serde_json::to_vec_pretty(config)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// In-memory store for tests and embedders that persist elsewhere.
///
/// Clones share the same underlying configuration.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<ZoneConfig>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ZoneConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(config)),
        }
    }

    pub fn snapshot(&self) -> ZoneConfig {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ZoneStore for MemoryStore {
    fn load(&self) -> Result<ZoneConfig> {
        Ok(self.snapshot())
    }

    fn save(&self, config: &ZoneConfig) -> Result<()> {
        match self.inner.lock() {
            Ok(mut guard) => *guard = config.clone(),
            Err(poisoned) => *poisoned.into_inner() = config.clone(),
        }
        Ok(())
    }
}
