//! Reading and writing the configuration file

use crate::config::ConfigData;
use crate::error::{ConfigError, PersistenceError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::fs;

/// External store the configuration is loaded from and mirrored to
#[async_trait]
pub trait ConfigPersistence: Send + Sync {
    async fn read(&self) -> Result<ConfigData, ConfigError>;

    async fn write(&self, data: &ConfigData) -> Result<(), PersistenceError>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}

/// JSON file on local disk
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigPersistence for JsonFileStore {
    async fn read(&self) -> Result<ConfigData, ConfigError> {
        let data: ConfigData = read_json(&self.path, 0).await?;
        data.validate()?;
        Ok(data)
    }

    async fn write(&self, data: &ConfigData) -> Result<(), PersistenceError> {
        // The file must already exist; a missing file means a misconfigured path.
        match fs::metadata(&self.path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(self.path.clone()));
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(PersistenceError::Permission(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        let contents = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, contents).await.map_err(|e| {
            if e.kind() == ErrorKind::PermissionDenied {
                PersistenceError::Permission(self.path.clone())
            } else {
                PersistenceError::Io(e)
            }
        })
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Read a JSON file, rejecting files shorter than `min_len` characters
pub(crate) async fn read_json<T: DeserializeOwned>(
    path: &Path,
    min_len: usize,
) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Io(e)
        }
    })?;

    let actual = contents.chars().count();
    if min_len > 0 && actual < min_len {
        return Err(ConfigError::TooShort {
            path: path.to_path_buf(),
            expected: min_len,
            actual,
        });
    }

    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// In-memory store that records every write
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Option<ConfigData>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new(data: ConfigData) -> Self {
        Self {
            data: Mutex::new(Some(data)),
            ..Default::default()
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Last successfully written configuration
    pub fn stored(&self) -> Option<ConfigData> {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigPersistence for MemoryStore {
    async fn read(&self) -> Result<ConfigData, ConfigError> {
        let data = self
            .stored()
            .ok_or_else(|| ConfigError::NotFound(PathBuf::from("memory")))?;
        data.validate()?;
        Ok(data)
    }

    async fn write(&self, data: &ConfigData) -> Result<(), PersistenceError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Permission(PathBuf::from("memory")));
        }
        *self.data.lock().unwrap_or_else(PoisonError::into_inner) = Some(data.clone());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
