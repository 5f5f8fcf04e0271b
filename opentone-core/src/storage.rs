use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

pub type BoxedStorage = Arc<dyn Storage>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No stored object with key {0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Persists uploaded bytes. Variant and thumbnail generation belong to the
/// attachment pipeline behind this seam, not to opentone itself.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    async fn store(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;
    async fn retrieve(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Stores objects as plain files under a root directory
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root)?;

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are generated internally and never contain separators
        self.root.join(key)
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn store(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        tokio::fs::write(self.path_for(key), data).await?;

        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps objects in a map, useful for tests and throwaway setups
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), data.to_vec());

        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.entries
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}
