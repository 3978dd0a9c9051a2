//! # Modhost Record Store
//!
//! [`RecordStore`] owns the [`Records`] and serializes every write through one
//! async mutex. A transaction runs against a working copy; the copy replaces
//! the live state only after the closure succeeded and, for file-backed
//! stores, after the snapshot was written. Readers therefore never observe a
//! partially applied unit.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use tokio::sync::Mutex;

use crate::kernel::error::Result;
use crate::storage::error::StorageSystemError;
use crate::storage::provider::StorageProvider;
use crate::storage::records::{Records, StoreTransaction};

struct Snapshot {
    provider: Arc<dyn StorageProvider>,
    path: PathBuf,
}

impl Snapshot {
    fn write(&self, records: &Records) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records).map_err(|e| StorageSystemError::SerializationError {
            format: "json".to_string(),
            source: Box::new(e),
        })?;
        self.provider.write_bytes(&self.path, &bytes)
    }
}

/// Transactional store of every persisted record.
pub struct RecordStore {
    state: Mutex<Records>,
    snapshot: Option<Snapshot>,
}

impl RecordStore {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(Records::default()),
            snapshot: None,
        }
    }

    /// Open a file-backed store, loading `path` when it exists.
    pub fn open(provider: Arc<dyn StorageProvider>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if provider.is_file(&path) {
            let bytes = provider.read_to_bytes(&path)?;
            serde_json::from_slice(&bytes).map_err(|e| StorageSystemError::DeserializationError {
                format: "json".to_string(),
                source: Box::new(e),
            })?
        } else {
            Records::default()
        };
        debug!("Opened record store at {}", path.display());
        Ok(Self {
            state: Mutex::new(records),
            snapshot: Some(Snapshot { provider, path }),
        })
    }

    /// Run `f` as one atomic unit.
    ///
    /// Changes made through the [`StoreTransaction`] become visible only when
    /// `f` returns `Ok` and the snapshot (if any) was persisted. Otherwise the
    /// error is returned unchanged and the store is left as it was.
    pub async fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreTransaction<'_>) -> Result<T>,
    {
        let mut state = self.state.lock().await;
        let mut working = state.clone();
        let value = {
            let mut tx = StoreTransaction::new(&mut working);
            f(&mut tx)
        };
        let value = match value {
            Ok(value) => value,
            Err(e) => {
                debug!("Transaction rolled back: {}", e);
                return Err(e);
            }
        };
        if let Some(snapshot) = &self.snapshot {
            if let Err(e) = snapshot.write(&working) {
                debug!("Transaction rolled back, snapshot write failed: {}", e);
                return Err(e);
            }
        }
        *state = working;
        Ok(value)
    }

    /// Consistent read-only view of the current state.
    pub async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Records) -> T,
    {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Path of the snapshot file, `None` for in-memory stores.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_ref().map(|s| s.path.as_path())
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("snapshot", &self.snapshot_path())
            .finish()
    }
}
