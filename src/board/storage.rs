// Durable storage of the message table as a single JSON document

use crate::board::error::PersistenceError;
use crate::board::message::Message;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// File name of the snapshot inside the data directory
pub const MESSAGES_FILE: &str = "messages.json";

/// In-memory message table keyed by message id
pub type MessageTable = BTreeMap<String, Message>;

/// Whole-table JSON snapshot on disk.
///
/// Every save replaces the file atomically: the table is written to a
/// sibling `.tmp` file, flushed to disk, then renamed over the target.
#[derive(Debug, Clone)]
pub struct TableFile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl TableFile {
    /// Use `messages.json` inside `data_dir`, creating the directory if needed.
    pub async fn open(data_dir: &Path) -> Result<Self, PersistenceError> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .map_err(|source| PersistenceError::Io {
                path: data_dir.to_path_buf(),
                source,
            })?;

        Ok(Self::at(data_dir.join(MESSAGES_FILE)))
    }

    /// Use an explicit snapshot path. The parent directory must exist.
    pub fn at(path: PathBuf) -> Self {
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");

        Self {
            path,
            tmp_path: PathBuf::from(tmp),
        }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the table. A missing file is an empty table.
    ///
    /// Fails if the file cannot be read or parsed, or if any record breaks
    /// the table invariants.
    pub async fn load(&self) -> Result<MessageTable, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No snapshot at {:?}, starting empty", self.path);
                return Ok(MessageTable::new());
            }
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let table: MessageTable =
            serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Decode {
                path: self.path.clone(),
                source,
            })?;

        for (key, message) in &table {
            if key != &message.id {
                return Err(self.corrupt(format!(
                    "key {} does not match message id {}",
                    key, message.id
                )));
            }
            message.check_consistency().map_err(|reason| self.corrupt(reason))?;
        }

        Ok(table)
    }

    /// Replace the snapshot with `table`.
    ///
    /// On failure the previous snapshot is left in place and the temp file
    /// is removed.
    pub async fn save(&self, table: &MessageTable) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(table)?;

        if let Err(e) = self.write_and_rename(&bytes).await {
            match tokio::fs::remove_file(&self.tmp_path).await {
                Ok(()) => {}
                Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                Err(cleanup) => {
                    tracing::warn!("Failed to remove {:?}: {}", self.tmp_path, cleanup)
                }
            }
            return Err(e);
        }

        self.sync_parent_dir().await;
        Ok(())
    }

    async fn write_and_rename(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        let mut file = tokio::fs::File::create(&self.tmp_path)
            .await
            .map_err(|source| self.io_tmp(source))?;
        file.write_all(bytes)
            .await
            .map_err(|source| self.io_tmp(source))?;
        file.sync_all().await.map_err(|source| self.io_tmp(source))?;
        drop(file);

        tokio::fs::rename(&self.tmp_path, &self.path)
            .await
            .map_err(|source| PersistenceError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Flush the directory entry so the rename survives a crash.
    ///
    /// The new snapshot is already in place when this runs, so a failure is
    /// logged rather than reported as a failed save.
    #[cfg(unix)]
    async fn sync_parent_dir(&self) {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let result = match tokio::fs::File::open(dir).await {
            Ok(handle) => handle.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to sync directory {:?}: {}", dir, e);
        }
    }

    #[cfg(not(unix))]
    async fn sync_parent_dir(&self) {}

    fn io_tmp(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.tmp_path.clone(),
            source,
        }
    }

    fn corrupt(&self, reason: String) -> PersistenceError {
        PersistenceError::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }
}
