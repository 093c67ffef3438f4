// The message store: authoritative table plus its on-disk mirror

use crate::board::error::{StoreError, StoreResult, ValidationError};
use crate::board::message::{generate_id, validate_content, Message, SortOrder, Stats};
use crate::board::storage::{MessageTable, TableFile};
use chrono::Utc;
use std::path::Path;
use tokio::sync::RwLock;

/// Attempts at finding an unused id before giving up
const MAX_ID_ATTEMPTS: usize = 16;

type IdSource = Box<dyn Fn() -> String + Send + Sync>;

/// Message store shared by all request handlers.
///
/// The write lock is held across mutation and snapshot write, so a
/// successful `create` or `delete` is on disk before any reader can see it,
/// and a failed write leaves the in-memory table untouched.
pub struct MessageStore {
    table: RwLock<MessageTable>,
    file: TableFile,
    next_id: IdSource,
}

impl MessageStore {
    /// Open the store in `data_dir`, loading any existing snapshot.
    pub async fn open(data_dir: &Path) -> StoreResult<Self> {
        let file = TableFile::open(data_dir).await?;
        Self::with_file(file).await
    }

    /// Open the store on an explicit snapshot file.
    pub async fn with_file(file: TableFile) -> StoreResult<Self> {
        let table = file.load().await?;

        tracing::info!("Loaded {} messages from {:?}", table.len(), file.path());

        Ok(Self {
            table: RwLock::new(table),
            file,
            next_id: Box::new(generate_id),
        })
    }

    /// Replace the id generator.
    pub fn with_id_source<F>(mut self, source: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.next_id = Box::new(source);
        self
    }

    /// Post a new message.
    pub async fn create(&self, content: impl Into<String>) -> StoreResult<Message> {
        let content = content.into();
        validate_content(&content)?;

        let mut table = self.table.write().await;

        let id = self.unused_id(&table)?;
        let message = Message::new(id.clone(), content, Utc::now());
        table.insert(id.clone(), message.clone());

        if let Err(e) = self.file.save(&table).await {
            table.remove(&id);
            tracing::error!("Failed to persist new message {}: {}", id, e);
            return Err(e.into());
        }

        tracing::info!("Created message {} ({} chars)", id, message.char_count);
        Ok(message)
    }

    /// Look up a single message.
    pub async fn get(&self, id: &str) -> StoreResult<Message> {
        let table = self.table.read().await;
        table
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// One page of messages ordered by creation time.
    pub async fn list(
        &self,
        limit: i64,
        offset: i64,
        sort: SortOrder,
    ) -> StoreResult<Vec<Message>> {
        if limit < 0 {
            return Err(ValidationError::NegativeLimit(limit).into());
        }
        if offset < 0 {
            return Err(ValidationError::NegativeOffset(offset).into());
        }
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);

        let table = self.table.read().await;

        let mut ordered: Vec<&Message> = table.values().collect();
        ordered.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        if sort == SortOrder::Desc {
            ordered.reverse();
        }

        Ok(ordered
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    /// Remove a message. `authorized` is the caller's admin decision.
    pub async fn delete(&self, id: &str, authorized: bool) -> StoreResult<String> {
        if !authorized {
            tracing::warn!("Rejected unauthorized delete of {}", id);
            return Err(StoreError::Forbidden);
        }

        let mut table = self.table.write().await;

        let removed = table
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Err(e) = self.file.save(&table).await {
            tracing::error!("Failed to persist deletion of {}: {}", id, e);
            table.insert(removed.id.clone(), removed);
            return Err(e.into());
        }

        tracing::info!("Deleted message {}", removed.id);
        Ok(removed.id)
    }

    /// Aggregate statistics over the current table.
    pub async fn stats(&self) -> Stats {
        let table = self.table.read().await;
        Stats::from_char_counts(table.values().map(|m| m.char_count))
    }

    /// Number of stored messages
    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }

    /// Copy of the whole table
    pub async fn snapshot(&self) -> MessageTable {
        self.table.read().await.clone()
    }

    /// Path of the backing snapshot file
    pub fn snapshot_path(&self) -> &Path {
        self.file.path()
    }

    fn unused_id(&self, table: &MessageTable) -> StoreResult<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = (self.next_id)();
            if !table.contains_key(&id) {
                return Ok(id);
            }
            tracing::debug!("Id collision on {}, regenerating", id);
        }

        tracing::error!("Id source keeps colliding, giving up");
        Err(StoreError::IdsExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }
}
