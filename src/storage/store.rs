//! Durable task store.
//!
//! Backed by sled, an embedded transactional key-value engine, this holds
//! two trees:
//!
//! - `tasks`: `task_id` bytes -> serialized [`Task`].
//! - `pending_index`: `created_at (8-byte big-endian) ++ task_id` bytes -> `task_id` bytes.
//!   Iteration order over this tree *is* FIFO order; an entry's presence
//!   means the row is eligible for [`Store::claim_next`].
//!
//! Every mutation that must be atomic runs inside a sled transaction over
//! the trees it touches, mirroring the write-ahead-logged transaction
//! pattern the rest of this codebase uses for its own durability.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use tracing::{debug, info};
use uuid::Uuid;

use super::task::{ExtraArgs, Task, TaskStatus};
use crate::error::StoreError;

type Result<T> = std::result::Result<T, StoreError>;

/// Reasons a claim/complete/reset transaction aborts without touching storage.
#[derive(Debug, Clone)]
enum Abort {
    NotFound(String),
    BadState(String),
    Contended,
    Internal(String),
}

fn map_tx_err<T>(result: std::result::Result<T, TransactionError<Abort>>) -> Result<T> {
    result.map_err(|err| match err {
        TransactionError::Abort(Abort::NotFound(id)) => StoreError::NotFound(id),
        TransactionError::Abort(Abort::BadState(id)) => StoreError::BadState(id),
        TransactionError::Abort(Abort::Contended) => StoreError::Contended,
        TransactionError::Abort(Abort::Internal(msg)) => StoreError::Internal(msg),
        TransactionError::Storage(e) => StoreError::Sled(e),
    })
}

fn pending_index_key(created_at: u64, task_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + task_id.len());
    key.extend_from_slice(&created_at.to_be_bytes());
    key.extend_from_slice(task_id.as_bytes());
    key
}

/// Milliseconds since the UNIX epoch, used as `created_at` for new rows.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_millis() as u64
}

#[derive(Debug, Default, serde::Serialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
}

pub struct Store {
    db: sled::Db,
    tasks: sled::Tree,
    pending_index: sled::Tree,
}

impl Store {
    /// Open (or create) the store at `path`, tuned for write-ahead durability
    /// with a bounded cache budget. Never drops existing data: tree creation
    /// is idempotent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Internal(e.to_string()))?;
        }

        let config = sled::Config::new()
            .path(path)
            .cache_capacity(256 * 1024 * 1024) // 256 MiB cache
            .flush_every_ms(Some(200))
            .mode(sled::Mode::HighThroughput);

        let db = config.open()?;
        let tasks = db.open_tree("tasks")?;
        let pending_index = db.open_tree("pending_index")?;

        info!("opened task store with {} task(s) on record", tasks.len());

        Ok(Store {
            db,
            tasks,
            pending_index,
        })
    }

    /// Flush pending writes and close the database cleanly.
    pub async fn close(&self) -> Result<()> {
        self.db.flush_async().await?;
        debug!("task store flushed");
        Ok(())
    }

    /// Insert a new row, or upsert an existing one back to `pending`,
    /// clearing any artifact reference. Returns the effective `task_id`.
    pub fn submit(
        &self,
        task_id: Option<String>,
        prompt: String,
        extra_args: ExtraArgs,
    ) -> Result<String> {
        let task_id = task_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = now_millis();
        let tid = task_id.clone();

        let result = (&self.tasks, &self.pending_index).transaction(
            move |(tasks, pending)| -> std::result::Result<(), ConflictableTransactionError<Abort>> {
                let existing: Option<Task> = tasks
                    .get(tid.as_bytes())?
                    .map(|raw| serde_json::from_slice(&raw))
                    .transpose()
                    .map_err(|e| ConflictableTransactionError::Abort(Abort::Internal(e.to_string())))?;

                let created_at = existing.as_ref().map(|t| t.created_at).unwrap_or(now);

                let task = Task::new(tid.clone(), prompt.clone(), extra_args.clone(), created_at);

                let bytes = serde_json::to_vec(&task)
                    .map_err(|e| ConflictableTransactionError::Abort(Abort::Internal(e.to_string())))?;
                tasks.insert(tid.as_bytes(), bytes)?;
                pending.insert(pending_index_key(created_at, &tid), tid.as_bytes())?;
                Ok(())
            },
        );

        map_tx_err(result)?;
        Ok(task_id)
    }

    /// Select the oldest pending row, transition it to `processing`, and
    /// return it. Returns `Ok(None)` if nothing is pending.
    ///
    /// The FIFO head is located with a non-transactional snapshot read, then
    /// re-validated inside the claiming transaction: if another caller won
    /// the race in between, the re-check fails and the transaction aborts
    /// with [`StoreError::Contended`] rather than silently retrying, per the
    /// optimistic-concurrency contract.
    pub fn claim_next(&self) -> Result<Option<Task>> {
        let head = match self.pending_index.iter().next() {
            Some(entry) => entry?,
            None => return Ok(None),
        };
        let (index_key, task_id_bytes) = head;
        let task_id = String::from_utf8_lossy(&task_id_bytes).into_owned();

        let result = (&self.tasks, &self.pending_index).transaction(
            move |(tasks, pending)| -> std::result::Result<Task, ConflictableTransactionError<Abort>> {
                let raw = tasks
                    .get(task_id.as_bytes())?
                    .ok_or_else(|| ConflictableTransactionError::Abort(Abort::Contended))?;
                let mut task: Task = serde_json::from_slice(&raw)
                    .map_err(|e| ConflictableTransactionError::Abort(Abort::Internal(e.to_string())))?;

                if task.status != TaskStatus::Pending {
                    return Err(ConflictableTransactionError::Abort(Abort::Contended));
                }

                task.status = TaskStatus::Processing;
                let bytes = serde_json::to_vec(&task)
                    .map_err(|e| ConflictableTransactionError::Abort(Abort::Internal(e.to_string())))?;
                tasks.insert(task_id.as_bytes(), bytes)?;
                pending.remove(&*index_key)?;
                Ok(task)
            },
        );

        map_tx_err(result).map(Some)
    }

    /// Transition `processing -> completed`, recording the artifact path.
    pub fn mark_completed(&self, task_id: &str, image_path: String) -> Result<()> {
        let tid = task_id.to_string();

        let result = self.tasks.transaction(
            move |tasks| -> std::result::Result<(), ConflictableTransactionError<Abort>> {
                let raw = tasks
                    .get(tid.as_bytes())?
                    .ok_or_else(|| ConflictableTransactionError::Abort(Abort::NotFound(tid.clone())))?;
                let mut task: Task = serde_json::from_slice(&raw)
                    .map_err(|e| ConflictableTransactionError::Abort(Abort::Internal(e.to_string())))?;

                if task.status != TaskStatus::Processing {
                    return Err(ConflictableTransactionError::Abort(Abort::BadState(tid.clone())));
                }

                task.status = TaskStatus::Completed;
                task.image_path = Some(image_path.clone());
                let bytes = serde_json::to_vec(&task)
                    .map_err(|e| ConflictableTransactionError::Abort(Abort::Internal(e.to_string())))?;
                tasks.insert(tid.as_bytes(), bytes)?;
                Ok(())
            },
        );

        map_tx_err(result)
    }

    /// Transition any state back to `pending`, clearing any artifact
    /// reference and restoring the row's original place in the FIFO order.
    pub fn reset(&self, task_id: &str) -> Result<()> {
        let tid = task_id.to_string();

        let result = (&self.tasks, &self.pending_index).transaction(
            move |(tasks, pending)| -> std::result::Result<(), ConflictableTransactionError<Abort>> {
                let raw = tasks
                    .get(tid.as_bytes())?
                    .ok_or_else(|| ConflictableTransactionError::Abort(Abort::NotFound(tid.clone())))?;
                let mut task: Task = serde_json::from_slice(&raw)
                    .map_err(|e| ConflictableTransactionError::Abort(Abort::Internal(e.to_string())))?;

                task.status = TaskStatus::Pending;
                task.image_path = None;
                let bytes = serde_json::to_vec(&task)
                    .map_err(|e| ConflictableTransactionError::Abort(Abort::Internal(e.to_string())))?;
                tasks.insert(tid.as_bytes(), bytes)?;
                pending.insert(pending_index_key(task.created_at, &tid), tid.as_bytes())?;
                Ok(())
            },
        );

        map_tx_err(result)
    }

    /// Read-only load, no transaction required.
    pub fn fetch(&self, task_id: &str) -> Result<Option<Task>> {
        match self.tasks.get(task_id.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Count tasks by status, for the `progress` operator subcommand.
    pub fn counts(&self) -> Result<TaskCounts> {
        let mut counts = TaskCounts::default();
        for entry in self.tasks.iter() {
            let (_, raw) = entry?;
            let task: Task = serde_json::from_slice(&raw)?;
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Processing => counts.processing += 1,
                TaskStatus::Completed => counts.completed += 1,
            }
        }
        Ok(counts)
    }
}
