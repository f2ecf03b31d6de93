//! Task and user persistence on top of redb.
//!
//! Rows are postcard-encoded. Task ids come from a counter in the meta
//! table so they stay sequential across restarts.

use chrono::{Duration, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    task::{sort_for_listing, Task, TaskId},
    user::User,
};

const USERS_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("users");
const USERNAME_INDEX: TableDefinition<&str, &[u8]> = TableDefinition::new("username_index");
const TASKS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("tasks");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_TASK_ID: &str = "next_task_id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redb: {0}")]
    Redb(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("encode: {0}")]
    Encode(String),
    #[error("username {0} is already taken")]
    UsernameTaken(String),
}

// redb 2.x has many error types. Blanket them all into StoreError::Redb.
macro_rules! from_redb {
    ($($t:ty),*) => {
        $(impl From<$t> for StoreError {
            fn from(e: $t) -> Self { StoreError::Redb(e.to_string()) }
        })*
    };
}

from_redb!(
    redb::Error,
    redb::DatabaseError,
    redb::TableError,
    redb::TransactionError,
    redb::StorageError,
    redb::CommitError
);

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(value).map_err(|e| StoreError::Encode(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Thin handle to the redb file. Cloneable (Arc inside).
#[derive(Clone)]
pub struct DataContext {
    db: Arc<Database>,
}

impl DataContext {
    /// Open (or create) the database at the given path.
    /// Creates tables if they don't exist.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = Database::create(path)?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS_TABLE)?;
            let _ = write_txn.open_table(USERNAME_INDEX)?;
            let _ = write_txn.open_table(TASKS_TABLE)?;
            let _ = write_txn.open_table(META_TABLE)?;
        }
        write_txn.commit()?;
        Ok(DataContext { db: Arc::new(db) })
    }

    // USERS
    pub fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut users_table = write_txn.open_table(USERS_TABLE)?;
            let mut username_index = write_txn.open_table(USERNAME_INDEX)?;
            if username_index.get(user.username.as_str())?.is_some() {
                return Err(StoreError::UsernameTaken(user.username.clone()));
            }
            let user_bytes = encode(user)?;
            let id_bytes = user.id.as_bytes();
            users_table.insert(id_bytes.as_slice(), user_bytes.as_slice())?;
            username_index.insert(user.username.as_str(), id_bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let users_table = read_txn.open_table(USERS_TABLE)?;
        let id_bytes = id.as_bytes();
        match users_table.get(id_bytes.as_slice())? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let username_index = read_txn.open_table(USERNAME_INDEX)?;

        match username_index.get(username)? {
            Some(id_data) => {
                let users_table = read_txn.open_table(USERS_TABLE)?;
                match users_table.get(id_data.value())? {
                    Some(user_data) => Ok(Some(decode(user_data.value())?)),
                    None => Ok(None),
                }
            }
            None => Ok(None),
        }
    }

    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let users_table = read_txn.open_table(USERS_TABLE)?;

        let mut users: Vec<User> = Vec::new();
        for entry in users_table.iter()? {
            let (_, value) = entry?;
            users.push(decode(value.value())?);
        }
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    /// Remove a user. Tasks they authored lose their author; they are
    /// dropped from every responsible set. No notification is sent for
    /// those membership changes.
    pub fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let user = if let Some(user) = self.get_user(id)? { user } else { return Ok(false) };
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERNAME_INDEX)?;
            table.remove(user.username.as_str())?;
        }
        {
            let mut table = write_txn.open_table(USERS_TABLE)?;
            table.remove(user.id.as_bytes().as_slice())?;
        }
        {
            let mut tasks_table = write_txn.open_table(TASKS_TABLE)?;
            let mut touched = Vec::new();
            for entry in tasks_table.iter()? {
                let (_, value) = entry?;
                let mut task: Task = decode(value.value())?;
                let was_author = task.author == Some(id);
                let was_responsible = task.responsible.remove(&id);
                if was_author {
                    task.author = None;
                }
                if was_author || was_responsible {
                    touched.push(task);
                }
            }
            for task in touched {
                let bytes = encode(&task)?;
                tasks_table.insert(task.id, bytes.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(true)
    }

    // TASKS
    /// Persist a new task and assign its id.
    pub fn insert_task(&self, task: &mut Task) -> Result<TaskId, StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut meta = write_txn.open_table(META_TABLE)?;
            let id = meta.get(NEXT_TASK_ID)?.map(|v| v.value()).unwrap_or(1);
            meta.insert(NEXT_TASK_ID, id + 1)?;

            task.id = id;
            let mut tasks_table = write_txn.open_table(TASKS_TABLE)?;
            let bytes = encode(task)?;
            tasks_table.insert(id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(task.id)
    }

    pub fn get_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let tasks_table = read_txn.open_table(TASKS_TABLE)?;
        match tasks_table.get(id)? {
            Some(data) => Ok(Some(decode(data.value())?)),
            None => Ok(None),
        }
    }

    /// All tasks, open ones first.
    pub fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let tasks_table = read_txn.open_table(TASKS_TABLE)?;

        let mut tasks = Vec::new();
        for entry in tasks_table.iter()? {
            let (_, value) = entry?;
            tasks.push(decode(value.value())?);
        }
        sort_for_listing(&mut tasks);
        Ok(tasks)
    }

    /// Write back an existing task, refreshing `updated`. Returns false (and
    /// writes nothing) when the row is gone.
    pub fn save_task(&self, task: &mut Task) -> Result<bool, StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut tasks_table = write_txn.open_table(TASKS_TABLE)?;
            if tasks_table.get(task.id)?.is_none() {
                return Ok(false);
            }

            // `updated` has to move on every save even if the clock hasn't.
            let now = Utc::now();
            task.updated = if now > task.updated {
                now
            } else {
                task.updated + Duration::microseconds(1)
            };

            let bytes = encode(task)?;
            tasks_table.insert(task.id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Remove a task, handing back the removed row.
    pub fn delete_task(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut tasks_table = write_txn.open_table(TASKS_TABLE)?;
            let result = tasks_table.remove(id)?;
            match result {
                Some(data) => Some(decode::<Task>(data.value())?),
                None => None,
            }
        };
        write_txn.commit()?;
        Ok(removed)
    }
}

// ── Tests ──────────────────────────────────────────────────────
