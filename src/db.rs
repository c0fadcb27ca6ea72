//! Conversation State Store
//!
//! Append-only message log per thread. SQLite backs the real session; the
//! in-memory store serves tests and `ASSISTANT_DB_PATH=:memory:`.

mod memory;
mod schema;

pub use memory::MemoryStore;
use schema::SCHEMA;

use crate::llm::{Message, Role, ToolCall};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt history for thread {thread_id}: {reason}")]
    Corrupt { thread_id: String, reason: String },
    #[error("Store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage for per-thread message history
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// All messages of a thread in append order. Unknown threads are empty.
    async fn load(&self, thread_id: &str) -> StoreResult<Vec<Message>>;

    /// Append one message, creating the thread on first use
    async fn append(&self, thread_id: &str, message: &Message) -> StoreResult<()>;
}

#[async_trait]
impl<T: MessageStore + ?Sized> MessageStore for Arc<T> {
    async fn load(&self, thread_id: &str) -> StoreResult<Vec<Message>> {
        (**self).load(thread_id).await
    }

    async fn append(&self, thread_id: &str, message: &Message) -> StoreResult<()> {
        (**self).append(thread_id, message).await
    }
}

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Append a message and return its sequence id within the thread
    pub fn append_message(&self, thread_id: &str, message: &Message) -> StoreResult<i64> {
        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let tool_calls = if message.tool_calls.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&message.tool_calls)?)
        };

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO threads (id, created_at, updated_at) VALUES (?1, ?2, ?2)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
            params![thread_id, now],
        )?;
        let sequence_id: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence_id), 0) + 1 FROM messages WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO messages (id, thread_id, sequence_id, role, content, tool_calls, tool_call_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                uuid::Uuid::new_v4().to_string(),
                thread_id,
                sequence_id,
                message.role.as_str(),
                message.content,
                tool_calls,
                message.tool_call_id,
                now,
            ],
        )?;
        tx.commit()?;

        tracing::debug!(thread_id, sequence_id, role = message.role.as_str(), "Stored message");
        Ok(sequence_id)
    }

    /// Get messages for a thread in sequence order
    pub fn get_messages(&self, thread_id: &str) -> StoreResult<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT role, content, tool_calls, tool_call_id
             FROM messages WHERE thread_id = ?1 ORDER BY sequence_id ASC",
        )?;
        let rows = stmt.query_map(params![thread_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (role, content, tool_calls, tool_call_id) = row?;
            let role: Role = role.parse().map_err(|reason| StoreError::Corrupt {
                thread_id: thread_id.to_string(),
                reason,
            })?;
            let tool_calls: Vec<ToolCall> = match tool_calls {
                Some(json) => serde_json::from_str(&json)?,
                None => Vec::new(),
            };
            messages.push(Message {
                role,
                content,
                tool_calls,
                tool_call_id,
            });
        }
        Ok(messages)
    }
}

#[async_trait]
impl MessageStore for Database {
    async fn load(&self, thread_id: &str) -> StoreResult<Vec<Message>> {
        self.get_messages(thread_id)
    }

    async fn append(&self, thread_id: &str, message: &Message) -> StoreResult<()> {
        self.append_message(thread_id, message).map(|_| ())
    }
}
