//! Append-only SQLite persistence for conversation messages.
//!
//! The store is the authoritative record of every turn; the in-memory
//! window (`crate::window`) is only a cache over it. Messages are written
//! through synchronously before the pipeline proceeds.

mod schema;
mod types;

pub use types::{Message, MessageOrigin};

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use crate::error::{CompanionError, Result};
use schema::{apply_schema, read_schema_version};

/// Append-only message log backed by a single SQLite database file.
///
/// Thread-safe via an internal `Mutex<Connection>`. All access is
/// serialized; WAL mode keeps concurrent readers cheap on the SQLite side.
pub struct ConversationStore {
    conn: Mutex<Connection>,
}

impl ConversationStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an ephemeral in-memory store. Used by tests and throwaway
    /// sessions; contents vanish when the store is dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Read the schema version stamp.
    pub fn schema_version(&self) -> Result<Option<u32>> {
        let conn = self.lock()?;
        Ok(read_schema_version(&conn)?)
    }

    /// Persist one message and return it with its assigned id and timestamp.
    pub fn insert(
        &self,
        channel_id: &str,
        origin: MessageOrigin,
        text: &str,
        token_cost: u32,
    ) -> Result<Message> {
        let conn = self.lock()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO messages (channel_id, origin, text, token_cost, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                channel_id,
                origin.as_str(),
                text,
                token_cost,
                now.timestamp_millis()
            ],
        )?;
        Ok(Message {
            id: conn.last_insert_rowid(),
            channel_id: channel_id.to_owned(),
            origin,
            text: text.to_owned(),
            token_cost,
            created_at: now,
        })
    }

    /// Fetch up to `limit` most recent messages for a channel, newest-first.
    pub fn recent(&self, channel_id: &str, limit: usize) -> Result<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, channel_id, origin, text, token_cost, created_at \
             FROM messages WHERE channel_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![channel_id, limit as i64], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Fetch up to `limit` messages after `last_id` for a channel, oldest of
    /// the slice first. Incremental pagination for log display.
    pub fn after(&self, channel_id: &str, last_id: i64, limit: usize) -> Result<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, channel_id, origin, text, token_cost, created_at \
             FROM messages WHERE channel_id = ?1 AND id > ?2 ORDER BY id ASC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![channel_id, last_id, limit as i64], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Delete every message for a channel. Returns the number of rows purged.
    pub fn purge_channel(&self, channel_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM messages WHERE channel_id = ?1", params![channel_id])?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CompanionError::Storage("store mutex poisoned".to_owned()))
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let origin_str: String = row.get(2)?;
    let origin = MessageOrigin::parse(&origin_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown message origin: {origin_str}").into(),
        )
    })?;
    let millis: i64 = row.get(5)?;
    Ok(Message {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        origin,
        text: row.get(3)?,
        token_cost: row.get(4)?,
        created_at: DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH),
    })
}
