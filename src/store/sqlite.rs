//! SQLite-backed chat store: `chats`/`chat_messages` tables (spec §6
//! "Persisted state" / Chat store). Append-only — messages are never
//! updated or reordered once written; `metadata.is_html` and
//! `metadata.is_v2_dashboard` round-trip verbatim as opaque JSON.
//! Grounded in the same `Arc<Mutex<Connection>>` + `with_conn` shape as
//! [`crate::memory::vector_store::VectorStore`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: String,
    pub text: String,
    pub metadata: serde_json::Value,
    pub ts: DateTime<Utc>,
}

pub struct ChatStore {
    conn: Arc<Mutex<Connection>>,
}

impl ChatStore {
    pub fn open(path: &str) -> Result<Self, AppError> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), AppError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                title TEXT,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL,
                role TEXT NOT NULL,
                text TEXT NOT NULL,
                metadata TEXT NOT NULL,
                ts TEXT NOT NULL,
                FOREIGN KEY(chat_id) REFERENCES chats(id)
            );
            CREATE INDEX IF NOT EXISTS idx_chat_messages_chat_id ON chat_messages(chat_id);
            CREATE INDEX IF NOT EXISTS idx_chats_session_id ON chats(session_id);",
        )?;
        Ok(())
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.conn.lock().expect("chat store mutex poisoned");
        f(&conn).map_err(AppError::from)
    }

    pub fn create_chat(&self, session_id: &str, title: Option<&str>) -> Result<Uuid, AppError> {
        let id = Uuid::now_v7();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chats (id, session_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), session_id, title, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    pub fn list_chats(&self, session_id: &str) -> Result<Vec<(Uuid, Option<String>)>, AppError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title FROM chats WHERE session_id = ?1 ORDER BY created_at DESC",
            )?;
            stmt.query_map(params![session_id], |row| {
                let id: String = row.get(0)?;
                let title: Option<String> = row.get(1)?;
                Ok((Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::now_v7()), title))
            })?
            .collect()
        })
    }

    pub fn append_message(
        &self,
        chat_id: Uuid,
        role: &str,
        text: &str,
        metadata: serde_json::Value,
    ) -> Result<Uuid, AppError> {
        let id = Uuid::now_v7();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, chat_id, role, text, metadata, ts) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    chat_id.to_string(),
                    role,
                    text,
                    metadata.to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;
        Ok(id)
    }

    pub fn messages(&self, chat_id: Uuid) -> Result<Vec<ChatMessageRecord>, AppError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, chat_id, role, text, metadata, ts FROM chat_messages WHERE chat_id = ?1 ORDER BY ts ASC",
            )?;
            stmt.query_map(params![chat_id.to_string()], |row| {
                let id: String = row.get(0)?;
                let chat_id: String = row.get(1)?;
                let role: String = row.get(2)?;
                let text: String = row.get(3)?;
                let metadata: String = row.get(4)?;
                let ts: String = row.get(5)?;
                Ok(ChatMessageRecord {
                    id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::now_v7()),
                    chat_id: Uuid::parse_str(&chat_id).unwrap_or_else(|_| Uuid::now_v7()),
                    role,
                    text,
                    metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
                    ts: DateTime::parse_from_rfc3339(&ts)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect()
        })
    }

    pub fn delete_chat(&self, chat_id: Uuid) -> Result<bool, AppError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM chat_messages WHERE chat_id = ?1",
                params![chat_id.to_string()],
            )?;
            let rows = conn.execute("DELETE FROM chats WHERE id = ?1", params![chat_id.to_string()])?;
            Ok(rows > 0)
        })
    }

    /// `/api/chats/clear`: delete all chats for a session.
    pub fn clear_session(&self, session_id: &str) -> Result<u64, AppError> {
        self.with_conn(|conn| {
            let chat_ids: Vec<String> = {
                let mut stmt = conn.prepare("SELECT id FROM chats WHERE session_id = ?1")?;
                stmt.query_map(params![session_id], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?
            };
            for id in &chat_ids {
                conn.execute("DELETE FROM chat_messages WHERE chat_id = ?1", params![id])?;
            }
            let deleted = conn.execute("DELETE FROM chats WHERE session_id = ?1", params![session_id])?;
            Ok(deleted as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_list_round_trips_messages() {
        let store = ChatStore::in_memory().unwrap();
        let chat_id = store.create_chat("s1", Some("Test chat")).unwrap();
        store
            .append_message(chat_id, "user", "hello", serde_json::json!({"is_html": false}))
            .unwrap();
        let messages = store.messages(chat_id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[0].metadata["is_html"], false);
    }

    #[test]
    fn clear_session_removes_all_chats_and_messages() {
        let store = ChatStore::in_memory().unwrap();
        let chat_id = store.create_chat("s1", None).unwrap();
        store.append_message(chat_id, "user", "hi", serde_json::json!({})).unwrap();
        let deleted = store.clear_session("s1").unwrap();
        assert_eq!(deleted, 1);
        assert!(store.list_chats("s1").unwrap().is_empty());
    }
}
