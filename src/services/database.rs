use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;

use crate::models::{ChatMessage, Sender};

/// Local store: the settings key-value table and a per-conversation
/// transcript cache.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn new() -> Result<Self> {
        let path = Self::db_path()?;
        task::spawn_blocking(move || Self::open(path)).await?
    }

    fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;

        tracing::debug!("Opened local store at {}", path.display());
        Ok(db)
    }

    /// Throwaway store for tests.
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn db_path() -> Result<PathBuf> {
        let data_dir = match std::env::var("XDG_DATA_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var("HOME").context("Neither XDG_DATA_HOME nor HOME is set")?;
                PathBuf::from(home).join(".local/share")
            }
        };
        Ok(data_dir.join("parley").join("parley.db"))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );",
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if version < 1 {
            conn.execute_batch(
                "CREATE TABLE settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                INSERT INTO schema_version (version) VALUES (1);",
            )?;
        }

        if version < 2 {
            conn.execute_batch(
                "CREATE TABLE messages (
                    id TEXT PRIMARY KEY,
                    conversation_id TEXT NOT NULL,
                    sender TEXT NOT NULL,
                    text TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX idx_messages_conversation ON messages(conversation_id, created_at);

                UPDATE schema_version SET version = 2;",
            )?;
        }

        Ok(())
    }

    // --- Transcript cache ---

    pub async fn insert_message(&self, message: &ChatMessage) -> Result<()> {
        let db = self.clone();
        let message = message.clone();
        task::spawn_blocking(move || {
            let conn = db.lock()?;
            conn.execute(
                "INSERT INTO messages (id, conversation_id, sender, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id,
                    message.conversation_id,
                    message.sender.as_str(),
                    message.text,
                    message.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let db = self.clone();
        let conversation_id = conversation_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock()?;
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, sender, text, created_at
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id], |row| Ok(Self::row_to_message(row)))?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row??);
            }
            Ok(messages)
        })
        .await?
    }

    pub async fn clear_messages(&self, conversation_id: &str) -> Result<usize> {
        let db = self.clone();
        let conversation_id = conversation_id.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock()?;
            let removed = conn.execute(
                "DELETE FROM messages WHERE conversation_id = ?1",
                params![conversation_id],
            )?;
            Ok(removed)
        })
        .await?
    }

    // --- Settings ---

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let db = self.clone();
        let key = key.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock()?;
            let result: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(result)
        })
        .await?
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let db = self.clone();
        let key = key.to_string();
        let value = value.to_string();
        task::spawn_blocking(move || {
            let conn = db.lock()?;
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            Ok(())
        })
        .await?
    }

    /// Upsert several settings in one transaction, so readers see either all
    /// of them or none.
    pub async fn set_settings(&self, entries: Vec<(&'static str, String)>) -> Result<()> {
        let db = self.clone();
        task::spawn_blocking(move || {
            let mut conn = db.lock()?;
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO settings (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = ?2",
                )?;
                for (key, value) in &entries {
                    stmt.execute(params![key, value])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await?
    }

    // --- Row helpers ---

    fn row_to_message(row: &rusqlite::Row) -> Result<ChatMessage> {
        let sender_str: String = row.get(2)?;
        let created_str: String = row.get(4)?;

        Ok(ChatMessage {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            sender: Sender::from_str(&sender_str)
                .ok_or_else(|| anyhow::anyhow!("Unknown sender: {}", sender_str))?,
            text: row.get(3)?,
            created_at: DateTime::parse_from_rfc3339(&created_str)?.with_timezone(&Utc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_initialization() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.list_messages("current").await.unwrap().is_empty());
        assert_eq!(db.get_setting("darkMode").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_settings_upsert() {
        let db = Database::new_in_memory().unwrap();
        db.set_setting("darkMode", "true").await.unwrap();
        db.set_setting("darkMode", "false").await.unwrap();
        assert_eq!(
            db.get_setting("darkMode").await.unwrap().as_deref(),
            Some("false")
        );
    }

    #[tokio::test]
    async fn test_settings_batch_upsert() {
        let db = Database::new_in_memory().unwrap();
        db.set_setting("darkMode", "true").await.unwrap();
        db.set_settings(vec![
            ("darkMode", "false".to_string()),
            ("speechLanguage", "de-DE".to_string()),
        ])
        .await
        .unwrap();

        assert_eq!(
            db.get_setting("darkMode").await.unwrap().as_deref(),
            Some("false")
        );
        assert_eq!(
            db.get_setting("speechLanguage").await.unwrap().as_deref(),
            Some("de-DE")
        );
    }

    #[tokio::test]
    async fn test_transcript_is_per_conversation() {
        let db = Database::new_in_memory().unwrap();

        let first = ChatMessage::new("1", Sender::User, "Hello");
        let reply = ChatMessage::new("1", Sender::Assistant, "Hi, how can I help?");
        let other = ChatMessage::new("2", Sender::User, "Different thread");
        db.insert_message(&first).await.unwrap();
        db.insert_message(&reply).await.unwrap();
        db.insert_message(&other).await.unwrap();

        let messages = db.list_messages("1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "Hello");
        assert_eq!(messages[1].sender, Sender::Assistant);

        assert_eq!(db.clear_messages("1").await.unwrap(), 2);
        assert!(db.list_messages("1").await.unwrap().is_empty());
        assert_eq!(db.list_messages("2").await.unwrap().len(), 1);
    }
}
