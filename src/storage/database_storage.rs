use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error_handling::types::StorageError;
use crate::session_tracking::session::Session;
use crate::storage::storage::Storage;
use crate::storage::types::SecurityEvent;
use async_trait::async_trait;

/// SQLite-backed storage.
///
/// Timestamps are stored as RFC 3339 TEXT columns. The schema is created on
/// open; every write is an independent statement keyed by session id or
/// appended to the audit log, so no transaction spans multiple events.
pub struct DatabaseStorage {
    pool: SqlitePool,
}

impl DatabaseStorage {
    /// Opens (or creates) the database at `path` and bootstraps the schema.
    pub async fn new_file<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;
            }
        }
        let opts = SqliteConnectOptions::new()
            .filename(path_ref)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS playback_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                ip_address TEXT NOT NULL,
                address_family TEXT NOT NULL,
                device_name TEXT,
                client_type TEXT,
                media_name TEXT,
                start_time TEXT NOT NULL,
                end_time TEXT,
                duration INTEGER,
                location TEXT
            );",
        )
        .execute(&pool)
        .await
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS security_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                user_id TEXT NOT NULL,
                username TEXT NOT NULL,
                trigger_ip TEXT NOT NULL,
                active_sessions INTEGER NOT NULL,
                action TEXT NOT NULL
            );",
        )
        .execute(&pool)
        .await
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;

        info!("database ready at {}", path_ref.display());

        Ok(Self { pool })
    }
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn record_session_start(&self, session: &Session) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO playback_history (
                session_id, user_id, username, ip_address, address_family,
                device_name, client_type, media_name, start_time, location
            ) VALUES (?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(&session.session_id)
        .bind(&session.user_id)
        .bind(&session.username)
        .bind(&session.ip_address)
        .bind(session.address_family.label())
        .bind(&session.device)
        .bind(&session.client)
        .bind(&session.media_name)
        .bind(session.start_time.to_rfc3339())
        .bind(&session.location)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn record_session_end(
        &self,
        session_id: &str,
        end_time: DateTime<Utc>,
        duration_secs: i64,
    ) -> Result<(), StorageError> {
        // An unknown id updates zero rows, which is not an error: the row
        // may have been pruned externally.
        sqlx::query(
            "UPDATE playback_history
             SET end_time = ?, duration = ?
             WHERE session_id = ? AND end_time IS NULL",
        )
        .bind(end_time.to_rfc3339())
        .bind(duration_secs)
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn log_security_event(&self, event: &SecurityEvent) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO security_log
             (timestamp, user_id, username, trigger_ip, active_sessions, action)
             VALUES (?,?,?,?,?,?)",
        )
        .bind(event.timestamp.to_rfc3339())
        .bind(&event.user_id)
        .bind(&event.username)
        .bind(&event.trigger_ip)
        .bind(event.active_sessions as i64)
        .bind(event.action.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}
