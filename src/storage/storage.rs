//! Storage Trait
//!
//! This module defines the `Storage` trait, the interface between the
//! monitoring engine and whatever keeps its records.
//!
//! Implementors are responsible for:
//! - Persisting playback session starts and ends
//! - Appending security events to the audit log
//!
//! Each write is self-contained and keyed so that no multi-event transaction
//! is needed; all methods return a `Result` with a `StorageError` instead of
//! surfacing backend faults directly.

use crate::error_handling::types::StorageError;
use crate::session_tracking::session::Session;
use crate::storage::types::SecurityEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait Storage: Send + Sync {
    /// Records the start of a playback session.
    async fn record_session_start(&self, session: &Session) -> Result<(), StorageError>;

    /// Records the end of a playback session, keyed by session id.
    async fn record_session_end(
        &self,
        session_id: &str,
        end_time: DateTime<Utc>,
        duration_secs: i64,
    ) -> Result<(), StorageError>;

    /// Appends a security event to the audit log.
    async fn log_security_event(&self, event: &SecurityEvent) -> Result<(), StorageError>;
}
