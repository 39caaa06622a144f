//! Active-session registry.
//!
//! The registry is the authoritative in-memory picture of the sessions
//! currently playing on the media server. It is owned by the poll loop and
//! mutated only there; external readers get owned snapshots via
//! [`SessionRegistry::snapshot`], never a live handle.
//!
//! Reconciliation diffs the previous picture against a fresh snapshot:
//! after the started and ended ids have been processed, registry membership
//! equals snapshot membership exactly.

use crate::clients::types::SessionDescriptor;
use crate::session_tracking::session::Session;
use crate::storage::Storage;
use chrono::Utc;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;

pub struct SessionRegistry {
    active: HashMap<String, Session>,
    storage: Arc<dyn Storage>,
}

impl SessionRegistry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            active: HashMap::new(),
            storage,
        }
    }

    /// Diffs a fresh snapshot against the current membership.
    ///
    /// Returns `(started, ended)`: ids present only in the snapshot and ids
    /// present only in the registry. Every id lands in exactly one of the
    /// two lists or in neither; no ordering is guaranteed.
    pub fn reconcile(
        &self,
        snapshot: &HashMap<String, SessionDescriptor>,
    ) -> (Vec<String>, Vec<String>) {
        let started = snapshot
            .keys()
            .filter(|id| !self.active.contains_key(*id))
            .cloned()
            .collect();
        let ended = self
            .active
            .keys()
            .filter(|id| !snapshot.contains_key(*id))
            .cloned()
            .collect();
        (started, ended)
    }

    /// Tracks a newly started session.
    ///
    /// The record is handed to storage first; a persistence failure is
    /// logged and the in-memory insertion still happens, otherwise the same
    /// id would be reprocessed as "started" on every following cycle.
    pub async fn start(&mut self, session: Session) {
        if let Err(e) = self.storage.record_session_start(&session).await {
            warn!(
                "failed to persist start of session {}: {}",
                session.session_id, e
            );
        }
        self.active.insert(session.session_id.clone(), session);
    }

    /// Finalizes an ended session: computes its duration, records the end,
    /// and drops it from the registry.
    ///
    /// Ending an id that is no longer tracked is tolerated and logged;
    /// nothing is written in that case.
    pub async fn end(&mut self, session_id: &str) {
        let Some(mut session) = self.active.remove(session_id) else {
            warn!("session {} already removed", session_id);
            return;
        };
        let end_time = Utc::now();
        let duration_secs = (end_time - session.start_time).num_seconds();
        session.end_time = Some(end_time);
        session.duration_secs = Some(duration_secs);
        if let Err(e) = self
            .storage
            .record_session_end(session_id, end_time, duration_secs)
            .await
        {
            warn!("failed to persist end of session {}: {}", session_id, e);
        }
        info!(
            "[#] {} stopped | duration: {}m{}s",
            session.username,
            duration_secs / 60,
            duration_secs % 60
        );
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.active.contains_key(session_id)
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.active.get(session_id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// All active sessions of one user.
    pub fn sessions_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> impl Iterator<Item = &'a Session> + 'a {
        self.active.values().filter(move |s| s.user_id == user_id)
    }

    /// Owned copies of all active sessions, for readers outside the poll
    /// loop.
    pub fn snapshot(&self) -> Vec<Session> {
        self.active.values().cloned().collect()
    }
}
