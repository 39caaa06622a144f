//! Concurrent-network anomaly detection.
//!
//! Evaluation happens once per newly started session and looks only at the
//! current in-memory registry: a user with many past sessions from
//! different networks is not flagged, only concurrent overlap counts. Each
//! new session is evaluated independently, so a user already past the
//! threshold triggers again when yet another distinct network appears;
//! enforcement is idempotent about that.

use crate::network::classifier::{is_same_network, network_key};
use crate::session_tracking::SessionRegistry;
use std::collections::HashSet;

/// A positive detection for one candidate session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anomaly {
    /// Distinct concurrent networks, counting the candidate's own.
    pub distinct_networks: u32,
}

pub struct AnomalyDetector {
    enabled: bool,
    alert_threshold: u32,
    ipv6_prefix_length: u8,
}

impl AnomalyDetector {
    pub fn new(enabled: bool, alert_threshold: u32, ipv6_prefix_length: u8) -> Self {
        Self {
            enabled,
            alert_threshold,
            ipv6_prefix_length,
        }
    }

    /// Evaluates a candidate session that was just inserted into the
    /// registry.
    ///
    /// Counts the network keys of the user's other active sessions that are
    /// not on the candidate's network; the candidate's own network brings
    /// the total to that count plus one. Returns a detection when the total
    /// reaches the alert threshold.
    pub fn evaluate(
        &self,
        user_id: &str,
        candidate_ip: &str,
        registry: &SessionRegistry,
    ) -> Option<Anomaly> {
        if !self.enabled {
            return None;
        }

        let mut other_networks: HashSet<String> = HashSet::new();
        for session in registry.sessions_for_user(user_id) {
            if !is_same_network(&session.ip_address, candidate_ip, self.ipv6_prefix_length) {
                other_networks.insert(network_key(&session.ip_address, self.ipv6_prefix_length));
            }
        }

        let distinct_networks = other_networks.len() as u32 + 1;
        if distinct_networks >= self.alert_threshold {
            Some(Anomaly { distinct_networks })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::types::StorageError;
    use crate::network::classifier::{classify, extract_address};
    use crate::session_tracking::Session;
    use crate::storage::types::SecurityEvent;
    use crate::storage::Storage;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    struct NullStorage;

    #[async_trait]
    impl Storage for NullStorage {
        async fn record_session_start(&self, _session: &Session) -> Result<(), StorageError> {
            Ok(())
        }

        async fn record_session_end(
            &self,
            _session_id: &str,
            _end_time: DateTime<Utc>,
            _duration_secs: i64,
        ) -> Result<(), StorageError> {
            Ok(())
        }

        async fn log_security_event(&self, _event: &SecurityEvent) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn session(id: &str, user_id: &str, ip: &str) -> Session {
        let address = extract_address(ip);
        Session {
            session_id: id.to_string(),
            user_id: user_id.to_string(),
            username: "alice".into(),
            ip_address: address.clone(),
            address_family: classify(&address),
            device: "TV".into(),
            client: "Emby Web".into(),
            media_name: "Some Movie".into(),
            start_time: Utc::now(),
            end_time: None,
            duration_secs: None,
            location: "somewhere".into(),
        }
    }

    async fn registry_with(sessions: Vec<Session>) -> SessionRegistry {
        let mut registry = SessionRegistry::new(Arc::new(NullStorage));
        for s in sessions {
            registry.start(s).await;
        }
        registry
    }

    #[tokio::test]
    async fn two_distinct_ipv4_networks_reach_threshold_two() {
        let registry = registry_with(vec![
            session("a", "u1", "203.0.113.5"),
            session("b", "u1", "198.51.100.9"),
        ])
        .await;
        let detector = AnomalyDetector::new(true, 2, 64);

        let anomaly = detector.evaluate("u1", "198.51.100.9", &registry).unwrap();
        assert_eq!(anomaly.distinct_networks, 2);
    }

    #[tokio::test]
    async fn sessions_on_one_ipv6_network_never_trigger() {
        let registry = registry_with(vec![
            session("a", "u1", "2001:db8:aaaa::10"),
            session("b", "u1", "2001:db8:aaaa::20"),
            session("c", "u1", "2001:db8:aaaa::30"),
        ])
        .await;
        let detector = AnomalyDetector::new(true, 2, 64);

        assert!(detector
            .evaluate("u1", "2001:db8:aaaa::30", &registry)
            .is_none());
    }

    #[tokio::test]
    async fn distinct_ipv6_prefixes_are_distinct_networks() {
        let registry = registry_with(vec![
            session("a", "u1", "2001:db8:aaaa::1"),
            session("b", "u1", "2001:db8:bbbb::1"),
        ])
        .await;
        let detector = AnomalyDetector::new(true, 2, 64);

        let anomaly = detector.evaluate("u1", "2001:db8:bbbb::1", &registry).unwrap();
        assert_eq!(anomaly.distinct_networks, 2);
    }

    #[tokio::test]
    async fn other_users_sessions_are_ignored() {
        let registry = registry_with(vec![
            session("a", "u2", "203.0.113.5"),
            session("b", "u1", "198.51.100.9"),
        ])
        .await;
        let detector = AnomalyDetector::new(true, 2, 64);

        assert!(detector.evaluate("u1", "198.51.100.9", &registry).is_none());
    }

    #[tokio::test]
    async fn below_threshold_stays_quiet() {
        let registry = registry_with(vec![
            session("a", "u1", "203.0.113.5"),
            session("b", "u1", "198.51.100.9"),
        ])
        .await;
        let detector = AnomalyDetector::new(true, 3, 64);

        assert!(detector.evaluate("u1", "198.51.100.9", &registry).is_none());
    }

    #[tokio::test]
    async fn disabled_alerts_disable_evaluation() {
        let registry = registry_with(vec![
            session("a", "u1", "203.0.113.5"),
            session("b", "u1", "198.51.100.9"),
        ])
        .await;
        let detector = AnomalyDetector::new(false, 2, 64);

        assert!(detector.evaluate("u1", "198.51.100.9", &registry).is_none());
    }

    #[tokio::test]
    async fn mixed_families_count_as_distinct_networks() {
        let registry = registry_with(vec![
            session("a", "u1", "2001:db8:aaaa::1"),
            session("b", "u1", "203.0.113.5"),
        ])
        .await;
        let detector = AnomalyDetector::new(true, 2, 64);

        let anomaly = detector.evaluate("u1", "203.0.113.5", &registry).unwrap();
        assert_eq!(anomaly.distinct_networks, 2);
    }
}
