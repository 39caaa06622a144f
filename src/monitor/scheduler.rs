//! Poll scheduler.
//!
//! One task owns the whole cycle: fetch the session snapshot, reconcile it
//! against the registry, run classification/detection/enforcement for every
//! new session, finalize every ended one, then sleep. Cycles never overlap
//! and a cycle is never abandoned mid-way: the stop signal is only observed
//! between cycles, and a snapshot fetch failure costs that cycle, not the
//! process.

use crate::clients::geo::GeoLocator;
use crate::clients::media_server::{describe_media, MediaServer};
use crate::clients::types::SessionDescriptor;
use crate::detection::{AnomalyDetector, EnforcementController};
use crate::error_handling::types::LookupError;
use crate::network::classifier::{classify, extract_address};
use crate::session_tracking::{Session, SessionRegistry};
use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    Stopped,
}

pub struct Monitor {
    registry: SessionRegistry,
    media_server: Arc<dyn MediaServer>,
    geo: Arc<dyn GeoLocator>,
    detector: AnomalyDetector,
    enforcement: EnforcementController,
    check_interval: Duration,
    state: MonitorState,
}

impl Monitor {
    pub fn new(
        registry: SessionRegistry,
        media_server: Arc<dyn MediaServer>,
        geo: Arc<dyn GeoLocator>,
        detector: AnomalyDetector,
        enforcement: EnforcementController,
        check_interval: Duration,
    ) -> Self {
        Self {
            registry,
            media_server,
            geo,
            detector,
            enforcement,
            check_interval,
            state: MonitorState::Running,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Immutable view of the currently tracked sessions, for readers
    /// outside the poll loop.
    pub fn active_sessions(&self) -> Vec<Session> {
        self.registry.snapshot()
    }

    /// Runs cycles until the shutdown signal flips.
    ///
    /// The signal is checked only at cycle boundaries; an in-flight cycle
    /// always runs to completion. `Stopped` is the sole terminal state.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "monitor started | interval: {}s",
            self.check_interval.as_secs()
        );
        while !*shutdown.borrow() {
            if let Err(e) = self.process_cycle().await {
                error!("session update failed: {}", e);
            }
            tokio::select! {
                _ = tokio::time::sleep(self.check_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // signal source is gone, treat as a stop request
                        break;
                    }
                }
            }
        }
        self.state = MonitorState::Stopped;
        info!("monitor stopped");
    }

    /// One fetch/reconcile/process pass.
    pub async fn process_cycle(&mut self) -> Result<(), LookupError> {
        let snapshot = self.media_server.get_active_sessions().await?;
        let (started, ended) = self.registry.reconcile(&snapshot);
        for id in started {
            if let Some(descriptor) = snapshot.get(&id) {
                self.handle_started(descriptor).await;
            }
        }
        for id in ended {
            self.registry.end(&id).await;
        }
        Ok(())
    }

    async fn handle_started(&mut self, descriptor: &SessionDescriptor) {
        let username = self.resolve_username(&descriptor.user_id).await;
        let ip_address = extract_address(&descriptor.remote_endpoint);
        let address_family = classify(&ip_address);
        let media_name = describe_media(descriptor.now_playing_item.as_ref());
        let location = self.geo.resolve_location(&ip_address).await;

        let session = Session {
            session_id: descriptor.id.clone(),
            user_id: descriptor.user_id.clone(),
            username: username.clone(),
            ip_address: ip_address.clone(),
            address_family,
            device: or_unknown(&descriptor.device_name, "unknown device"),
            client: or_unknown(&descriptor.client_name, "unknown client"),
            media_name,
            start_time: Utc::now(),
            end_time: None,
            duration_secs: None,
            location,
        };

        let whitelist_tag = if self.enforcement.is_whitelisted(&username) {
            " (whitelisted)"
        } else {
            ""
        };
        info!(
            "[>] {}{} | device: {} | IP: {} ({}) | location: {} | playing: {}",
            session.username,
            whitelist_tag,
            session.device,
            session.ip_address,
            session.address_family,
            session.location,
            session.media_name
        );

        self.registry.start(session.clone()).await;

        if descriptor.user_id.is_empty() {
            // still tracked to keep the registry aligned with the snapshot,
            // but there is no account to evaluate
            warn!("session {} has no user id, skipping detection", session.session_id);
            return;
        }

        if let Some(anomaly) =
            self.detector
                .evaluate(&descriptor.user_id, &ip_address, &self.registry)
        {
            self.enforcement
                .enforce(&session, anomaly.distinct_networks)
                .await;
        }
    }

    async fn resolve_username(&self, user_id: &str) -> String {
        if user_id.is_empty() {
            return "unknown".to_string();
        }
        match self.media_server.get_user_info(user_id).await {
            Ok(user) if !user.name.is_empty() => user.name,
            Ok(_) => "unknown".to_string(),
            Err(e) => {
                warn!("user lookup for {} failed: {}", user_id, e);
                "unknown".to_string()
            }
        }
    }
}

fn or_unknown(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::media_server::MediaServer;
    use crate::clients::notify::Notifier;
    use crate::clients::security::SecurityActions;
    use crate::clients::types::{BanNotification, UserInfo};
    use crate::error_handling::types::StorageError;
    use crate::storage::types::SecurityEvent;
    use crate::storage::Storage;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedMediaServer {
        // one entry per cycle; exhausted scripts answer with an empty map
        snapshots: Mutex<Vec<Result<HashMap<String, SessionDescriptor>, LookupError>>>,
    }

    impl ScriptedMediaServer {
        fn new(snapshots: Vec<Result<HashMap<String, SessionDescriptor>, LookupError>>) -> Self {
            let mut snapshots = snapshots;
            snapshots.reverse();
            Self {
                snapshots: Mutex::new(snapshots),
            }
        }
    }

    #[async_trait]
    impl MediaServer for ScriptedMediaServer {
        async fn get_active_sessions(
            &self,
        ) -> Result<HashMap<String, SessionDescriptor>, LookupError> {
            self.snapshots
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(HashMap::new()))
        }

        async fn get_user_info(&self, user_id: &str) -> Result<UserInfo, LookupError> {
            Ok(UserInfo {
                name: format!("user-{user_id}"),
                is_disabled: false,
            })
        }
    }

    struct StubGeo;

    #[async_trait]
    impl GeoLocator for StubGeo {
        async fn resolve_location(&self, _ip: &str) -> String {
            "test city".to_string()
        }
    }

    #[derive(Default)]
    struct RecordingSecurity {
        disables: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SecurityActions for RecordingSecurity {
        async fn disable_user(&self, user_id: &str, username: &str) -> bool {
            self.disables
                .lock()
                .unwrap()
                .push((user_id.to_string(), username.to_string()));
            true
        }

        async fn enable_user(&self, _user_id: &str) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<BanNotification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_ban_notification(&self, notification: &BanNotification) -> bool {
            self.sent.lock().unwrap().push(notification.clone());
            true
        }
    }

    #[derive(Default)]
    struct RecordingStorage {
        starts: Mutex<Vec<String>>,
        ends: Mutex<Vec<String>>,
        events: Mutex<Vec<SecurityEvent>>,
    }

    #[async_trait]
    impl Storage for RecordingStorage {
        async fn record_session_start(&self, session: &Session) -> Result<(), StorageError> {
            self.starts.lock().unwrap().push(session.session_id.clone());
            Ok(())
        }

        async fn record_session_end(
            &self,
            session_id: &str,
            _end_time: DateTime<Utc>,
            _duration_secs: i64,
        ) -> Result<(), StorageError> {
            self.ends.lock().unwrap().push(session_id.to_string());
            Ok(())
        }

        async fn log_security_event(&self, event: &SecurityEvent) -> Result<(), StorageError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn descriptor(id: &str, user_id: &str, endpoint: &str) -> (String, SessionDescriptor) {
        let raw = format!(
            r#"{{
                "Id": "{id}",
                "UserId": "{user_id}",
                "RemoteEndPoint": "{endpoint}",
                "DeviceName": "TV",
                "Client": "Emby Web",
                "NowPlayingItem": {{"Name": "Some Movie"}}
            }}"#
        );
        (id.to_string(), serde_json::from_str(&raw).unwrap())
    }

    struct Fixture {
        monitor: Monitor,
        security: Arc<RecordingSecurity>,
        notifier: Arc<RecordingNotifier>,
        storage: Arc<RecordingStorage>,
    }

    fn fixture(
        snapshots: Vec<Result<HashMap<String, SessionDescriptor>, LookupError>>,
        whitelist: &[&str],
    ) -> Fixture {
        let media_server = Arc::new(ScriptedMediaServer::new(snapshots));
        let security = Arc::new(RecordingSecurity::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let storage = Arc::new(RecordingStorage::default());
        let whitelist: Vec<String> = whitelist.iter().map(|s| s.to_string()).collect();
        let enforcement = EnforcementController::new(
            media_server.clone(),
            security.clone(),
            Arc::new(StubGeo),
            Some(notifier.clone()),
            storage.clone(),
            &whitelist,
            true,
        );
        let monitor = Monitor::new(
            SessionRegistry::new(storage.clone()),
            media_server,
            Arc::new(StubGeo),
            AnomalyDetector::new(true, 2, 64),
            enforcement,
            Duration::from_secs(1),
        );
        Fixture {
            monitor,
            security,
            notifier,
            storage,
        }
    }

    #[tokio::test]
    async fn second_network_triggers_enforcement() {
        let cycle1: HashMap<_, _> = [descriptor("a", "u1", "203.0.113.5:8096")].into();
        let cycle2: HashMap<_, _> = [
            descriptor("a", "u1", "203.0.113.5:8096"),
            descriptor("b", "u1", "198.51.100.9:8096"),
        ]
        .into();
        let mut f = fixture(vec![Ok(cycle1), Ok(cycle2)], &[]);

        f.monitor.process_cycle().await.unwrap();
        assert!(f.security.disables.lock().unwrap().is_empty());

        f.monitor.process_cycle().await.unwrap();
        let disables = f.security.disables.lock().unwrap();
        assert_eq!(
            disables.as_slice(),
            &[("u1".to_string(), "user-u1".to_string())]
        );
        let events = f.storage.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].active_sessions, 2);
        assert_eq!(events[0].trigger_ip, "198.51.100.9");
        assert_eq!(f.notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn whitelisted_user_is_never_disabled() {
        let cycle: HashMap<_, _> = [
            descriptor("a", "u1", "203.0.113.5:8096"),
            descriptor("b", "u1", "198.51.100.9:8096"),
        ]
        .into();
        let mut f = fixture(vec![Ok(cycle)], &["USER-U1"]);

        f.monitor.process_cycle().await.unwrap();
        assert!(f.security.disables.lock().unwrap().is_empty());
        assert!(f.storage.events.lock().unwrap().is_empty());
        assert!(f.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn registry_follows_snapshots_across_cycles() {
        let cycle1: HashMap<_, _> = [
            descriptor("a", "u1", "203.0.113.5:8096"),
            descriptor("b", "u2", "198.51.100.9:8096"),
        ]
        .into();
        let cycle2: HashMap<_, _> = [descriptor("b", "u2", "198.51.100.9:8096")].into();
        let mut f = fixture(vec![Ok(cycle1), Ok(cycle2)], &[]);

        f.monitor.process_cycle().await.unwrap();
        assert_eq!(f.monitor.active_sessions().len(), 2);
        assert_eq!(f.storage.starts.lock().unwrap().len(), 2);

        f.monitor.process_cycle().await.unwrap();
        let active = f.monitor.active_sessions();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].session_id, "b");
        assert_eq!(f.storage.ends.lock().unwrap().as_slice(), &["a".to_string()]);
    }

    #[tokio::test]
    async fn fetch_failure_costs_only_that_cycle() {
        let cycle2: HashMap<_, _> = [descriptor("a", "u1", "203.0.113.5:8096")].into();
        let mut f = fixture(
            vec![
                Err(LookupError::HttpError("connection refused".into())),
                Ok(cycle2),
            ],
            &[],
        );

        assert!(f.monitor.process_cycle().await.is_err());
        assert_eq!(f.monitor.active_sessions().len(), 0);

        f.monitor.process_cycle().await.unwrap();
        assert_eq!(f.monitor.active_sessions().len(), 1);
    }

    #[tokio::test]
    async fn sessions_without_user_id_are_tracked_but_not_evaluated() {
        let cycle: HashMap<_, _> = [
            descriptor("a", "", "203.0.113.5:8096"),
            descriptor("b", "", "198.51.100.9:8096"),
        ]
        .into();
        let mut f = fixture(vec![Ok(cycle)], &[]);

        f.monitor.process_cycle().await.unwrap();
        assert_eq!(f.monitor.active_sessions().len(), 2);
        assert!(f.security.disables.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_stops_the_loop_at_a_cycle_boundary() {
        let f = fixture(vec![], &[]);
        let mut monitor = f.monitor;
        assert_eq!(monitor.state(), MonitorState::Running);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            monitor.run(rx).await;
            monitor
        });

        tokio::task::yield_now().await;
        tx.send(true).unwrap();
        let monitor = handle.await.unwrap();
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }
}
