use crate::network::types::AddressFamily;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One playback occurrence from a user's client to the media server.
///
/// Created when a session id first appears in a snapshot, mutated exactly
/// once to record its end, otherwise immutable. Owned by the
/// [`SessionRegistry`](crate::session_tracking::registry::SessionRegistry)
/// while active; external readers only ever see clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque id issued by the media server.
    pub session_id: String,
    pub user_id: String,
    pub username: String,
    pub ip_address: String,
    pub address_family: AddressFamily,
    pub device: String,
    pub client: String,
    pub media_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub location: String,
}
