use serde::{Deserialize, Serialize};

/// One entry of the media server's active-session listing, as reported on
/// the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionDescriptor {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "UserId", default)]
    pub user_id: String,
    #[serde(rename = "RemoteEndPoint", default)]
    pub remote_endpoint: String,
    #[serde(rename = "DeviceName", default)]
    pub device_name: String,
    #[serde(rename = "Client", default)]
    pub client_name: String,
    #[serde(rename = "NowPlayingItem")]
    pub now_playing_item: Option<MediaItem>,
}

/// The item a session is currently playing.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaItem {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "SeriesName")]
    pub series_name: Option<String>,
    #[serde(rename = "ParentIndexNumber")]
    pub parent_index_number: Option<u32>,
    #[serde(rename = "IndexNumber")]
    pub index_number: Option<u32>,
}

/// User account details resolved from the media server.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub name: String,
    pub is_disabled: bool,
}

/// Logical payload of a ban notification. The webhook client serializes it
/// as JSON; its field names follow the audit vocabulary, not any particular
/// receiver's schema.
#[derive(Debug, Clone, Serialize)]
pub struct BanNotification {
    pub username: String,
    pub user_id: String,
    pub ip_address: String,
    /// Address family label, "IPv4" / "IPv6" / "unknown".
    pub ip_type: String,
    pub location: String,
    /// Distinct-network count at trigger time.
    pub session_count: u32,
    /// Formatted "%Y-%m-%d %H:%M:%S".
    pub timestamp: String,
    pub reason: String,
    pub device: String,
    pub client: String,
}
