//! Connectivity and synchronization mode.

use serde::{Deserialize, Serialize};

/// Network reachability as reported by the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectivityState {
    /// The platform has not reported reachability yet.
    #[default]
    Unknown,
    Online,
    Offline,
}

impl ConnectivityState {
    /// Map the platform's `true`/`false`/`null` reachability flag.
    pub fn from_reachability(reachable: Option<bool>) -> Self {
        match reachable {
            Some(true) => ConnectivityState::Online,
            Some(false) => ConnectivityState::Offline,
            None => ConnectivityState::Unknown,
        }
    }

    pub fn is_online(self) -> bool {
        self == ConnectivityState::Online
    }

    pub fn is_offline(self) -> bool {
        self == ConnectivityState::Offline
    }
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Unknown => write!(f, "unknown"),
            ConnectivityState::Online => write!(f, "online"),
            ConnectivityState::Offline => write!(f, "offline"),
        }
    }
}

/// Which source is authoritative for the visible message list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncMode {
    /// A live channel subscription is feeding snapshots.
    RemoteLive,
    /// Showing the last persisted or in-memory list only.
    #[default]
    CacheFallback,
}

impl SyncMode {
    pub fn is_live(self) -> bool {
        self == SyncMode::RemoteLive
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::RemoteLive => write!(f, "remote-live"),
            SyncMode::CacheFallback => write!(f, "cache-fallback"),
        }
    }
}
