//! Events emitted by a chat session.

use crate::media::DeviceCapability;
use parley_core::SyncMode;

/// How a notice should be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    /// Modal alert the user must dismiss.
    Blocking,
    /// Transient, non-blocking message.
    Toast,
}

/// A user-visible notice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn blocking(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Blocking,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn toast(body: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Toast,
            title: String::new(),
            body: body.into(),
        }
    }

    /// Shown when connectivity drops.
    pub fn connection_lost() -> Self {
        Self::blocking(
            "Connection Lost",
            "You are now offline. Messages will be saved locally until connection is restored.",
        )
    }

    pub fn permission_denied(capability: DeviceCapability) -> Self {
        let body = match capability {
            DeviceCapability::Location => "Location permissions haven't been granted.",
            DeviceCapability::MediaLibrary | DeviceCapability::Camera => {
                "Permissions haven't been granted."
            }
        };
        Self::blocking("Permission Denied", body)
    }

    pub fn upload_failed() -> Self {
        Self::blocking("Error", "Failed to upload image. Please try again.")
    }

    pub fn location_failed() -> Self {
        Self::blocking("Error", "Failed to get location. Please try again.")
    }

    pub fn send_failed() -> Self {
        Self::toast("Failed to send message")
    }

    pub fn is_blocking(&self) -> bool {
        self.kind == NoticeKind::Blocking
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.title.is_empty() {
            write!(f, "{}", self.body)
        } else {
            write!(f, "{}: {}", self.title, self.body)
        }
    }
}

/// Events emitted by a session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The visible message list changed.
    MessagesChanged { count: usize },
    /// The authoritative source switched.
    ModeChanged(SyncMode),
    /// Something the user should see.
    Notice(Notice),
    /// The session was torn down.
    Closed,
}
