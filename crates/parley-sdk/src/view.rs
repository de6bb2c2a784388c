//! Render-ready view of a chat session.

use parley_core::{ConnectivityState, GeoPoint, Message, MessageList, SyncMode};
use serde::Serialize;

/// Status line shown above the message list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StatusBanner {
    Connected,
    Offline,
    LocalMode,
}

impl StatusBanner {
    pub fn from_state(connectivity: ConnectivityState, mode: SyncMode) -> Self {
        match (connectivity, mode) {
            (ConnectivityState::Offline, _) => StatusBanner::Offline,
            (ConnectivityState::Online, SyncMode::RemoteLive) => StatusBanner::Connected,
            _ => StatusBanner::LocalMode,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            StatusBanner::Connected => "Connected - Real-time chat",
            StatusBanner::Offline => "Offline - Showing cached messages",
            StatusBanner::LocalMode => "Local Mode - Messages saved locally",
        }
    }
}

impl std::fmt::Display for StatusBanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// One rendered message bubble.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessageView {
    pub id: String,
    /// Authored by the viewing user.
    pub is_mine: bool,
    pub author_name: String,
    pub text: String,
    pub image: Option<String>,
    pub location: Option<GeoPoint>,
    /// `HH:MM:SS`, UTC.
    pub time: String,
}

impl MessageView {
    pub fn new(message: &Message, viewer_id: &str) -> Self {
        let author = message.author();
        Self {
            id: message.id().to_string(),
            is_mine: author.id == viewer_id,
            author_name: if author.name.is_empty() {
                "Unknown".to_string()
            } else {
                author.name.clone()
            },
            text: message.text().to_string(),
            image: message.payload().image_uri().map(str::to_string),
            location: message.payload().geo_point(),
            time: message.created_at().format("%H:%M:%S").to_string(),
        }
    }
}

/// Everything the chat screen draws.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatView {
    pub title: String,
    pub banner: StatusBanner,
    /// Newest first.
    pub messages: Vec<MessageView>,
    /// The composer is hidden while offline.
    pub can_compose: bool,
}

impl ChatView {
    pub fn render(
        title: &str,
        viewer_id: &str,
        connectivity: ConnectivityState,
        mode: SyncMode,
        messages: &MessageList,
    ) -> Self {
        Self {
            title: title.to_string(),
            banner: StatusBanner::from_state(connectivity, mode),
            messages: messages
                .iter()
                .map(|m| MessageView::new(m, viewer_id))
                .collect(),
            can_compose: !connectivity.is_offline(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use parley_core::{Author, MessageId, Payload};

    #[test]
    fn test_banner() {
        use ConnectivityState::*;
        assert_eq!(
            StatusBanner::from_state(Online, SyncMode::RemoteLive).text(),
            "Connected - Real-time chat"
        );
        assert_eq!(
            StatusBanner::from_state(Offline, SyncMode::CacheFallback).text(),
            "Offline - Showing cached messages"
        );
        assert_eq!(
            StatusBanner::from_state(Online, SyncMode::CacheFallback),
            StatusBanner::LocalMode
        );
        assert_eq!(
            StatusBanner::from_state(Unknown, SyncMode::CacheFallback),
            StatusBanner::LocalMode
        );
    }

    #[test]
    fn test_render_messages() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
        let list = MessageList::from(vec![
            Message::new(
                MessageId::new("2"),
                Author::new("u2", ""),
                at,
                Payload::location(48.5, 2.25),
            ),
            Message::new(MessageId::new("1"), Author::new("u1", "Alice"), at, Payload::text("hi")),
        ]);

        let view = ChatView::render("Alice", "u1", ConnectivityState::Offline, SyncMode::CacheFallback, &list);
        assert!(!view.can_compose);
        assert_eq!(view.messages.len(), 2);

        let other = &view.messages[0];
        assert!(!other.is_mine);
        assert_eq!(other.author_name, "Unknown");
        assert_eq!(other.location, Some(GeoPoint::new(48.5, 2.25)));
        assert_eq!(other.time, "09:05:07");

        let mine = &view.messages[1];
        assert!(mine.is_mine);
        assert_eq!(mine.text, "hi");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["banner"], "Offline");
        assert_eq!(json["messages"][1]["author_name"], "Alice");
    }
}
