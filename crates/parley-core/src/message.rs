//! Chat messages and their payloads.
//!
//! A [`Message`] always carries an author and a creation timestamp. Its
//! [`Payload`] variant is chosen when the message is built and never changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Author id used for synthetic messages such as the welcome greeting.
pub const SYSTEM_AUTHOR_ID: &str = "system";
/// Display name of the synthetic system author.
pub const SYSTEM_AUTHOR_NAME: &str = "System";
/// Author id substituted when a record carries no usable author.
pub const UNKNOWN_AUTHOR_ID: &str = "unknown";
/// Display name substituted when a record carries no usable author name.
pub const ANONYMOUS_NAME: &str = "Anonymous";
/// Identity of the welcome message seeded into an empty session.
pub const WELCOME_MESSAGE_ID: &str = "welcome";

/// Opaque message identity, unique within a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh, locally unique identity.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The user who wrote a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// The author of synthetic messages.
    pub fn system() -> Self {
        Self::new(SYSTEM_AUTHOR_ID, SYSTEM_AUTHOR_NAME)
    }

    /// Placeholder for records whose author could not be recovered.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_AUTHOR_ID, ANONYMOUS_NAME)
    }

    pub fn is_system(&self) -> bool {
        self.id == SYSTEM_AUTHOR_ID
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both coordinates are finite and inside their valid ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// The primary content of a message.
///
/// Media variants may carry a caption alongside them; a plain text message
/// has no media.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Text {
        text: String,
    },
    Image {
        uri: String,
        caption: Option<String>,
    },
    Location {
        point: GeoPoint,
        caption: Option<String>,
    },
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text { text: text.into() }
    }

    pub fn image(uri: impl Into<String>) -> Self {
        Payload::Image {
            uri: uri.into(),
            caption: None,
        }
    }

    pub fn location(latitude: f64, longitude: f64) -> Self {
        Payload::Location {
            point: GeoPoint::new(latitude, longitude),
            caption: None,
        }
    }

    /// Build a payload from the loose optional fields used by cached and
    /// remote records. An image wins over a location when both are present.
    pub fn from_parts(text: String, image: Option<String>, location: Option<GeoPoint>) -> Self {
        let caption = if text.is_empty() { None } else { Some(text.clone()) };
        match (image, location) {
            (Some(uri), _) => Payload::Image { uri, caption },
            (None, Some(point)) => Payload::Location { point, caption },
            (None, None) => Payload::Text { text },
        }
    }

    /// Drop empty media captions. Stored records cannot tell an empty
    /// caption from a missing one, so messages never carry `Some("")`.
    pub fn normalized(self) -> Self {
        match self {
            Payload::Image { uri, caption } => Payload::Image {
                uri,
                caption: caption.filter(|c| !c.is_empty()),
            },
            Payload::Location { point, caption } => Payload::Location {
                point,
                caption: caption.filter(|c| !c.is_empty()),
            },
            text => text,
        }
    }

    /// Text shown for this payload; empty for uncaptioned media.
    pub fn body(&self) -> &str {
        match self {
            Payload::Text { text } => text,
            Payload::Image { caption, .. } | Payload::Location { caption, .. } => {
                caption.as_deref().unwrap_or("")
            }
        }
    }

    pub fn image_uri(&self) -> Option<&str> {
        match self {
            Payload::Image { uri, .. } => Some(uri),
            _ => None,
        }
    }

    pub fn geo_point(&self) -> Option<GeoPoint> {
        match self {
            Payload::Location { point, .. } => Some(*point),
            _ => None,
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Text { .. } => "text",
            Payload::Image { .. } => "image",
            Payload::Location { .. } => "location",
        }
    }
}

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    author: Author,
    created_at: DateTime<Utc>,
    payload: Payload,
}

impl Message {
    pub fn new(
        id: MessageId,
        author: Author,
        created_at: DateTime<Utc>,
        payload: Payload,
    ) -> Self {
        Self {
            id,
            author,
            created_at,
            payload: payload.normalized(),
        }
    }

    /// Build a message authored now with a freshly generated id.
    pub fn compose(author: Author, payload: Payload) -> Self {
        Self::new(MessageId::generate(), author, Utc::now(), payload)
    }

    /// The greeting shown in a session that has no cached history.
    pub fn welcome(user_name: &str) -> Self {
        let name = user_name.trim();
        let name = if name.is_empty() { "User" } else { name };
        Self::new(
            MessageId::new(WELCOME_MESSAGE_ID),
            Author::system(),
            Utc::now(),
            Payload::text(format!("Hello {}! Welcome to the chat!", name)),
        )
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn text(&self) -> &str {
        self.payload.body()
    }
}
