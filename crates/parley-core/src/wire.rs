//! Records exchanged with the hosted message collection.
//!
//! The collection stores one document per message. The document id is
//! assigned by the backend and is not part of the record body.

use crate::message::{
    Author, GeoPoint, Message, MessageId, Payload, ANONYMOUS_NAME, UNKNOWN_AUTHOR_ID,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of a message document in the hosted collection.
///
/// Reads are lenient: documents written by other clients may omit fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Author display name.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(rename = "userID", default)]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl RemoteRecord {
    /// Record to publish for a locally authored message.
    pub fn from_message(msg: &Message) -> Self {
        let name = if msg.author().name.is_empty() {
            ANONYMOUS_NAME.to_string()
        } else {
            msg.author().name.clone()
        };
        Self {
            text: msg.text().to_string(),
            created_at: Some(msg.created_at()),
            user: Some(name),
            user_id: Some(msg.author().id.clone()),
            image: msg.payload().image_uri().map(str::to_string),
            location: msg.payload().geo_point(),
        }
    }
}

/// A stored document: backend id plus record body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    #[serde(flatten)]
    pub record: RemoteRecord,
}

impl RemoteDocument {
    pub fn new(id: impl Into<String>, record: RemoteRecord) -> Self {
        Self {
            id: id.into(),
            record,
        }
    }

    /// Sort key used by the collection's creation-time ordering.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.record.created_at
    }

    /// Convert into a message, substituting defaults for missing fields.
    pub fn into_message(self, now: DateTime<Utc>) -> Message {
        let record = self.record;
        let author = Author::new(
            record
                .user_id
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNKNOWN_AUTHOR_ID.to_string()),
            record
                .user
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| ANONYMOUS_NAME.to_string()),
        );
        Message::new(
            MessageId::new(self.id),
            author,
            record.created_at.unwrap_or(now),
            Payload::from_parts(
                record.text,
                record.image.filter(|s| !s.is_empty()),
                record.location,
            ),
        )
    }
}

/// Convert a whole snapshot, keeping the backend's order.
pub fn snapshot_to_messages(docs: Vec<RemoteDocument>, now: DateTime<Utc>) -> Vec<Message> {
    docs.into_iter().map(|doc| doc.into_message(now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_record_field_names() {
        let msg = Message::compose(Author::new("u1", "Alice"), Payload::location(10.5, -3.25));
        let value = serde_json::to_value(RemoteRecord::from_message(&msg)).unwrap();

        assert_eq!(value["user"], "Alice");
        assert_eq!(value["userID"], "u1");
        assert_eq!(value["text"], "");
        assert_eq!(value["location"]["latitude"], 10.5);
        assert!(value.get("image").is_none());
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_sparse_document_defaults() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let doc: RemoteDocument = serde_json::from_value(json!({ "id": "d1" })).unwrap();
        let msg = doc.into_message(now);

        assert_eq!(msg.id().as_str(), "d1");
        assert_eq!(msg.text(), "");
        assert_eq!(msg.author(), &Author::unknown());
        assert_eq!(msg.created_at(), now);
    }

    #[test]
    fn test_document_keeps_identity_and_payload() {
        let now = Utc::now();
        let record = RemoteRecord {
            text: "look".into(),
            created_at: Some(now),
            user: Some("Bob".into()),
            user_id: Some("u2".into()),
            image: Some("https://cdn/img.png".into()),
            location: None,
        };
        let msg = RemoteDocument::new("doc-9", record).into_message(now);

        assert_eq!(msg.id().as_str(), "doc-9");
        assert_eq!(msg.author(), &Author::new("u2", "Bob"));
        assert_eq!(msg.payload().image_uri(), Some("https://cdn/img.png"));
        assert_eq!(msg.text(), "look");
    }
}
