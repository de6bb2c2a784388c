//! Cache serialization for message lists.
//!
//! The cache holds a JSON array of plain records:
//!
//! ```text
//! [{ "_id": "...", "text": "...", "createdAt": "2024-01-01T10:00:00Z",
//!    "user": { "_id": "...", "name": "..." },
//!    "image": "https://...",                          (optional)
//!    "location": { "latitude": 1.0, "longitude": 2.0 } (optional) }]
//! ```
//!
//! Encoding is strict. Decoding is lenient per entry: whatever an entry is
//! missing is replaced with a safe default, and entries that are not objects
//! at all are skipped. Only a blob that is not a JSON array is an error.

use crate::error::{CodecError, Result};
use crate::list::MessageList;
use crate::message::{
    Author, GeoPoint, Message, MessageId, Payload, ANONYMOUS_NAME, UNKNOWN_AUTHOR_ID,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author record nested in a cached message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

/// One message as it is written to the cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub user: CachedUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl From<&Message> for CachedMessage {
    fn from(msg: &Message) -> Self {
        Self {
            id: msg.id().0.clone(),
            text: msg.text().to_string(),
            created_at: msg.created_at(),
            user: CachedUser {
                id: msg.author().id.clone(),
                name: msg.author().name.clone(),
            },
            image: msg.payload().image_uri().map(str::to_string),
            location: msg.payload().geo_point(),
        }
    }
}

impl From<CachedMessage> for Message {
    fn from(record: CachedMessage) -> Self {
        Message::new(
            MessageId::new(record.id),
            Author::new(record.user.id, record.user.name),
            record.created_at,
            Payload::from_parts(record.text, record.image, record.location),
        )
    }
}

/// Outcome of decoding a cache blob.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedCache {
    pub messages: MessageList,
    /// Entries dropped because they were not objects.
    pub skipped: usize,
}

/// Serialize a list for the cache, preserving its order.
pub fn encode_cache(list: &MessageList) -> Result<Vec<u8>> {
    let records: Vec<CachedMessage> = list.iter().map(CachedMessage::from).collect();
    serde_json::to_vec(&records).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decode a cache blob, normalizing incomplete entries.
///
/// `now` is used for entries with no readable timestamp.
pub fn decode_cache(bytes: &[u8], now: DateTime<Utc>) -> Result<DecodedCache> {
    let value: Value = serde_json::from_slice(bytes)?;
    let entries = match value {
        Value::Array(entries) => entries,
        other => return Err(CodecError::NotAList(json_kind(&other).to_string())),
    };

    let mut decoded = DecodedCache::default();
    let mut messages = Vec::with_capacity(entries.len());
    for entry in &entries {
        match normalize_entry(entry, now) {
            Some(msg) => messages.push(msg),
            None => decoded.skipped += 1,
        }
    }
    decoded.messages = MessageList::from(messages);
    Ok(decoded)
}

/// Rebuild a message from a loosely shaped cache entry.
pub fn normalize_entry(entry: &Value, now: DateTime<Utc>) -> Option<Message> {
    let obj = entry.as_object()?;

    let id = obj
        .get("_id")
        .and_then(scalar_to_string)
        .filter(|s| !s.is_empty())
        .map(MessageId::new)
        .unwrap_or_else(MessageId::generate);

    let text = obj.get("text").and_then(scalar_to_string).unwrap_or_default();

    let created_at = obj
        .get("createdAt")
        .and_then(parse_timestamp)
        .unwrap_or(now);

    let author = match obj.get("user").and_then(Value::as_object) {
        Some(user) => Author::new(
            user.get("_id")
                .and_then(scalar_to_string)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNKNOWN_AUTHOR_ID.to_string()),
            user.get("name")
                .and_then(scalar_to_string)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| ANONYMOUS_NAME.to_string()),
        ),
        None => Author::unknown(),
    };

    let image = obj
        .get("image")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let location = obj.get("location").and_then(parse_geo_point);

    Some(Message::new(
        id,
        author,
        created_at,
        Payload::from_parts(text, image, location),
    ))
}

/// Stringify a JSON scalar; objects, arrays and null yield `None`.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accept RFC 3339 strings or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn parse_geo_point(value: &Value) -> Option<GeoPoint> {
    let obj = value.as_object()?;
    let latitude = obj.get("latitude")?.as_f64()?;
    let longitude = obj.get("longitude")?.as_f64()?;
    Some(GeoPoint::new(latitude, longitude))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_encode_then_decode_preserves_order_and_fields() {
        let list: MessageList = vec![
            Message::compose(Author::new("u2", "Bob"), Payload::image("https://x/y.jpg")),
            Message::compose(Author::new("u1", "Alice"), Payload::location(48.5, 2.25)),
            Message::compose(Author::new("u1", "Alice"), Payload::text("hello")),
        ]
        .into();

        let bytes = encode_cache(&list).unwrap();
        let decoded = decode_cache(&bytes, fixed_now()).unwrap();

        assert_eq!(decoded.skipped, 0);
        assert_eq!(decoded.messages, list);
    }

    #[test]
    fn test_encoded_shape() {
        let msg = Message::new(
            MessageId::new("m1"),
            Author::new("u1", "Alice"),
            fixed_now(),
            Payload::text("hi"),
        );
        let bytes = encode_cache(&vec![msg].into()).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value[0]["_id"], "m1");
        assert_eq!(value[0]["text"], "hi");
        assert_eq!(value[0]["user"]["_id"], "u1");
        assert_eq!(value[0]["user"]["name"], "Alice");
        assert!(value[0]["createdAt"].as_str().unwrap().starts_with("2024-05-01T12:00:00"));
        assert!(value[0].get("image").is_none());
        assert!(value[0].get("location").is_none());
    }

    #[test]
    fn test_missing_fields_are_normalized() {
        let blob = json!([
            { "_id": "a" },
            { "_id": "b", "text": null, "user": {} },
            { "_id": "c", "text": 42, "user": { "_id": 7, "name": "Carol" } }
        ]);
        let decoded = decode_cache(blob.to_string().as_bytes(), fixed_now()).unwrap();
        let msgs = decoded.messages.as_slice();

        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].text(), "");
        assert_eq!(msgs[0].author(), &Author::unknown());
        assert_eq!(msgs[0].created_at(), fixed_now());

        assert_eq!(msgs[1].author().id, "unknown");
        assert_eq!(msgs[1].author().name, "Anonymous");

        assert_eq!(msgs[2].text(), "42");
        assert_eq!(msgs[2].author(), &Author::new("7", "Carol"));
    }

    #[test]
    fn test_non_object_entries_are_skipped() {
        let blob = json!([1, "two", null, { "_id": "ok", "text": "fine" }]);
        let decoded = decode_cache(blob.to_string().as_bytes(), fixed_now()).unwrap();

        assert_eq!(decoded.skipped, 3);
        assert_eq!(decoded.messages.len(), 1);
        assert_eq!(decoded.messages.as_slice()[0].id().as_str(), "ok");
    }

    #[test]
    fn test_missing_id_generates_one() {
        let blob = json!([{ "text": "anon" }, { "text": "anon" }]);
        let decoded = decode_cache(blob.to_string().as_bytes(), fixed_now()).unwrap();
        let msgs = decoded.messages.as_slice();

        assert_ne!(msgs[0].id(), msgs[1].id());
    }

    #[test]
    fn test_epoch_millis_timestamp() {
        let blob = json!([{ "_id": "t", "createdAt": 1_714_564_800_000i64 }]);
        let decoded = decode_cache(blob.to_string().as_bytes(), fixed_now()).unwrap();
        assert_eq!(decoded.messages.as_slice()[0].created_at(), fixed_now());
    }

    #[test]
    fn test_partial_location_is_ignored() {
        let blob = json!([{ "_id": "l", "text": "where", "location": { "latitude": 1.0 } }]);
        let decoded = decode_cache(blob.to_string().as_bytes(), fixed_now()).unwrap();
        assert_eq!(decoded.messages.as_slice()[0].payload(), &Payload::text("where"));
    }

    #[test]
    fn test_rejects_non_array() {
        let err = decode_cache(br#"{"_id":"x"}"#, fixed_now()).unwrap_err();
        assert_eq!(err, CodecError::NotAList("an object".into()));

        assert!(matches!(
            decode_cache(b"not json", fixed_now()),
            Err(CodecError::Malformed(_))
        ));
    }
}
