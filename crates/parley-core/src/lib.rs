//! Parley core types.
//!
//! The message model shared by every Parley crate: messages and payloads,
//! the newest-first [`MessageList`], connectivity and sync-mode enums, and
//! the codecs for the on-device cache and the hosted collection.

pub mod codec;
pub mod error;
pub mod list;
pub mod message;
pub mod state;
pub mod wire;

pub use codec::{decode_cache, encode_cache, CachedMessage, CachedUser, DecodedCache};
pub use error::CodecError;
pub use list::MessageList;
pub use message::{Author, GeoPoint, Message, MessageId, Payload};
pub use state::{ConnectivityState, SyncMode};
pub use wire::{RemoteDocument, RemoteRecord};
