//! Parley SDK - offline-aware message synchronization for chat clients
//!
//! A chat session shows one message list. While the device is online and
//! attached to the hosted collection, that list is whatever the latest
//! channel snapshot says, mirrored into an on-device cache. While offline it
//! is the last list the session held, and new messages are appended
//! optimistically and written to the cache.
//!
//! # Quick Start
//!
//! ```rust
//! use parley_sdk::prelude::*;
//!
//! # tokio_test::block_on(async {
//! let backend = MemoryBackend::new();
//! let client = Client::new(backend.backend(), ChatConfig::default());
//!
//! let identity = client.start("Alice").await?;
//! let session = client.open_session(&identity).await;
//!
//! // Go online: the session attaches and receives a snapshot
//! client.connectivity().report(Some(true));
//! session.send_text("Hello!").await?;
//! session.flush().await?;
//! assert_eq!(backend.channel.len(), 1);
//!
//! client.shutdown().await;
//! # Ok::<(), SdkError>(())
//! # }).unwrap();
//! ```
//!
//! # Architecture
//!
//! - [`cache`] - On-device key-value cache stores
//! - [`channel`] - Hosted collection subscriptions and publishing
//! - [`connectivity`] - Network reachability signal
//! - [`controller`] - The per-session sync state machine
//! - [`send`] - Send pipeline and input validation
//! - [`session`] - Session task and handle
//! - [`media`] - Image and location sharing
//! - [`auth`] - Anonymous sign-in
//! - [`client`] - Client lifecycle and backend wiring
//! - [`view`] - Render-ready chat view
//! - [`config`] - Configuration
//! - [`error`] - Error types

pub mod auth;
pub mod cache;
pub mod channel;
pub mod client;
pub mod config;
pub mod connectivity;
pub mod controller;
pub mod error;
pub mod events;
pub mod media;
pub mod send;
pub mod session;
pub mod view;

// Re-exports for convenience
pub use auth::{AuthProvider, MemoryAuth};
pub use cache::{CacheStore, FileCacheStore, MemoryCacheStore};
pub use channel::{ChannelEvent, MemoryChannel, RemoteChannel, SnapshotQuery, Subscription};
pub use client::{Backend, Client, Identity, MemoryBackend};
pub use config::{ChatConfig, ChatConfigBuilder};
pub use connectivity::ConnectivityMonitor;
pub use controller::SyncController;
pub use error::{AuthError, CacheError, ChannelError, MediaError, Result, SdkError};
pub use events::{Notice, NoticeKind, SessionEvent};
pub use media::{
    DeviceAction, DeviceCapability, DeviceServices, MediaActions, MediaStore, MemoryMediaStore,
    PermissionStatus, PickedImage, ScriptedDevice,
};
pub use send::validate_payload;
pub use session::{SessionHandle, SessionState};
pub use view::{ChatView, MessageView, StatusBanner};

// Re-export the message model
pub use parley_core::{
    Author, ConnectivityState, GeoPoint, Message, MessageId, MessageList, Payload, SyncMode,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::{Backend, Client, Identity, MemoryBackend};
    pub use crate::config::ChatConfig;
    pub use crate::error::SdkError;
    pub use crate::events::{Notice, SessionEvent};
    pub use crate::media::DeviceAction;
    pub use crate::session::SessionHandle;
    pub use parley_core::{ConnectivityState, Message, Payload, SyncMode};
}
