//! Error types for the Parley SDK.

use crate::media::DeviceCapability;
use parley_core::CodecError;
use thiserror::Error;

/// Failures of the on-device key-value cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache read failed for '{key}': {reason}")]
    Read { key: String, reason: String },

    #[error("Cache write failed for '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("Invalid cache key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
}

/// Failures of the hosted message channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Listener error: {0}")]
    Listener(String),

    #[error("Channel closed")]
    Closed,
}

/// Failures of the anonymous sign-in provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Sign-in unavailable: {0}")]
    Unavailable(String),

    #[error("Sign-in rejected: {0}")]
    Rejected(String),
}

/// Failures of device media, location, and object storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Location unavailable: {0}")]
    Location(String),

    #[error("Device error: {0}")]
    Device(String),
}

/// Error type for SDK operations.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Permission denied: {0}")]
    PermissionDenied(DeviceCapability),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Message too long: {len} characters (max {max})")]
    MessageTooLong { len: usize, max: usize },

    #[error("Invalid location: ({latitude}, {longitude})")]
    InvalidLocation { latitude: f64, longitude: f64 },

    #[error("Please enter your name")]
    MissingName,

    #[error("Session closed")]
    SessionClosed,
}

/// Result type for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;
