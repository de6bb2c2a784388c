//! Client configuration.
//!
//! Every setting has a default so a client can start with no configuration.
//! [`ChatConfig::from_env`] applies `PARLEY_*` overrides on top.

use std::path::PathBuf;

/// Cache slot holding the last known message list.
pub const DEFAULT_CACHE_KEY: &str = "messages";
/// Hosted collection that stores message documents.
pub const DEFAULT_COLLECTION: &str = "messages";
/// Longest text message accepted from the composer.
pub const DEFAULT_MAX_TEXT_LEN: usize = 500;

/// Configuration for a Parley client.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Fixed key of the single cache slot.
    /// Env: `PARLEY_CACHE_KEY`
    pub cache_key: String,
    /// Directory for the file-backed cache; `None` keeps the cache in memory.
    /// Env: `PARLEY_CACHE_DIR`
    pub cache_dir: Option<PathBuf>,
    /// Name of the hosted message collection.
    /// Env: `PARLEY_COLLECTION`
    pub collection: String,
    /// Allow sessions to attach to the hosted channel at all.
    /// Env: `PARLEY_REMOTE_SYNC` (true/false)
    pub remote_sync: bool,
    /// Continue in local-only mode when anonymous sign-in fails.
    /// Env: `PARLEY_OFFLINE_FALLBACK` (true/false)
    pub offline_fallback: bool,
    /// Buffer size of each session's event broadcast.
    /// Env: `PARLEY_EVENT_CAPACITY`
    pub event_capacity: usize,
    /// Buffer size of each session's command queue.
    pub command_capacity: usize,
    /// Env: `PARLEY_MAX_TEXT_LEN`
    pub max_text_len: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            cache_dir: None,
            collection: DEFAULT_COLLECTION.to_string(),
            remote_sync: true,
            offline_fallback: true,
            event_capacity: 100,
            command_capacity: 64,
            max_text_len: DEFAULT_MAX_TEXT_LEN,
        }
    }
}

impl ChatConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup("PARLEY_CACHE_KEY") {
            if key.trim().is_empty() {
                tracing::warn!("Empty PARLEY_CACHE_KEY, using default");
            } else {
                config.cache_key = key;
            }
        }

        if let Some(dir) = lookup("PARLEY_CACHE_DIR") {
            if !dir.is_empty() {
                config.cache_dir = Some(PathBuf::from(dir));
            }
        }

        if let Some(collection) = lookup("PARLEY_COLLECTION") {
            if !collection.is_empty() {
                config.collection = collection;
            }
        }

        if let Some(val) = lookup("PARLEY_REMOTE_SYNC") {
            config.remote_sync = parse_flag(&val);
        }

        if let Some(val) = lookup("PARLEY_OFFLINE_FALLBACK") {
            config.offline_fallback = parse_flag(&val);
        }

        if let Some(val) = lookup("PARLEY_EVENT_CAPACITY") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.event_capacity = n,
                _ => tracing::warn!(value = %val, "Invalid PARLEY_EVENT_CAPACITY, using default"),
            }
        }

        if let Some(val) = lookup("PARLEY_MAX_TEXT_LEN") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_text_len = n,
                _ => tracing::warn!(value = %val, "Invalid PARLEY_MAX_TEXT_LEN, using default"),
            }
        }

        config
    }
}

fn parse_flag(val: &str) -> bool {
    let val = val.trim();
    !(val.eq_ignore_ascii_case("false") || val == "0" || val.eq_ignore_ascii_case("no"))
}

/// Builder for chat configuration.
pub struct ChatConfigBuilder {
    config: ChatConfig,
}

impl ChatConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ChatConfig::default(),
        }
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.config.cache_key = key.into();
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(dir.into());
        self
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    pub fn remote_sync(mut self, enabled: bool) -> Self {
        self.config.remote_sync = enabled;
        self
    }

    pub fn offline_fallback(mut self, enabled: bool) -> Self {
        self.config.offline_fallback = enabled;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.config.command_capacity = capacity;
        self
    }

    pub fn max_text_len(mut self, len: usize) -> Self {
        self.config.max_text_len = len;
        self
    }

    pub fn build(self) -> ChatConfig {
        self.config
    }
}

impl Default for ChatConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
