//! High-level client for the Parley SDK.

use crate::auth::{AuthProvider, MemoryAuth};
use crate::cache::{CacheStore, FileCacheStore, MemoryCacheStore};
use crate::channel::{MemoryChannel, RemoteChannel};
use crate::config::ChatConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::controller::SyncController;
use crate::error::{Result, SdkError};
use crate::media::{DeviceServices, MediaActions, MediaStore, MemoryMediaStore, ScriptedDevice};
use crate::session::SessionHandle;
use chrono::Utc;
use parking_lot::RwLock;
use parley_core::Author;
use std::collections::HashMap;
use std::sync::Arc;
use ulid::Ulid;

/// Who the user is for the lifetime of the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub name: String,
    /// False when sign-in failed and the client runs local-only.
    pub remote_sync: bool,
}

impl Identity {
    pub fn author(&self) -> Author {
        Author::new(self.user_id.clone(), self.name.clone())
    }
}

/// The external services a client talks to.
#[derive(Clone)]
pub struct Backend {
    pub cache: Arc<dyn CacheStore>,
    pub channel: Arc<dyn RemoteChannel>,
    pub auth: Arc<dyn AuthProvider>,
    pub device: Arc<dyn DeviceServices>,
    pub media: Arc<dyn MediaStore>,
}

impl Backend {
    /// An entirely in-process backend.
    pub fn in_memory() -> Self {
        MemoryBackend::new().backend()
    }

    /// In-process services with the cache chosen by `config`: file-backed
    /// when a cache directory is set, in memory otherwise.
    pub fn from_config(config: &ChatConfig) -> Self {
        let memory = MemoryBackend::with_collection(&config.collection);
        let cache: Arc<dyn CacheStore> = match &config.cache_dir {
            Some(dir) => Arc::new(FileCacheStore::new(dir.clone())),
            None => memory.cache.clone(),
        };
        Backend {
            cache,
            ..memory.backend()
        }
    }
}

/// In-process backend that keeps concrete handles for inspection and
/// failure injection.
#[derive(Clone)]
pub struct MemoryBackend {
    pub cache: Arc<MemoryCacheStore>,
    pub channel: Arc<MemoryChannel>,
    pub auth: Arc<MemoryAuth>,
    pub device: Arc<ScriptedDevice>,
    pub media: Arc<MemoryMediaStore>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_collection(crate::config::DEFAULT_COLLECTION)
    }

    pub fn with_collection(collection: &str) -> Self {
        Self {
            cache: Arc::new(MemoryCacheStore::new()),
            channel: Arc::new(MemoryChannel::new(collection)),
            auth: Arc::new(MemoryAuth::new()),
            device: Arc::new(ScriptedDevice::new()),
            media: Arc::new(MemoryMediaStore::new()),
        }
    }

    pub fn backend(&self) -> Backend {
        Backend {
            cache: self.cache.clone(),
            channel: self.channel.clone(),
            auth: self.auth.clone(),
            device: self.device.clone(),
            media: self.media.clone(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// The main Parley client.
///
/// Owns the backend handles and the connectivity signal, and tracks open
/// sessions.
///
/// # Example
///
/// ```rust
/// use parley_sdk::{Backend, ChatConfig, Client};
///
/// # tokio_test::block_on(async {
/// let client = Client::new(Backend::in_memory(), ChatConfig::default());
/// let identity = client.start("Alice").await.unwrap();
/// let session = client.open_session(&identity).await;
///
/// client.connectivity().report(Some(false));
/// session.send_text("hi").await.unwrap();
/// assert_eq!(session.messages().first().unwrap().text(), "hi");
///
/// client.shutdown().await;
/// # });
/// ```
pub struct Client {
    config: ChatConfig,
    backend: Backend,
    connectivity: Arc<ConnectivityMonitor>,
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl Client {
    pub fn new(backend: Backend, config: ChatConfig) -> Self {
        Self {
            config,
            backend,
            connectivity: Arc::new(ConnectivityMonitor::new()),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The reachability signal shared by all sessions.
    pub fn connectivity(&self) -> &Arc<ConnectivityMonitor> {
        &self.connectivity
    }

    /// Sign in anonymously as `display_name`.
    ///
    /// If sign-in fails and offline fallback is enabled, the user continues
    /// with a local id and sessions never attach to the remote channel.
    pub async fn start(&self, display_name: &str) -> Result<Identity> {
        let name = display_name.trim();
        if name.is_empty() {
            return Err(SdkError::MissingName);
        }

        match self.backend.auth.sign_in_anonymously().await {
            Ok(user_id) => {
                tracing::info!(%user_id, "Signed in anonymously");
                Ok(Identity {
                    user_id,
                    name: name.to_string(),
                    remote_sync: true,
                })
            }
            Err(e) if self.config.offline_fallback => {
                let user_id = format!("local-{}", Utc::now().timestamp_millis());
                tracing::warn!(error = %e, %user_id, "Sign-in failed, continuing in local mode");
                Ok(Identity {
                    user_id,
                    name: name.to_string(),
                    remote_sync: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Open a chat session for `identity`.
    ///
    /// The cache is loaded and the current connectivity applied before the
    /// handle is returned.
    pub async fn open_session(&self, identity: &Identity) -> SessionHandle {
        let session_id = Ulid::new().to_string();
        let mut controller = SyncController::new(
            self.backend.cache.clone(),
            self.backend.channel.clone(),
            &self.config,
        )
        .with_remote_sync(self.config.remote_sync && identity.remote_sync);

        controller.initialize(&identity.name).await;

        let (current, connectivity) = self.connectivity.subscribe();
        controller.on_connectivity_change(current).await;

        let handle = SessionHandle::spawn(
            session_id.clone(),
            identity.author(),
            controller,
            connectivity,
            MediaActions::new(self.backend.device.clone(), self.backend.media.clone()),
            self.config.command_capacity,
        );

        tracing::debug!(%session_id, user = %identity.user_id, "Session opened");
        self.sessions.write().insert(session_id, handle.clone());
        handle
    }

    pub fn get_session(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Close and forget a session.
    pub async fn close_session(&self, session_id: &str) -> Result<()> {
        let handle = self.sessions.write().remove(session_id);
        match handle {
            Some(handle) => handle.close().await,
            None => Err(SdkError::SessionClosed),
        }
    }

    /// Close every open session.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self.sessions.write().drain().map(|(_, h)| h).collect();
        for handle in handles {
            if let Err(e) = handle.close().await {
                tracing::debug!(session = handle.session_id(), error = %e, "Session was already closed");
            }
        }
        tracing::debug!("Client shut down");
    }
}
