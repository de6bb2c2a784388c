//! Reconciles connectivity, the remote channel and the local cache.
//!
//! The [`SyncController`] exclusively owns a session's message list. At any
//! time exactly one source is authoritative: live channel snapshots while
//! attached and online, otherwise whatever the list held last. Every channel
//! snapshot is mirrored into the cache in the background.

use crate::cache::CacheStore;
use crate::channel::{ChannelEvent, RemoteChannel, SnapshotQuery, Subscription};
use crate::config::ChatConfig;
use crate::error::ChannelError;
use crate::events::{Notice, SessionEvent};
use chrono::Utc;
use futures::FutureExt;
use parley_core::wire::snapshot_to_messages;
use parley_core::{decode_cache, encode_cache, ConnectivityState, Message, MessageList, SyncMode};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// Per-session synchronization state machine.
pub struct SyncController {
    session_name: String,
    cache: Arc<dyn CacheStore>,
    channel: Arc<dyn RemoteChannel>,
    cache_key: String,
    max_text_len: usize,
    remote_sync: bool,
    messages: MessageList,
    connectivity: ConnectivityState,
    subscription: Option<Subscription>,
    remote_live: bool,
    torn_down: bool,
    pending: JoinSet<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl SyncController {
    /// Create a controller with an empty list. Call [`initialize`] next.
    ///
    /// [`initialize`]: SyncController::initialize
    pub fn new(
        cache: Arc<dyn CacheStore>,
        channel: Arc<dyn RemoteChannel>,
        config: &ChatConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            session_name: String::new(),
            cache,
            channel,
            cache_key: config.cache_key.clone(),
            max_text_len: config.max_text_len,
            remote_sync: config.remote_sync,
            messages: MessageList::new(),
            connectivity: ConnectivityState::Unknown,
            subscription: None,
            remote_live: false,
            torn_down: false,
            pending: JoinSet::new(),
            events,
        }
    }

    /// Allow or forbid attaching to the remote channel.
    pub fn with_remote_sync(mut self, enabled: bool) -> Self {
        self.remote_sync = enabled;
        self
    }

    /// Load the cached list, or seed the welcome greeting when there is none.
    ///
    /// Never fails: unreadable caches are logged and treated as absent.
    pub async fn initialize(&mut self, session_name: &str) {
        if self.torn_down {
            tracing::warn!("initialize called on a torn down session");
            return;
        }
        self.session_name = session_name.to_string();

        let cached = match self.cache.get(&self.cache_key).await {
            Ok(Some(bytes)) => match decode_cache(&bytes, Utc::now()) {
                Ok(decoded) => {
                    if decoded.skipped > 0 {
                        tracing::warn!(skipped = decoded.skipped, "Dropped malformed cache entries");
                    }
                    Some(decoded.messages)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable message cache");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read message cache");
                None
            }
        };

        self.messages = match cached {
            Some(list) => {
                tracing::debug!(count = list.len(), "Loaded cached messages");
                list
            }
            None => {
                tracing::debug!("No cached messages, showing welcome");
                MessageList::welcome(session_name)
            }
        };
        self.emit(SessionEvent::MessagesChanged {
            count: self.messages.len(),
        });
    }

    /// Apply a connectivity reading.
    ///
    /// Going online attaches the channel if this session may sync; going
    /// offline detaches it and tells the user. `Unknown` is ignored, as is a
    /// reading equal to the current state.
    pub async fn on_connectivity_change(&mut self, state: ConnectivityState) {
        if self.torn_down || state == ConnectivityState::Unknown || state == self.connectivity {
            return;
        }

        let previous = self.sync_mode();
        self.connectivity = state;

        if state.is_online() {
            tracing::info!("Connectivity restored");
            self.attach().await;
        } else {
            tracing::info!("Connectivity lost, continuing from cache");
            self.detach();
            self.emit(SessionEvent::Notice(Notice::connection_lost()));
        }
        self.emit_mode_change(previous);
    }

    /// Replace the list wholesale with a channel snapshot and mirror it to
    /// the cache.
    ///
    /// Ignored after teardown or while no subscription is attached.
    pub fn on_remote_snapshot(&mut self, messages: Vec<Message>) {
        if self.torn_down {
            tracing::trace!("Dropping snapshot delivered after teardown");
            return;
        }
        if self.subscription.is_none() {
            tracing::debug!("Dropping snapshot from a detached channel");
            return;
        }

        let previous = self.sync_mode();
        self.messages.replace(messages);
        self.remote_live = true;
        tracing::debug!(count = self.messages.len(), "Applied remote snapshot");

        self.emit(SessionEvent::MessagesChanged {
            count: self.messages.len(),
        });
        self.emit_mode_change(previous);
        self.persist();
    }

    /// Fall back to the cache after a listener failure.
    ///
    /// The subscription is released and not retried; the next transition to
    /// online attaches again.
    pub fn on_remote_channel_error(&mut self, error: ChannelError) {
        if self.torn_down {
            return;
        }
        let previous = self.sync_mode();
        tracing::warn!(error = %error, "Remote channel failed, falling back to cache");
        self.remote_live = false;
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.emit_mode_change(previous);
    }

    /// Release the channel. Must be called once when the session ends.
    pub fn teardown(&mut self) {
        if self.torn_down {
            tracing::warn!("Session already torn down");
            return;
        }
        let previous = self.sync_mode();
        self.detach();
        self.torn_down = true;
        self.emit_mode_change(previous);
        self.emit(SessionEvent::Closed);
        tracing::debug!(session = %self.session_name, "Session torn down");
    }

    /// Wait for the next event from the attached channel.
    ///
    /// Pends forever while detached. A channel that goes away without an
    /// error is reported as [`ChannelError::Closed`].
    pub async fn next_channel_event(&mut self) -> ChannelEvent {
        match self.subscription.as_mut() {
            Some(subscription) => subscription
                .next_event()
                .await
                .unwrap_or(ChannelEvent::Error(ChannelError::Closed)),
            None => futures::future::pending().await,
        }
    }

    /// Route one channel delivery to the snapshot or error handler.
    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Snapshot(documents) => {
                self.on_remote_snapshot(snapshot_to_messages(documents, Utc::now()))
            }
            ChannelEvent::Error(error) => self.on_remote_channel_error(error),
        }
    }

    /// Apply every channel event that has already been delivered.
    pub fn drain_channel(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self
            .subscription
            .as_mut()
            .and_then(Subscription::try_next_event)
        {
            self.handle_channel_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait for every background cache write and publish to finish.
    pub async fn flush(&mut self) {
        while let Some(result) = self.pending.join_next().await {
            log_join_error(result);
        }
    }

    /// The authoritative source right now.
    pub fn sync_mode(&self) -> SyncMode {
        if self.subscription.is_some() && self.remote_live && self.connectivity.is_online() {
            SyncMode::RemoteLive
        } else {
            SyncMode::CacheFallback
        }
    }

    pub fn messages(&self) -> &MessageList {
        &self.messages
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn remote_sync_enabled(&self) -> bool {
        self.remote_sync
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Background tasks not yet reaped.
    pub fn pending_tasks(&self) -> usize {
        self.pending.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    pub(crate) fn max_text_len(&self) -> usize {
        self.max_text_len
    }

    pub(crate) fn messages_mut(&mut self) -> &mut MessageList {
        &mut self.messages
    }

    pub(crate) fn channel(&self) -> Arc<dyn RemoteChannel> {
        Arc::clone(&self.channel)
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Track a fire-and-forget task so [`flush`](Self::flush) can await it.
    pub(crate) fn spawn_tracked<F>(&mut self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.reap_finished();
        self.pending.spawn(task);
    }

    /// Write the full current list to the cache in the background.
    ///
    /// Overlapping writes are last-write-wins; each one encodes the whole
    /// list as it is at spawn time.
    pub(crate) fn persist(&mut self) {
        let bytes = match encode_cache(&self.messages) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode message cache");
                return;
            }
        };
        let cache = Arc::clone(&self.cache);
        let key = self.cache_key.clone();
        let count = self.messages.len();

        self.spawn_tracked(async move {
            match cache.set(&key, bytes).await {
                Ok(()) => tracing::trace!(count, "Message cache updated"),
                Err(e) => tracing::warn!(error = %e, "Failed to write message cache"),
            }
        });
    }

    async fn attach(&mut self) {
        if !self.remote_sync {
            tracing::debug!("Remote sync disabled for this session");
            return;
        }
        if self.subscription.is_some() {
            tracing::debug!("Channel already attached");
            return;
        }

        match self.channel.subscribe(SnapshotQuery::newest_first()).await {
            Ok(subscription) => {
                tracing::info!(subscription = subscription.id(), "Attached remote channel");
                self.subscription = Some(subscription);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to attach remote channel, staying on cache");
                self.remote_live = false;
            }
        }
    }

    fn detach(&mut self) {
        self.remote_live = false;
        if let Some(subscription) = self.subscription.take() {
            tracing::info!(subscription = subscription.id(), "Detached remote channel");
            subscription.cancel();
        }
    }

    fn emit_mode_change(&self, previous: SyncMode) {
        let current = self.sync_mode();
        if current != previous {
            tracing::info!(mode = %current, "Sync mode changed");
            self.emit(SessionEvent::ModeChanged(current));
        }
    }

    fn reap_finished(&mut self) {
        while let Some(Some(result)) = self.pending.join_next().now_or_never() {
            log_join_error(result);
        }
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "Background task panicked");
        }
    }
}

impl std::fmt::Debug for SyncController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("session_name", &self.session_name)
            .field("messages", &self.messages.len())
            .field("connectivity", &self.connectivity)
            .field("mode", &self.sync_mode())
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
