//! Remote message channel abstractions.
//!
//! A [`RemoteChannel`] is a hosted document collection that pushes full
//! snapshots of its content to every live [`Subscription`]. Delivery stops
//! only when the subscription is cancelled or dropped.

use crate::error::ChannelError;
use async_trait::async_trait;
use parking_lot::RwLock;
use parley_core::{RemoteDocument, RemoteRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use ulid::Ulid;

/// Sort direction of a snapshot query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordering requested for snapshot deliveries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotQuery {
    pub order_by: String,
    pub direction: Direction,
}

impl SnapshotQuery {
    /// Newest messages first, by creation time.
    pub fn newest_first() -> Self {
        Self {
            order_by: "createdAt".to_string(),
            direction: Direction::Descending,
        }
    }
}

impl Default for SnapshotQuery {
    fn default() -> Self {
        Self::newest_first()
    }
}

/// Something pushed to a subscriber.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    /// The complete, ordered collection content.
    Snapshot(Vec<RemoteDocument>),
    /// The listener failed; no further events follow.
    Error(ChannelError),
}

type Canceller = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a live subscription.
///
/// Cancelling (or dropping) the handle is the only way to stop delivery.
pub struct Subscription {
    id: u64,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    canceller: Option<Canceller>,
}

impl Subscription {
    pub fn new(
        id: u64,
        events: mpsc::UnboundedReceiver<ChannelEvent>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            events,
            canceller: Some(Box::new(on_cancel)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the next event. `None` means the channel went away.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Take an already delivered event without waiting.
    pub fn try_next_event(&mut self) -> Option<ChannelEvent> {
        self.events.try_recv().ok()
    }

    /// Stop delivery and release the listener.
    pub fn cancel(mut self) {
        self.release();
    }

    pub fn is_cancelled(&self) -> bool {
        self.canceller.is_none()
    }

    fn release(&mut self) {
        if let Some(cancel) = self.canceller.take() {
            cancel();
            self.events.close();
            tracing::debug!(subscription = self.id, "Subscription released");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Hosted message collection.
#[async_trait]
pub trait RemoteChannel: Send + Sync + 'static {
    /// Start a live listener. The current content is delivered first.
    async fn subscribe(&self, query: SnapshotQuery) -> Result<Subscription, ChannelError>;

    /// Store a record, returning the backend-assigned document id.
    async fn publish(&self, record: RemoteRecord) -> Result<String, ChannelError>;
}

struct Listener {
    query: SnapshotQuery,
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

#[derive(Default)]
struct CollectionState {
    documents: Vec<RemoteDocument>,
    listeners: HashMap<u64, Listener>,
    next_listener: u64,
}

impl CollectionState {
    fn ordered(&self, query: &SnapshotQuery) -> Vec<RemoteDocument> {
        let mut docs = self.documents.clone();
        // Stable sort keeps insertion order for equal timestamps
        docs.sort_by(|a, b| a.created_at().cmp(&b.created_at()));
        if query.direction == Direction::Descending {
            docs.reverse();
        }
        docs
    }

    fn broadcast(&mut self) {
        let mut closed = Vec::new();
        for (id, listener) in &self.listeners {
            let snapshot = self.ordered(&listener.query);
            if listener.tx.send(ChannelEvent::Snapshot(snapshot)).is_err() {
                closed.push(*id);
            }
        }
        for id in closed {
            self.listeners.remove(&id);
        }
    }
}

/// In-memory hosted collection for testing and simulation.
///
/// Every publish fans a fresh snapshot out to all listeners. Subscribe and
/// publish can be forced to fail, and listener errors can be injected.
pub struct MemoryChannel {
    collection: String,
    state: Arc<RwLock<CollectionState>>,
    fail_subscribe: AtomicBool,
    fail_publish: AtomicBool,
    subscribe_calls: AtomicUsize,
}

impl MemoryChannel {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            state: Arc::new(RwLock::new(CollectionState::default())),
            fail_subscribe: AtomicBool::new(false),
            fail_publish: AtomicBool::new(false),
            subscribe_calls: AtomicUsize::new(0),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Insert documents without going through publish, then notify listeners.
    pub fn seed(&self, documents: impl IntoIterator<Item = RemoteDocument>) {
        let mut state = self.state.write();
        state.documents.extend(documents);
        state.broadcast();
    }

    /// Re-deliver the current content to every listener.
    pub fn redeliver(&self) {
        self.state.write().broadcast();
    }

    /// Fail every live listener. Failed listeners are removed.
    pub fn inject_error(&self, error: ChannelError) {
        let mut state = self.state.write();
        for (_, listener) in state.listeners.drain() {
            let _ = listener.tx.send(ChannelEvent::Error(error.clone()));
        }
    }

    /// Number of live listeners.
    pub fn active_subscriptions(&self) -> usize {
        self.state.read().listeners.len()
    }

    /// Total subscribe attempts, including failed ones.
    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Stored documents, newest first.
    pub fn documents(&self) -> Vec<RemoteDocument> {
        self.state.read().ordered(&SnapshotQuery::newest_first())
    }

    pub fn len(&self) -> usize {
        self.state.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_COLLECTION)
    }
}

fn remove_listener(state: &Weak<RwLock<CollectionState>>, id: u64) {
    if let Some(state) = state.upgrade() {
        state.write().listeners.remove(&id);
    }
}

#[async_trait]
impl RemoteChannel for MemoryChannel {
    async fn subscribe(&self, query: SnapshotQuery) -> Result<Subscription, ChannelError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(ChannelError::SubscriptionFailed(format!(
                "collection '{}' unavailable",
                self.collection
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut state = self.state.write();
            let id = state.next_listener;
            state.next_listener += 1;

            let initial = state.ordered(&query);
            // The receiver is alive, so this cannot fail
            let _ = tx.send(ChannelEvent::Snapshot(initial));
            state.listeners.insert(id, Listener { query, tx });
            id
        };

        let weak = Arc::downgrade(&self.state);
        Ok(Subscription::new(id, rx, move || remove_listener(&weak, id)))
    }

    async fn publish(&self, record: RemoteRecord) -> Result<String, ChannelError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(ChannelError::PublishFailed(format!(
                "collection '{}' rejected write",
                self.collection
            )));
        }

        let id = Ulid::new().to_string();
        let mut state = self.state.write();
        state.documents.push(RemoteDocument::new(id.clone(), record));
        state.broadcast();
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(text: &str, offset_secs: i64) -> RemoteRecord {
        RemoteRecord {
            text: text.to_string(),
            created_at: Some(Utc::now() + Duration::seconds(offset_secs)),
            user: Some("Alice".into()),
            user_id: Some("u1".into()),
            image: None,
            location: None,
        }
    }

    fn texts(event: Option<ChannelEvent>) -> Vec<String> {
        match event {
            Some(ChannelEvent::Snapshot(docs)) => {
                docs.into_iter().map(|d| d.record.text).collect()
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_newest_first() {
        let channel = MemoryChannel::default();
        channel.seed(vec![
            RemoteDocument::new("a", record("old", -10)),
            RemoteDocument::new("b", record("new", 0)),
        ]);

        let mut sub = channel.subscribe(SnapshotQuery::newest_first()).await.unwrap();
        assert_eq!(texts(sub.next_event().await), vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_publish_fans_out_full_snapshot() {
        let channel = MemoryChannel::default();
        let mut sub1 = channel.subscribe(SnapshotQuery::default()).await.unwrap();
        let mut sub2 = channel.subscribe(SnapshotQuery::default()).await.unwrap();
        let _ = sub1.next_event().await;
        let _ = sub2.next_event().await;

        channel.publish(record("first", 0)).await.unwrap();
        channel.publish(record("second", 1)).await.unwrap();

        let _ = sub1.next_event().await;
        assert_eq!(texts(sub1.next_event().await), vec!["second", "first"]);
        let _ = sub2.next_event().await;
        assert_eq!(texts(sub2.next_event().await), vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery() {
        let channel = MemoryChannel::default();
        let sub = channel.subscribe(SnapshotQuery::default()).await.unwrap();
        assert_eq!(channel.active_subscriptions(), 1);

        sub.cancel();
        assert_eq!(channel.active_subscriptions(), 0);

        // Publishing with no listeners is fine
        channel.publish(record("later", 0)).await.unwrap();
        assert_eq!(channel.len(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_listener() {
        let channel = MemoryChannel::default();
        {
            let _sub = channel.subscribe(SnapshotQuery::default()).await.unwrap();
            assert_eq!(channel.active_subscriptions(), 1);
        }
        assert_eq!(channel.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let channel = MemoryChannel::default();

        channel.set_fail_subscribe(true);
        assert!(matches!(
            channel.subscribe(SnapshotQuery::default()).await,
            Err(ChannelError::SubscriptionFailed(_))
        ));
        assert_eq!(channel.subscribe_calls(), 1);

        channel.set_fail_publish(true);
        assert!(matches!(
            channel.publish(record("x", 0)).await,
            Err(ChannelError::PublishFailed(_))
        ));
        assert!(channel.is_empty());
    }

    #[tokio::test]
    async fn test_inject_error_ends_listeners() {
        let channel = MemoryChannel::default();
        let mut sub = channel.subscribe(SnapshotQuery::default()).await.unwrap();
        let _ = sub.next_event().await;

        channel.inject_error(ChannelError::Listener("permission revoked".into()));

        assert_eq!(
            sub.next_event().await,
            Some(ChannelEvent::Error(ChannelError::Listener(
                "permission revoked".into()
            )))
        );
        assert_eq!(sub.next_event().await, None);
        assert_eq!(channel.active_subscriptions(), 0);
    }
}
