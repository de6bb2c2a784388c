//! End-to-end tests for offline-aware synchronization
//!
//! These drive full sessions through the client against the in-memory
//! backend: cache loading, connectivity flapping, optimistic sends and
//! teardown.

use chrono::{Duration, Utc};
use parley_core::{decode_cache, encode_cache, RemoteDocument, RemoteRecord};
use parley_sdk::prelude::*;
use parley_sdk::{
    CacheStore, ChannelEvent, ChatConfig, DeviceCapability, MessageList, PickedImage,
    SyncController,
};
use proptest::prelude::*;
use std::sync::Arc;

fn remote_doc(id: &str, text: &str, user: &str, age_secs: i64) -> RemoteDocument {
    RemoteDocument::new(
        id,
        RemoteRecord {
            text: text.to_string(),
            created_at: Some(Utc::now() - Duration::seconds(age_secs)),
            user: Some(user.to_string()),
            user_id: Some(format!("id-{}", user.to_lowercase())),
            image: None,
            location: None,
        },
    )
}

fn texts(list: &MessageList) -> Vec<String> {
    list.iter().map(|m| m.text().to_string()).collect()
}

fn cached(memory: &MemoryBackend) -> MessageList {
    let bytes = memory.cache.peek("messages").expect("cache slot written");
    decode_cache(&bytes, Utc::now()).unwrap().messages
}

fn drain_notices(events: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Notice(notice) = event {
            notices.push(notice);
        }
    }
    notices
}

async fn start(memory: &MemoryBackend) -> (Client, SessionHandle) {
    let client = Client::new(memory.backend(), ChatConfig::default());
    let identity = client.start("Alice").await.unwrap();
    let session = client.open_session(&identity).await;
    (client, session)
}

// ============================================================================
// Full Scenario
// ============================================================================

#[tokio::test]
async fn test_offline_scenario_end_to_end() {
    let memory = MemoryBackend::new();
    memory.channel.seed(vec![
        remote_doc("m1", "first", "Bob", 30),
        remote_doc("m2", "second", "Carol", 20),
        remote_doc("m3", "third", "Bob", 10),
    ]);

    // Connectivity is still unknown when the session opens
    let (client, session) = start(&memory).await;
    let mut events = session.subscribe();
    let welcome = session.messages();
    assert_eq!(welcome.len(), 1);
    assert_eq!(welcome.first().unwrap().author().name, "System");
    assert_eq!(memory.channel.subscribe_calls(), 0);

    // Online: attach and take the snapshot
    client.connectivity().report(Some(true));
    session.flush().await.unwrap();
    assert_eq!(memory.channel.active_subscriptions(), 1);
    assert_eq!(session.sync_mode(), SyncMode::RemoteLive);
    assert_eq!(texts(&session.messages()), vec!["third", "second", "first"]);
    assert_eq!(cached(&memory), session.messages());
    assert_eq!(session.view().banner.text(), "Connected - Real-time chat");

    // Offline: detach, notify, keep the list
    client.connectivity().report(Some(false));
    session.flush().await.unwrap();
    assert_eq!(memory.channel.active_subscriptions(), 0);
    assert_eq!(session.sync_mode(), SyncMode::CacheFallback);
    assert_eq!(texts(&session.messages()), vec!["third", "second", "first"]);
    assert_eq!(drain_notices(&mut events), vec![Notice::connection_lost()]);
    assert!(!session.view().can_compose);

    // Send while offline: optimistic append plus a cache write
    let sent = session.send_text("hi").await.unwrap();
    assert_eq!(session.messages().first(), Some(&sent));
    session.flush().await.unwrap();

    let list = session.messages();
    assert_eq!(texts(&list), vec!["hi", "third", "second", "first"]);
    assert_eq!(cached(&memory), list);
    assert_eq!(memory.channel.len(), 3);

    client.shutdown().await;
}

// ============================================================================
// Initialization
// ============================================================================

#[tokio::test]
async fn test_initialize_loads_cache_exactly() {
    let memory = MemoryBackend::new();
    let stored: MessageList = vec![
        Message::compose(
            parley_sdk::Author::new("u2", "Bob"),
            Payload::image("https://media/x.jpg"),
        ),
        Message::compose(parley_sdk::Author::new("u1", "Alice"), Payload::text("earlier")),
    ]
    .into();
    memory
        .cache
        .set("messages", encode_cache(&stored).unwrap())
        .await
        .unwrap();

    let (client, session) = start(&memory).await;
    assert_eq!(session.messages(), stored);
    client.shutdown().await;
}

#[tokio::test]
async fn test_initialize_normalizes_sparse_cache_entries() {
    let memory = MemoryBackend::new();
    let blob = br#"[{"_id":"a","createdAt":"2024-01-01T00:00:00Z"},{"_id":"b","text":"ok","user":{"_id":"u9"}}]"#;
    memory.cache.set("messages", blob.to_vec()).await.unwrap();

    let (client, session) = start(&memory).await;
    let list = session.messages();
    let msgs = list.as_slice();

    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].text(), "");
    assert_eq!(msgs[0].author().id, "unknown");
    assert_eq!(msgs[1].author().id, "u9");
    assert_eq!(msgs[1].author().name, "Anonymous");
    client.shutdown().await;
}

#[tokio::test]
async fn test_blank_media_captions_survive_reload() {
    let memory = MemoryBackend::new();
    let (client, session) = start(&memory).await;

    session
        .send(Payload::Image {
            uri: "https://media/y.jpg".into(),
            caption: Some(String::new()),
        })
        .await
        .unwrap();
    session
        .send(Payload::Location {
            point: parley_sdk::GeoPoint::new(10.5, -3.25),
            caption: Some(String::new()),
        })
        .await
        .unwrap();
    session.flush().await.unwrap();

    assert_eq!(cached(&memory), session.messages());
    client.shutdown().await;

    let (client, reopened) = start(&memory).await;
    assert_eq!(reopened.messages(), session.messages());
    client.shutdown().await;
}

#[tokio::test]
async fn test_unreadable_cache_falls_back_to_welcome() {
    let memory = MemoryBackend::new();
    memory.cache.set("messages", b"\"oops\"".to_vec()).await.unwrap();

    let (client, session) = start(&memory).await;
    let list = session.messages();
    assert_eq!(list.len(), 1);
    assert_eq!(
        list.first().unwrap().text(),
        "Hello Alice! Welcome to the chat!"
    );
    client.shutdown().await;
}

// ============================================================================
// Send Pipeline
// ============================================================================

#[tokio::test]
async fn test_send_is_first_even_when_publish_fails() {
    let memory = MemoryBackend::new();
    let (client, session) = start(&memory).await;
    let mut events = session.subscribe();

    client.connectivity().report(Some(true));
    session.flush().await.unwrap();
    assert!(session.sync_mode().is_live());

    memory.channel.set_fail_publish(true);
    let sent = session.send_text("unlucky").await.unwrap();
    assert_eq!(session.messages().first(), Some(&sent));

    session.flush().await.unwrap();
    assert_eq!(session.messages().first(), Some(&sent));
    assert!(memory.channel.is_empty());
    assert!(drain_notices(&mut events).contains(&Notice::send_failed()));

    client.shutdown().await;
}

#[tokio::test]
async fn test_live_send_round_trips_through_channel() {
    let memory = MemoryBackend::new();
    let (client, session) = start(&memory).await;
    client.connectivity().report(Some(true));
    session.flush().await.unwrap();

    session.send_text("over the wire").await.unwrap();
    session.flush().await.unwrap();

    assert_eq!(memory.channel.len(), 1);
    let doc = &memory.channel.documents()[0];
    assert_eq!(doc.record.user.as_deref(), Some("Alice"));
    assert_eq!(texts(&session.messages()), vec!["over the wire"]);
    // The snapshot echo was mirrored to the cache
    assert_eq!(texts(&cached(&memory)), vec!["over the wire"]);

    client.shutdown().await;
}

#[tokio::test]
async fn test_rejected_input_never_reaches_list() {
    let memory = MemoryBackend::new();
    let (client, session) = start(&memory).await;

    assert!(matches!(
        session.send_text("   ").await,
        Err(SdkError::EmptyMessage)
    ));
    assert!(matches!(
        session.send_text("a".repeat(501)).await,
        Err(SdkError::MessageTooLong { .. })
    ));
    assert_eq!(session.messages().len(), 1);
    client.shutdown().await;
}

// ============================================================================
// Snapshots and Teardown
// ============================================================================

#[tokio::test]
async fn test_repeated_snapshot_does_not_duplicate() {
    let memory = MemoryBackend::new();
    memory.channel.seed(vec![
        remote_doc("a", "one", "Bob", 5),
        remote_doc("b", "two", "Bob", 1),
    ]);
    let (client, session) = start(&memory).await;
    client.connectivity().report(Some(true));
    session.flush().await.unwrap();
    let first = session.messages();

    memory.channel.redeliver();
    memory.channel.redeliver();
    session.flush().await.unwrap();

    assert_eq!(session.messages(), first);
    assert_eq!(first.len(), 2);
    client.shutdown().await;
}

#[tokio::test]
async fn test_late_snapshot_after_teardown_has_no_effect() {
    let memory = MemoryBackend::new();
    let mut controller = SyncController::new(
        memory.cache.clone(),
        memory.channel.clone(),
        &ChatConfig::default(),
    );
    controller.initialize("Alice").await;
    controller
        .on_connectivity_change(ConnectivityState::Online)
        .await;
    controller.drain_channel();
    controller.flush().await;

    let before = controller.messages().clone();
    let writes = memory.cache.write_count();

    controller.teardown();
    assert_eq!(memory.channel.active_subscriptions(), 0);

    controller.handle_channel_event(ChannelEvent::Snapshot(vec![remote_doc(
        "late", "late", "Bob", 0,
    )]));
    controller.flush().await;

    assert_eq!(controller.messages(), &before);
    assert_eq!(memory.cache.write_count(), writes);
}

#[tokio::test]
async fn test_close_is_exactly_once() {
    let memory = MemoryBackend::new();
    let (client, session) = start(&memory).await;
    client.connectivity().report(Some(true));
    session.flush().await.unwrap();
    assert_eq!(memory.channel.active_subscriptions(), 1);

    session.close().await.unwrap();
    assert_eq!(memory.channel.active_subscriptions(), 0);
    assert!(session.state().closed);

    assert!(matches!(session.close().await, Err(SdkError::SessionClosed)));
    assert!(matches!(
        session.send_text("after").await,
        Err(SdkError::SessionClosed)
    ));
}

#[tokio::test]
async fn test_channel_error_needs_fresh_transition() {
    let memory = MemoryBackend::new();
    let (client, session) = start(&memory).await;
    client.connectivity().report(Some(true));
    session.flush().await.unwrap();

    memory
        .channel
        .inject_error(parley_sdk::ChannelError::Listener("revoked".into()));
    session.flush().await.unwrap();
    assert_eq!(session.sync_mode(), SyncMode::CacheFallback);
    assert_eq!(memory.channel.subscribe_calls(), 1);

    // Still online as far as the session knows, so nothing reattaches
    client.connectivity().report(Some(true));
    session.flush().await.unwrap();
    assert_eq!(memory.channel.subscribe_calls(), 1);

    client.connectivity().report(Some(false));
    session.flush().await.unwrap();
    client.connectivity().report(Some(true));
    session.flush().await.unwrap();
    assert_eq!(memory.channel.subscribe_calls(), 2);
    assert_eq!(session.sync_mode(), SyncMode::RemoteLive);

    client.shutdown().await;
}

#[tokio::test]
async fn test_back_to_back_flap_reattaches_after_channel_error() {
    let memory = MemoryBackend::new();
    let (client, session) = start(&memory).await;
    let mut events = session.subscribe();
    client.connectivity().report(Some(true));
    session.flush().await.unwrap();

    memory
        .channel
        .inject_error(parley_sdk::ChannelError::Listener("revoked".into()));
    session.flush().await.unwrap();
    assert_eq!(session.sync_mode(), SyncMode::CacheFallback);

    // Both readings land before the session task runs
    client.connectivity().report(Some(false));
    client.connectivity().report(Some(true));
    session.flush().await.unwrap();

    let offline_notices = drain_notices(&mut events)
        .into_iter()
        .filter(|n| *n == Notice::connection_lost())
        .count();
    assert_eq!(offline_notices, 1);
    assert_eq!(memory.channel.subscribe_calls(), 2);
    assert_eq!(memory.channel.active_subscriptions(), 1);
    assert_eq!(session.sync_mode(), SyncMode::RemoteLive);

    client.shutdown().await;
}

#[tokio::test]
async fn test_back_to_back_flap_runs_offline_entry_action() {
    let memory = MemoryBackend::new();
    memory
        .channel
        .seed(vec![remote_doc("r1", "from bob", "Bob", 5)]);
    let (client, session) = start(&memory).await;
    let mut events = session.subscribe();
    client.connectivity().report(Some(true));
    session.flush().await.unwrap();
    assert_eq!(memory.channel.subscribe_calls(), 1);

    client.connectivity().report(Some(false));
    client.connectivity().report(Some(true));
    session.flush().await.unwrap();

    // Detached on the way down, attached again on the way up
    assert_eq!(memory.channel.subscribe_calls(), 2);
    assert_eq!(memory.channel.active_subscriptions(), 1);
    assert!(drain_notices(&mut events).contains(&Notice::connection_lost()));
    assert_eq!(texts(&session.messages()), vec!["from bob"]);

    client.shutdown().await;
}

// ============================================================================
// Media Sharing
// ============================================================================

#[tokio::test]
async fn test_share_image_and_location() {
    let memory = MemoryBackend::new();
    let (client, session) = start(&memory).await;

    memory
        .device
        .queue_library_image(PickedImage::new("file:///roll/beach.jpg", vec![7; 16]));
    let sent = session
        .share(DeviceAction::ChooseFromLibrary)
        .await
        .unwrap()
        .unwrap();
    assert!(sent.payload().image_uri().unwrap().ends_with("_beach.jpg"));
    assert_eq!(memory.media.paths().len(), 1);

    memory
        .device
        .set_location(parley_sdk::GeoPoint::new(48.5, 2.25));
    let sent = session
        .share(DeviceAction::ShareLocation)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.messages().first(), Some(&sent));
    assert_eq!(session.view().messages[0].location.unwrap().latitude, 48.5);

    client.shutdown().await;
}

#[tokio::test]
async fn test_share_denied_shows_notice() {
    let memory = MemoryBackend::new();
    let (client, session) = start(&memory).await;
    let mut events = session.subscribe();
    memory.device.deny(DeviceCapability::Location);

    let err = session.share(DeviceAction::ShareLocation).await.unwrap_err();
    assert!(matches!(
        err,
        SdkError::PermissionDenied(DeviceCapability::Location)
    ));

    let notices = drain_notices(&mut events);
    assert_eq!(notices.len(), 1);
    assert!(notices[0].is_blocking());
    assert_eq!(notices[0].body, "Location permissions haven't been granted.");
    assert_eq!(session.messages().len(), 1);

    client.shutdown().await;
}

// ============================================================================
// Connectivity Properties
// ============================================================================

fn reading() -> impl Strategy<Value = Option<bool>> {
    prop_oneof![Just(None), Just(Some(true)), Just(Some(false))]
}

proptest! {
    #[test]
    fn ending_offline_always_detaches(mut readings in prop::collection::vec(reading(), 0..12)) {
        readings.push(Some(false));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let memory = MemoryBackend::new();
            let mut controller = SyncController::new(
                memory.cache.clone(),
                memory.channel.clone(),
                &ChatConfig::default(),
            );
            controller.initialize("Alice").await;

            for reading in readings {
                let state = ConnectivityState::from_reachability(reading);
                controller.on_connectivity_change(state).await;
                controller.drain_channel();
                prop_assert!(memory.channel.active_subscriptions() <= 1);
            }

            prop_assert_eq!(controller.sync_mode(), SyncMode::CacheFallback);
            prop_assert!(!controller.has_subscription());
            prop_assert_eq!(memory.channel.active_subscriptions(), 0);
            controller.flush().await;
            Ok(())
        })?;
    }
}

#[tokio::test]
async fn test_controller_accepts_trait_objects() {
    let cache: Arc<dyn CacheStore> = Arc::new(parley_sdk::MemoryCacheStore::new());
    let channel: Arc<dyn parley_sdk::RemoteChannel> = Arc::new(parley_sdk::MemoryChannel::default());
    let mut controller = SyncController::new(cache, channel, &ChatConfig::default());
    controller.initialize("").await;
    assert_eq!(
        controller.messages().first().unwrap().text(),
        "Hello User! Welcome to the chat!"
    );
}
