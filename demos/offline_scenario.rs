//! Offline Scenario Example
//!
//! Walks one chat session through startup, going online, losing the
//! connection and sending while offline, printing the screen at each step.
//!
//! Run with: cargo run --example offline_scenario

use chrono::{Duration, Utc};
use parley_sdk::prelude::*;
use parley_sdk::{ChatView, RemoteChannel};
use parley_core::RemoteRecord;
use tracing_subscriber::EnvFilter;

fn print_view(view: &ChatView) {
    println!("┌─ {} ─ {}", view.title, view.banner);
    for msg in &view.messages {
        let who = if msg.is_mine { "me".to_string() } else { msg.author_name.clone() };
        println!("│ [{}] {}: {}", msg.time, who, msg.text);
    }
    println!("└─ composer {}\n", if view.can_compose { "enabled" } else { "hidden" });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_sdk=debug")),
        )
        .init();

    println!("=== Offline Scenario Example ===\n");

    let memory = MemoryBackend::new();

    // Someone else has already been chatting
    for (i, text) in ["Anyone around?", "Meeting moved to 3pm", "Thanks!"].iter().enumerate() {
        memory
            .channel
            .publish(RemoteRecord {
                text: text.to_string(),
                created_at: Some(Utc::now() - Duration::minutes(10 - i as i64)),
                user: Some("Bob".into()),
                user_id: Some("bob".into()),
                image: None,
                location: None,
            })
            .await?;
    }

    let client = Client::new(memory.backend(), ChatConfig::from_env());
    let identity = client.start("Alice").await?;
    let session = client.open_session(&identity).await;

    // === Phase 1: connectivity not yet known ===
    println!("=== Phase 1: Startup ===\n");
    print_view(&session.view());

    // === Phase 2: online ===
    println!("=== Phase 2: Online ===\n");
    client.connectivity().report(Some(true));
    session.flush().await?;
    print_view(&session.view());

    // === Phase 3: connection lost ===
    println!("=== Phase 3: Connection Lost ===\n");
    let mut events = session.subscribe();
    client.connectivity().report(Some(false));
    session.flush().await?;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Notice(notice) = event {
            println!("! {}\n", notice);
        }
    }
    print_view(&session.view());

    // === Phase 4: send while offline ===
    println!("=== Phase 4: Send While Offline ===\n");
    session.send_text("hi").await?;
    session.flush().await?;
    print_view(&session.view());

    let cached = memory.cache.peek(&client.config().cache_key).unwrap_or_default();
    println!("Cache holds {} bytes; hosted collection holds {} messages", cached.len(), memory.channel.len());

    client.shutdown().await;
    println!("\n=== Example Complete ===");
    Ok(())
}
