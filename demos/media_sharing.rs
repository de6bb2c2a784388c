//! Media Sharing Example
//!
//! Shares a photo and a location through the attachment sheet, then shows
//! what happens when the user has denied a permission.
//!
//! Run with: cargo run --example media_sharing

use parley_sdk::prelude::*;
use parley_sdk::{DeviceCapability, GeoPoint, PickedImage};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_sdk=debug")),
        )
        .init();

    println!("=== Media Sharing Example ===\n");

    let memory = MemoryBackend::new();
    let client = Client::new(memory.backend(), ChatConfig::default());
    let identity = client.start("Alice").await?;
    let session = client.open_session(&identity).await;
    let mut events = session.subscribe();

    client.connectivity().report(Some(true));
    session.flush().await?;

    println!("Attachment sheet:");
    for action in DeviceAction::ALL {
        println!("  - {}", action.label());
    }
    println!();

    // Photo from the library
    memory
        .device
        .queue_library_image(PickedImage::new("file:///DCIM/sunset.jpg", vec![0xFF; 2048]));
    if let Some(msg) = session.share(DeviceAction::ChooseFromLibrary).await? {
        println!("Shared image: {}", msg.payload().image_uri().unwrap_or("-"));
    }

    // Current position
    memory.device.set_location(GeoPoint::new(52.5, 13.375));
    if let Some(msg) = session.share(DeviceAction::ShareLocation).await? {
        if let Some(point) = msg.payload().geo_point() {
            println!("Shared location: {}, {}", point.latitude, point.longitude);
        }
    }

    // The picker was dismissed
    let cancelled = session.share(DeviceAction::TakePhoto).await?;
    println!("Camera dismissed, sent: {}", cancelled.is_some());

    // Permission denied
    memory.device.deny(DeviceCapability::Camera);
    if let Err(e) = session.share(DeviceAction::TakePhoto).await {
        println!("Camera failed: {}", e);
    }
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Notice(notice) = event {
            println!("! {}", notice);
        }
    }

    session.flush().await?;
    println!("\nUploaded objects:");
    for path in memory.media.paths() {
        println!("  {}", path);
    }
    println!("Hosted collection holds {} messages", memory.channel.len());

    client.shutdown().await;
    println!("\n=== Example Complete ===");
    Ok(())
}
