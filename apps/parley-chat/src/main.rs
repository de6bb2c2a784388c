//! # Parley Chat
//!
//! A terminal chat screen built on the Parley SDK. Every device shares one
//! in-memory hosted collection but keeps its own cache and connectivity, so
//! you can take a device offline, keep typing, and watch what it shows.
//!
//! ## Screen model
//!
//! ```text
//! online + attached   →  "Connected - Real-time chat", list = latest snapshot
//! offline             →  "Offline - Showing cached messages", composer hidden
//! anything else       →  "Local Mode - Messages saved locally"
//! ```

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::*;
use parley_sdk::prelude::*;
use parley_sdk::{ChatView, GeoPoint, MemoryChannel, PickedImage, StatusBanner};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

type AppResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "parley-chat")]
#[command(about = "Offline-aware chat sessions on the Parley SDK")]
#[command(version)]
struct Cli {
    /// Print chat screens as JSON instead of boxes
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Basic demo: two devices chat in real time through the hosted collection
    Demo,
    /// Offline scenario: lose the connection, keep sending, come back
    Offline,
    /// Connectivity flapping: rapid online/offline changes on one device
    Flap {
        /// Number of connectivity changes
        #[arg(long, default_value_t = 6)]
        changes: usize,
    },
    /// Interactive REPL for manual experimentation
    Interactive,
}

// ─── Device: one client with its own cache, sharing the collection ─────────

struct Device {
    name: String,
    memory: MemoryBackend,
    client: Client,
    session: SessionHandle,
    events: broadcast::Receiver<SessionEvent>,
}

impl Device {
    async fn join(name: &str, channel: &Arc<MemoryChannel>) -> AppResult<Self> {
        let mut memory = MemoryBackend::new();
        memory.channel = channel.clone();
        let client = Client::new(memory.backend(), ChatConfig::default());
        let identity = client.start(name).await?;
        let session = client.open_session(&identity).await;
        let events = session.subscribe();
        Ok(Self {
            name: name.to_string(),
            memory,
            client,
            session,
            events,
        })
    }

    async fn set_online(&mut self, online: bool) -> AppResult {
        self.client.connectivity().report(Some(online));
        self.session.flush().await?;
        Ok(())
    }

    async fn say(&mut self, text: &str) -> AppResult {
        match self.session.send_text(text).await {
            Ok(_) => step(&format!("{}: \"{}\"", self.name, text)),
            Err(e) => refusal(&e),
        }
        self.session.flush().await?;
        Ok(())
    }

    /// Print notices raised since the last call.
    fn drain_notices(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let SessionEvent::Notice(notice) = event {
                show_notice(&self.name, &notice);
            }
        }
    }

    fn cached_bytes(&self) -> usize {
        self.memory
            .cache
            .peek(&self.client.config().cache_key)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    async fn leave(&self) {
        self.client.shutdown().await;
    }
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn step(text: &str) {
    println!("  {} {}", "•".bright_green(), text);
}

fn refusal(error: &SdkError) {
    println!("  {} {}", "!".bright_red(), error);
}

fn connectivity_arrow(device: &str, online: bool) {
    let (label, mark) = if online {
        ("──online──▶".bright_green(), "✓".bright_green())
    } else {
        ("──offline─▶".bright_red(), "✗".bright_red())
    };
    println!("  {} {} {}", device.bright_magenta(), label, mark);
}

fn show_notice(device: &str, notice: &Notice) {
    let tag = if notice.is_blocking() {
        "alert".bright_red().bold()
    } else {
        "toast".bright_yellow()
    };
    println!("  [{}] {} {}", tag, device.bright_magenta(), notice);
}

fn banner_text(banner: StatusBanner) -> ColoredString {
    match banner {
        StatusBanner::Connected => banner.text().bright_green(),
        StatusBanner::Offline => banner.text().bright_red(),
        StatusBanner::LocalMode => banner.text().bright_yellow(),
    }
}

fn show_view(view: &ChatView, json: bool) {
    if json {
        match serde_json::to_string_pretty(view) {
            Ok(text) => println!("{}", text),
            Err(e) => println!("  {} {}", "!".bright_red(), e),
        }
        return;
    }

    let border = "─".repeat(56);
    println!("  ┌{}┐", border);
    println!("  │ {:^54} │", view.title.bright_yellow().to_string());
    println!("  │ {:^54} │", banner_text(view.banner).to_string());
    println!("  ├{}┤", border);

    if view.messages.is_empty() {
        println!("  │ {:^54} │", "(no messages)".dimmed().to_string());
    }
    for msg in &view.messages {
        let who = if msg.is_mine { "me" } else { msg.author_name.as_str() };
        let body = match (&msg.image, &msg.location) {
            (Some(uri), _) => format!("[image] {}", uri),
            (_, Some(point)) => format!("[location] {:.4}, {:.4}", point.latitude, point.longitude),
            _ => msg.text.clone(),
        };
        let line = format!("{} {:>8}: {}", msg.time, who, body);
        let line: String = line.chars().take(54).collect();
        println!("  │ {:<54} │", line);
    }

    println!("  ├{}┤", border);
    let composer = if view.can_compose {
        "composer ready".bright_green().to_string()
    } else {
        "composer hidden".dimmed().to_string()
    };
    println!("  │ {:<54} │", composer);
    println!("  └{}┘", border);
}

fn agreement_result(a: &Device, b: &Device) {
    let ids = |d: &Device| -> Vec<String> {
        d.session
            .messages()
            .iter()
            .map(|m| m.id().to_string())
            .collect()
    };
    if ids(a) == ids(b) {
        println!(
            "\n  {} {}",
            "✓".bright_green().bold(),
            format!("{} and {} show the same list", a.name, b.name)
                .bright_green()
                .bold()
        );
    } else {
        println!(
            "\n  {} {}",
            "✗".bright_red().bold(),
            format!("{} and {} show different lists", a.name, b.name)
                .bright_red()
                .bold()
        );
    }
}

// ─── Demo ─────────────────────────────────────────────────────────────────

async fn run_demo(json: bool) -> AppResult {
    header("DEMO: Real-time chat through the hosted collection");
    let channel = Arc::new(MemoryChannel::default());

    section("Phase 1: Two devices start with connectivity unknown");
    let mut alice = Device::join("Alice", &channel).await?;
    let mut bob = Device::join("Bob", &channel).await?;
    show_view(&alice.session.view(), json);

    section("Phase 2: Both come online and attach");
    alice.set_online(true).await?;
    connectivity_arrow("Alice", true);
    bob.set_online(true).await?;
    connectivity_arrow("Bob", true);

    section("Phase 3: Conversation");
    alice.say("Hi Bob!").await?;
    bob.say("Hey Alice, how's it going?").await?;
    alice.say("Pretty good!").await?;
    // Snapshots fan out to the other session
    alice.session.flush().await?;
    bob.session.flush().await?;

    show_view(&alice.session.view(), json);
    show_view(&bob.session.view(), json);
    agreement_result(&alice, &bob);

    step(&format!("hosted collection holds {} messages", channel.len()));
    alice.leave().await;
    bob.leave().await;
    Ok(())
}

// ─── Offline ──────────────────────────────────────────────────────────────

async fn run_offline(json: bool) -> AppResult {
    header("OFFLINE: Losing the connection mid-conversation");
    let channel = Arc::new(MemoryChannel::default());

    let mut alice = Device::join("Alice", &channel).await?;
    let mut bob = Device::join("Bob", &channel).await?;
    alice.set_online(true).await?;
    bob.set_online(true).await?;
    alice.say("Leaving the office now").await?;
    bob.session.flush().await?;

    section("Phase 1: Alice goes offline");
    alice.set_online(false).await?;
    connectivity_arrow("Alice", false);
    alice.drain_notices();
    show_view(&alice.session.view(), json);

    section("Phase 2: Alice keeps sending, Bob keeps chatting");
    alice.say("On the train, no signal").await?;
    alice.say("").await?;
    bob.say("Let me know when you're home").await?;
    step(&format!(
        "Alice's cache holds {} bytes",
        alice.cached_bytes()
    ));
    show_view(&alice.session.view(), json);
    show_view(&bob.session.view(), json);

    section("Phase 3: Alice reconnects");
    alice.set_online(true).await?;
    connectivity_arrow("Alice", true);
    alice.session.flush().await?;
    show_view(&alice.session.view(), json);
    step("messages written offline stay on this device only");
    agreement_result(&alice, &bob);

    alice.leave().await;
    bob.leave().await;
    Ok(())
}

// ─── Flap ─────────────────────────────────────────────────────────────────

async fn run_flap(changes: usize, json: bool) -> AppResult {
    header("FLAP: Rapid connectivity changes on one device");
    let channel = Arc::new(MemoryChannel::default());
    let mut alice = Device::join("Alice", &channel).await?;

    section("Alternating online and offline");
    for i in 0..changes {
        let online = i % 2 == 0;
        alice.set_online(online).await?;
        connectivity_arrow("Alice", online);
        alice.say(&format!("message {}", i + 1)).await?;
    }
    alice.drain_notices();

    section("Final state");
    let state = alice.session.state();
    step(&format!("connectivity: {:?}", state.connectivity));
    step(&format!("mode: {:?}", state.mode));
    step(&format!(
        "subscriptions open on the collection: {}",
        channel.active_subscriptions()
    ));
    step(&format!("subscribe calls so far: {}", channel.subscribe_calls()));
    show_view(&alice.session.view(), json);

    alice.leave().await;
    step(&format!(
        "after close, subscriptions open: {}",
        channel.active_subscriptions()
    ));
    Ok(())
}

// ─── Interactive REPL ─────────────────────────────────────────────────────

async fn run_interactive(json: bool) -> AppResult {
    header("INTERACTIVE: Parley chat REPL");
    println!("  Commands:");
    println!("    {}  <name>            add a device", "join".bright_cyan());
    println!("    {}  <name> <text...>  send a message", "send".bright_cyan());
    println!("    {} / {} <name>     change connectivity", "online".bright_cyan(), "offline".bright_cyan());
    println!("    {} <name> <uri>       share a library image", "image".bright_cyan());
    println!("    {} <name> <lat> <lon>  share a location", "where".bright_cyan());
    println!("    {}  <name>            render the chat screen", "show".bright_cyan());
    println!("    {}  | {}            list devices / leave", "list".bright_cyan(), "quit".bright_cyan());
    println!();

    let channel = Arc::new(MemoryChannel::default());
    let mut devices: BTreeMap<String, Device> = BTreeMap::new();

    loop {
        print!("{}", "parley> ".bright_cyan().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() || input.is_empty() {
            break;
        }
        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        if parts[0] == "join" || parts[0] == "j" {
            match parts.get(1) {
                Some(name) if devices.contains_key(*name) => {
                    println!("  {} Device '{}' already exists", "!".bright_yellow(), name)
                }
                Some(name) => {
                    let device = Device::join(name, &channel).await?;
                    step(&format!("'{}' joined as {}", name, device.session.author().id));
                    devices.insert(name.to_string(), device);
                }
                None => println!("  {} Usage: join <name>", "!".bright_red()),
            }
            continue;
        }

        match parts[0] {
            "quit" | "exit" | "q" => {
                println!("  {}", "Goodbye!".dimmed());
                break;
            }
            "list" | "ls" => {
                if devices.is_empty() {
                    println!("  {}", "(no devices)".dimmed());
                }
                for device in devices.values() {
                    let view = device.session.view();
                    step(&format!(
                        "{}: {} messages, {}",
                        device.name,
                        view.messages.len(),
                        banner_text(view.banner)
                    ));
                }
                continue;
            }
            "help" | "h" | "?" => {
                println!("  join <n> | send <n> <text> | online <n> | offline <n>");
                println!("  image <n> <uri> | where <n> <lat> <lon> | show <n> | list | quit");
                continue;
            }
            _ => {}
        }

        let Some(device) = parts.get(1).and_then(|name| devices.get_mut(*name)) else {
            println!(
                "  {} Unknown command or device: '{}'. Type 'help'",
                "?".bright_yellow(),
                input.trim()
            );
            continue;
        };

        match parts[0] {
            "send" | "s" => {
                let text = parts[2..].join(" ");
                device.say(&text).await?;
            }
            "online" | "on" => {
                device.set_online(true).await?;
                connectivity_arrow(&device.name, true);
            }
            "offline" | "off" => {
                device.set_online(false).await?;
                connectivity_arrow(&device.name, false);
            }
            "image" | "img" => {
                let Some(uri) = parts.get(2) else {
                    println!("  {} Usage: image <name> <uri>", "!".bright_red());
                    continue;
                };
                device
                    .memory
                    .device
                    .queue_library_image(PickedImage::new(*uri, uri.as_bytes().to_vec()));
                match device.session.share(DeviceAction::ChooseFromLibrary).await {
                    Ok(Some(_)) => step(&format!("{} shared an image", device.name)),
                    Ok(None) => step("picker dismissed"),
                    Err(e) => refusal(&e),
                }
                device.session.flush().await?;
            }
            "where" | "loc" => {
                let coords = parts
                    .get(2)
                    .zip(parts.get(3))
                    .and_then(|(lat, lon)| Some((lat.parse::<f64>().ok()?, lon.parse::<f64>().ok()?)));
                let Some((lat, lon)) = coords else {
                    println!("  {} Usage: where <name> <lat> <lon>", "!".bright_red());
                    continue;
                };
                device.memory.device.set_location(GeoPoint::new(lat, lon));
                match device.session.share(DeviceAction::ShareLocation).await {
                    Ok(_) => step(&format!("{} shared a location", device.name)),
                    Err(e) => refusal(&e),
                }
                device.session.flush().await?;
            }
            "show" => show_view(&device.session.view(), json),
            other => {
                println!("  {} Unknown command '{}'. Type 'help'", "?".bright_yellow(), other);
            }
        }
        device.drain_notices();
    }

    for device in devices.values() {
        device.leave().await;
    }
    Ok(())
}

// ─── Entry point ───────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> AppResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo => run_demo(cli.json).await,
        Commands::Offline => run_offline(cli.json).await,
        Commands::Flap { changes } => run_flap(changes, cli.json).await,
        Commands::Interactive => run_interactive(cli.json).await,
    }
}
