//! proxchat demo binary
//!
//! Brings up two endpoints on an in-memory virtual radio and walks the
//! whole lifecycle the library is built around: register server →
//! advertise → scan → connect → exchange → shut down. The remote endpoint
//! echoes whatever it receives; the local transcript is printed the way a
//! consumer would render its chat log.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use proxchat_core::link::Radio;
use proxchat_core::{
    Advertiser, ChatConfig, ChatLog, MessageOrigin, PeerIdentity, ScanState, Scanner,
    SessionManager,
};
use proxchat_virtual::VirtualAir;

use crate::cli::Cli;

struct Endpoint {
    radio: Arc<dyn Radio>,
    session: Arc<SessionManager>,
    advertiser: Advertiser,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let air = VirtualAir::new();
    let scan_window = Duration::from_secs(cli.scan_window);

    let mut local = bring_up(&air, "aa:00:00:01", &cli.name, scan_window).await?;
    let mut remote = bring_up(&air, "bb:00:00:02", &cli.peer, scan_window).await?;

    // the remote endpoint echoes every message it receives
    let echo = {
        let session = Arc::clone(&remote.session);
        tokio::spawn(async move {
            let mut inbox = session.messages();
            while let Ok(message) = inbox.recv().await {
                if message.origin == MessageOrigin::Remote {
                    let reply = format!("echo: {}", message.text);
                    let _ = session.send_message(&reply).await;
                }
            }
        })
    };

    // discover the peer
    let config = ChatConfig::new()
        .with_device_name(cli.name.clone())
        .with_scan_window(scan_window);
    let mut scanner = Scanner::new(Arc::clone(&local.radio), &config);
    let mut scan_state = scanner.state();
    scanner.start_scan().await;
    println!("scanning for peers ({}s window)...", cli.scan_window);

    let peers: Vec<PeerIdentity> = {
        let state = scan_state
            .wait_for(|s| matches!(s, ScanState::Results(m) if !m.is_empty()))
            .await
            .context("scan state channel closed")?;
        match &*state {
            ScanState::Results(map) => map.values().cloned().collect(),
            _ => Vec::new(),
        }
    };
    scanner.stop_scan();

    let peer = peers
        .first()
        .cloned()
        .context("no peers discovered")?;
    println!("discovered {} at {}", peer.label(), peer.address);

    // connect and wait for the link to come up
    let mut connection = local.session.connection();
    local.session.connect(peer.clone());
    connection
        .wait_for(|c| c.is_connected())
        .await
        .context("connection state channel closed")?;
    println!("connected to {}", peer.label());

    // one round trip: our message plus the peer's echo
    let mut inbox = local.session.messages();
    if !local.session.send_message(&cli.message).await {
        anyhow::bail!("message was not dispatched");
    }

    let mut log = ChatLog::new();
    while log.len() < 2 {
        match tokio::time::timeout(Duration::from_secs(5), inbox.recv()).await {
            Ok(Ok(message)) => log.push(message),
            Ok(Err(_)) => break,
            Err(_) => anyhow::bail!("timed out waiting for the exchange"),
        }
    }

    println!();
    for message in log.entries() {
        let tag = match message.origin {
            MessageOrigin::Local => "you",
            MessageOrigin::Remote => peer.label(),
        };
        println!("  [{tag}] {}", message.text);
    }
    println!();

    // tear everything down; the peer observes the disconnect
    local.advertiser.stop();
    remote.advertiser.stop();
    local.session.shutdown().await;
    remote.session.shutdown().await;
    echo.abort();
    info!("demo finished");
    Ok(())
}

/// Register an endpoint, start its server, and put it on the air.
/// The server must be registered before advertising, so a peer that
/// connects straight after discovery finds the message channel.
async fn bring_up(
    air: &VirtualAir,
    address: &str,
    name: &str,
    scan_window: Duration,
) -> anyhow::Result<Endpoint> {
    let config = ChatConfig::new()
        .with_device_name(name)
        .with_scan_window(scan_window);

    let radio: Arc<dyn Radio> = Arc::new(air.endpoint(address, name));
    let session = Arc::new(SessionManager::new(Arc::clone(&radio), &config));
    session
        .start_server()
        .await
        .with_context(|| format!("registering the chat service for {name}"))?;

    let mut advertiser = Advertiser::new(Arc::clone(&radio), &config);
    advertiser.start().await;

    Ok(Endpoint {
        radio,
        session,
        advertiser,
    })
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();
}
