//! MouseShare secondary entry point.
//!
//! ```text
//! main()
//!  ├─ input injector        -- SendInput back end (or mock off Windows)
//!  ├─ presence broadcaster  -- blocking UDP thread
//!  ├─ PrimaryLink           -- connect/read/reconnect loop
//!  └─ replay loop           -- decoded frames into ReplayController
//! ```
//!
//! Exit code is non-zero when the injector or the broadcaster cannot
//! initialise.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mouseshare_core::protocol::discovery::{DEFAULT_DISCOVERY_PORT, DEFAULT_SESSION_PORT};

use mouseshare_secondary::application::apply_input::ReplayController;
use mouseshare_secondary::infrastructure::discovery::{start_broadcaster, LocalAnnouncement};
use mouseshare_secondary::infrastructure::input_injection::InputInjector;
use mouseshare_secondary::infrastructure::network::{
    ConnectionConfig, LinkEvent, PrimaryLink, DEFAULT_RECONNECT_INTERVAL_MS,
};

/// Receive keyboard and mouse input streamed from a primary host.
#[derive(Debug, Parser)]
#[command(name = "mouseshare-secondary", version)]
struct Cli {
    /// Primary host name or address.
    host: String,

    /// Session TCP port on the primary.
    #[arg(short, long, default_value_t = DEFAULT_SESSION_PORT)]
    port: u16,

    /// Name announced on the LAN (defaults to the host name).
    #[arg(long)]
    name: Option<String>,

    /// UDP discovery port.
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    discovery_port: u16,

    /// Reconnect interval in milliseconds.
    #[arg(long, default_value_t = DEFAULT_RECONNECT_INTERVAL_MS)]
    reconnect_interval_ms: u64,
}

fn local_name(cli: &Cli) -> String {
    cli.name.clone().unwrap_or_else(|| {
        std::env::var("COMPUTERNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| "mouseshare-secondary".to_string())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let name = local_name(&cli);
    info!("mouseshare secondary starting as {name}");
    let running = Arc::new(AtomicBool::new(true));

    // ── Input injector ────────────────────────────────────────────────────────
    #[cfg(target_os = "windows")]
    let injector: Arc<dyn InputInjector> = Arc::new(
        mouseshare_secondary::infrastructure::input_injection::windows::WindowsInjector::new()
            .context("initialising input injector")?,
    );
    #[cfg(not(target_os = "windows"))]
    let injector: Arc<dyn InputInjector> = Arc::new(
        mouseshare_secondary::infrastructure::input_injection::mock::MockInjector::new(1920, 1080),
    );

    let (screen_width, screen_height) = injector.screen_size();
    info!("secondary screen {screen_width}x{screen_height}");

    // ── Presence broadcaster ──────────────────────────────────────────────────
    let discovery_thread = start_broadcaster(
        cli.discovery_port,
        LocalAnnouncement {
            name,
            session_port: cli.port,
            screen_width,
            screen_height,
        },
        Arc::clone(&running),
    )
    .context("starting presence broadcaster")?;

    // ── Session link + replay loop ────────────────────────────────────────────
    let mut link_config = ConnectionConfig::new(cli.host.clone(), cli.port);
    link_config.reconnect_interval_ms = cli.reconnect_interval_ms;
    let mut link_rx = PrimaryLink::new(link_config).start(Arc::clone(&running));

    let mut controller = ReplayController::new(injector);
    let replay_running = Arc::clone(&running);
    let replay_task = tokio::spawn(async move {
        while let Some(event) = link_rx.recv().await {
            if !replay_running.load(Ordering::Relaxed) {
                break;
            }
            match event {
                LinkEvent::Connected { peer } => info!("session open with {peer}"),
                LinkEvent::Frame(frame) => {
                    if let Err(e) = controller.handle_event(frame) {
                        error!("injection failed: {e}");
                    }
                }
                LinkEvent::Disconnected => {
                    controller.reset();
                    info!("session closed; replay idle until reconnect");
                }
            }
        }
    });

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown signal received");

    running.store(false, Ordering::Relaxed);
    replay_task.abort();
    let _ = tokio::task::spawn_blocking(move || discovery_thread.join()).await;

    info!("mouseshare secondary stopped");
    Ok(())
}
