//! MouseShare primary entry point.
//!
//! Wires the layers together and runs until Ctrl-C:
//!
//! ```text
//! main()
//!  ├─ load config (TOML file, CLI overrides)
//!  ├─ input capture        -- OS hook thread (or mock off Windows)
//!  ├─ discovery            -- blocking UDP thread feeding the topology
//!  ├─ session listener     -- tokio task, one secondary at a time
//!  ├─ keepalive            -- tokio task
//!  └─ focus task           -- drains captured events into FocusController
//! ```
//!
//! Exit code is non-zero when interception, discovery, or the listener
//! cannot initialise.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mouseshare_core::protocol::event::Edge;
use mouseshare_core::{PeerRecord, Topology};

use mouseshare_primary::application::share_input::{CaptureControl, EventSink, FocusController};
use mouseshare_primary::infrastructure::input_capture::InputCapture;
use mouseshare_primary::infrastructure::network::discovery::{
    start_discovery, DiscoveryConfig, DEFAULT_BROADCAST_INTERVAL_MS,
};
use mouseshare_primary::infrastructure::network::session::{
    bind_listener, run_accept_loop, run_keepalive, SessionHandle, SessionNotice,
};
use mouseshare_primary::infrastructure::status::AppStatus;
use mouseshare_primary::infrastructure::storage::config::{self, AppConfig};

/// Share this machine's keyboard and mouse with a secondary host.
#[derive(Debug, Parser)]
#[command(name = "mouseshare-primary", version)]
struct Cli {
    /// Session TCP port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Edge used by the manual toggle when no edge was crossed.
    #[arg(short, long)]
    edge: Option<Edge>,

    /// Name announced on the LAN (defaults to the host name).
    #[arg(long)]
    name: Option<String>,

    /// UDP discovery port.
    #[arg(long)]
    discovery_port: Option<u16>,

    /// Path to the configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn effective_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => config::config_file_path().ok(),
    };
    let mut cfg = match &path {
        Some(path) => config::load_config(path).with_context(|| format!("loading {path:?}"))?,
        None => AppConfig::default(),
    };

    if let Some(port) = cli.port {
        cfg.network.port = port;
    }
    if let Some(port) = cli.discovery_port {
        cfg.network.discovery_port = port;
    }
    if let Some(edge) = cli.edge {
        cfg.switching.switch_edge = edge;
    }
    if let Some(name) = &cli.name {
        cfg.host.name = name.clone();
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = effective_config(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.host.log_level.clone())),
        )
        .init();

    info!("mouseshare primary starting as {}", cfg.host.name);
    let running = Arc::new(AtomicBool::new(true));

    // ── Input capture ─────────────────────────────────────────────────────────
    #[cfg(target_os = "windows")]
    let capture = Arc::new(
        mouseshare_primary::infrastructure::input_capture::windows::WindowsInputCapture::new(
            cfg.switching.user_toggle_key,
            cfg.timing.safety_release_ms,
        ),
    );
    #[cfg(not(target_os = "windows"))]
    let capture = Arc::new(
        mouseshare_primary::infrastructure::input_capture::mock::MockInputCapture::new(1920, 1080),
    );

    let capture_rx = capture.start().context("installing input hooks")?;
    let (screen_width, screen_height) = capture.screen_size();
    info!("primary screen {screen_width}x{screen_height}");

    // The Windows back end runs its own watchdog next to the hook statics;
    // the mock needs one wired up here.
    #[cfg(not(target_os = "windows"))]
    let _watchdog = mouseshare_primary::infrastructure::input_capture::spawn_safety_release(
        capture.suppress_flag(),
        capture.activity_stamp(),
        cfg.timing.safety_release_ms,
        Arc::clone(&running),
    );

    // ── Topology + discovery ──────────────────────────────────────────────────
    let topology = Arc::new(Mutex::new(Topology::new(PeerRecord::local(
        cfg.host.name.clone(),
        cfg.network.port,
        screen_width,
        screen_height,
        true,
    ))));

    let discovery_thread = start_discovery(
        DiscoveryConfig {
            discovery_port: cfg.network.discovery_port,
            broadcast_interval_ms: DEFAULT_BROADCAST_INTERVAL_MS,
            peer_expiry_ms: cfg.timing.peer_expiry_ms,
        },
        Arc::clone(&topology),
        Arc::clone(&running),
    )
    .context("starting discovery")?;

    // ── Session transport ─────────────────────────────────────────────────────
    let listener = bind_listener(cfg.network.port)
        .await
        .context("binding session listener")?;
    let session = SessionHandle::new();
    let (notice_tx, mut notice_rx) = mpsc::channel::<SessionNotice>(8);

    tokio::spawn(run_accept_loop(
        listener,
        session.clone(),
        Arc::clone(&topology),
        notice_tx,
        (screen_width, screen_height),
        Arc::clone(&running),
    ));
    tokio::spawn(run_keepalive(
        session.clone(),
        cfg.timing.keepalive_interval_ms,
        Arc::clone(&running),
    ));

    // ── Focus controller ──────────────────────────────────────────────────────
    let mut controller = FocusController::new(
        screen_width,
        screen_height,
        Arc::clone(&topology),
        Arc::new(session.clone()) as Arc<dyn EventSink>,
        Arc::clone(&capture) as Arc<dyn CaptureControl>,
        cfg.switching.toggle_key,
        cfg.switching.user_toggle_key,
        cfg.switching.switch_edge,
    );
    let status = Arc::new(AppStatus::new(controller.state_cell()));
    status.push(format!(
        "listening on tcp {} / discovery udp {}",
        cfg.network.port, cfg.network.discovery_port
    ));

    let focus_status = Arc::clone(&status);
    let mut capture_rx = capture_rx;
    let focus_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                captured = capture_rx.recv() => match captured {
                    Some(event) => controller.handle_event(event).await,
                    None => break,
                },
                notice = notice_rx.recv() => match notice {
                    Some(SessionNotice::Opened { peer }) => {
                        focus_status.set_session_open(true);
                        focus_status.push(format!("session open with {peer}"));
                    }
                    Some(SessionNotice::Closed) => {
                        focus_status.set_session_open(false);
                        controller.on_session_closed();
                        focus_status.push("session closed; waiting for secondary");
                    }
                    None => break,
                },
            }
        }
    });

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown signal received");

    running.store(false, Ordering::Relaxed);
    capture.stop();
    session.close().await;
    focus_task.abort();
    let _ = tokio::task::spawn_blocking(move || discovery_thread.join()).await;

    info!("mouseshare primary stopped");
    Ok(())
}
