//! telecam station: entry point.
//!
//! ```text
//! telecam-station                       Connect with defaults (UDP)
//! telecam-station --config <path>       Use custom config TOML
//! telecam-station --transport serial --port /dev/ttyUSB0
//! telecam-station --gen-config          Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use telecam_core::{Command, Link, LinkEvent, SerialLink, StreamStats, UdpLink};
use telecam_station::config::{StationConfig, Transport};
use telecam_station::console::{self, ConsoleAction};
use telecam_station::events::EventRecord;
use telecam_station::snapshot::SnapshotWriter;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "telecam-station", about = "Ground station for the telecam link")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "telecam-station.toml")]
    config: PathBuf,

    /// Transport to open (overrides config).
    #[arg(short, long, value_enum)]
    transport: Option<Transport>,

    /// Camera address for UDP (overrides config). Example: 192.168.1.88:8088
    #[arg(short, long)]
    remote: Option<String>,

    /// Local UDP bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Serial port name (overrides config).
    #[arg(short, long)]
    port: Option<String>,

    /// Do not read commands from stdin; run until Ctrl-C.
    #[arg(long)]
    headless: bool,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    /// Write the default configuration to the `--config` path and exit.
    #[arg(long)]
    write_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&StationConfig::default())?;
        println!("{text}");
        return Ok(());
    }
    if cli.write_config {
        StationConfig::write_default(&cli.config)?;
        println!("wrote {}", cli.config.display());
        return Ok(());
    }

    let mut config = StationConfig::load(&cli.config);
    if let Some(transport) = cli.transport {
        config.link.transport = transport;
    }
    if let Some(remote) = cli.remote {
        config.udp.remote_address = remote;
    }
    if let Some(bind) = cli.bind {
        config.udp.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.serial.port = port;
    }

    // Logs go to stderr so stdout stays clean for JSON events.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("telecam-station v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Open the link ────────────────────────────────────────

    let mut link = match config.link.transport {
        Transport::Udp => UdpLink::open(config.to_udp_config()?).await?,
        Transport::Serial => SerialLink::open(config.to_serial_config()?).await?,
    };
    let Some(mut events) = link.events() else {
        return Err("link event stream already taken".into());
    };
    let stats = link.stats();
    let mut snapshots = SnapshotWriter::new(&config.output.snapshot_dir, config.output.snapshot_every);

    link.request(Command::start_stream());

    // ── 2. Event loop ───────────────────────────────────────────

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = !cli.headless;
    if console_open {
        eprintln!("{}", console::HELP);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = link.closing() => {
                warn!("link is shutting down");
                break;
            }
            line = lines.next_line(), if console_open => match line {
                Ok(Some(line)) => match console::parse_line(&line) {
                    Ok(Some(ConsoleAction::Send(cmd))) => link.request(cmd),
                    Ok(Some(ConsoleAction::Stats)) => {
                        let snapshot = stats.borrow().clone();
                        print_stats(&snapshot);
                        if config.output.json_events {
                            emit_json(&EventRecord::Stats(&snapshot));
                        }
                    }
                    Ok(Some(ConsoleAction::Help)) => eprintln!("{}", console::HELP),
                    Ok(Some(ConsoleAction::Quit)) => break,
                    Ok(None) => {}
                    Err(e) => eprintln!("{e} (type `help`)"),
                },
                Ok(None) => {
                    info!("stdin closed");
                    break;
                }
                Err(e) => {
                    warn!("stdin error: {e}; console disabled");
                    console_open = false;
                }
            },
            event = events.recv() => {
                let Some(event) = event else { break };
                let failed = matches!(event, LinkEvent::Failed { .. });
                handle_event(&event, &mut snapshots, config.output.json_events).await;
                if failed {
                    break;
                }
            }
        }
    }

    // ── 3. Shutdown ─────────────────────────────────────────────

    shutdown(link, &mut events, &mut snapshots, config.output.json_events).await?;
    print_stats(&stats.borrow());
    Ok(())
}

async fn handle_event(event: &LinkEvent, snapshots: &mut Option<SnapshotWriter>, json: bool) {
    if json {
        emit_json(&EventRecord::from(event));
    }
    match event {
        LinkEvent::FrameReady(frame) => {
            if let Some(writer) = snapshots {
                if let Err(e) = writer.offer(frame).await {
                    warn!("snapshot failed: {e}");
                }
            }
        }
        LinkEvent::CommandFailed { command, error } => {
            warn!(%command, "command not sent: {error}");
        }
        _ => {}
    }
}

fn emit_json(record: &EventRecord<'_>) {
    match record.to_json() {
        Ok(line) => println!("{line}"),
        Err(e) => warn!("failed to encode event: {e}"),
    }
}

/// Ask the camera to stop streaming, close the link and flush the
/// remaining events.
async fn shutdown(
    link: Link,
    events: &mut tokio::sync::mpsc::Receiver<LinkEvent>,
    snapshots: &mut Option<SnapshotWriter>,
    json: bool,
) -> Result<(), telecam_core::LinkError> {
    info!("shutting down");
    if !link.is_closing() {
        link.request(Command::stop_stream());
    }
    let result = link.close().await;
    while let Ok(event) = events.try_recv() {
        handle_event(&event, snapshots, json).await;
    }
    if let Err(e) = &result {
        error!("link closed with error: {e}");
    }
    result
}

fn print_stats(stats: &StreamStats) {
    info!(
        frames = stats.frames_completed,
        delivered = stats.frames_delivered,
        dropped = stats.frames_dropped,
        superseded = stats.frames_superseded,
        framing_errors = stats.framing_errors,
        fps = round1(stats.frames_per_second),
        kib_per_s = round1(stats.bytes_per_second / 1024.0),
        "stream stats"
    );
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
