//! Skylink Device Simulator
//!
//! Runs a device session on the host against a real server: authenticates,
//! sends heartbeats and metrics and emits synthetic sensor readings.

use std::net::UdpSocket;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use skylink_client::{Credentials, SessionBuilder, SessionConfig, SessionState};
use skylink_core::{Board, Millis, Priority, Reading};
use skylink_transport::{Link, WebSocketTransport};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skylink-sim")]
#[command(about = "Simulate a skylink device from the host")]
#[command(version)]
struct Cli {
    /// Session config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server URL, overrides the config file
    #[arg(short, long)]
    url: Option<String>,

    /// Authenticate with a project token
    #[arg(long, conflicts_with_all = ["device_id", "secret"])]
    token: Option<String>,

    /// Pre-provisioned device id
    #[arg(long, requires = "secret")]
    device_id: Option<String>,

    /// Secret key for the device id
    #[arg(long, requires = "device_id")]
    secret: Option<String>,

    /// Hardware address to report
    #[arg(long, default_value = "02:00:00:5C:A1:01")]
    mac: String,

    /// Seconds between synthetic readings
    #[arg(short, long, default_value = "5")]
    interval: u64,

    /// Main loop period in milliseconds
    #[arg(long, default_value = "50")]
    tick_ms: u64,

    /// Stop after this many seconds (0 = run forever)
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// Batch up to N readings per frame
    #[arg(short, long)]
    batch: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// The host network is assumed up
struct HostLink {
    mac_address: String,
}

impl Link for HostLink {
    fn begin(&mut self, _ssid: &str, _password: &str) -> skylink_transport::Result<()> {
        Ok(())
    }

    fn disconnect(&mut self) {}

    fn is_connected(&self) -> bool {
        true
    }

    fn local_address(&self) -> Option<String> {
        // Connecting a UDP socket picks the outbound interface without sending
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("192.0.2.1:80").ok()?;
        socket.local_addr().ok().map(|addr| addr.ip().to_string())
    }

    fn mac_address(&self) -> String {
        self.mac_address.clone()
    }

    fn ssid(&self) -> Option<String> {
        Some("host".to_string())
    }
}

struct HostBoard {
    boot: Instant,
}

impl Board for HostBoard {
    fn now_ms(&self) -> Millis {
        // Truncation gives the same wrap a 32-bit tick counter has
        self.boot.elapsed().as_millis() as Millis
    }

    fn delay_ms(&mut self, ms: Millis) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => {
            let credentials = match (&cli.token, &cli.device_id, &cli.secret) {
                (Some(token), _, _) => Credentials::Token {
                    project_token: token.clone(),
                },
                (None, Some(id), Some(secret)) => Credentials::Legacy {
                    device_id: id.clone(),
                    secret_key: secret.clone(),
                },
                _ => bail!("need --config, --token or --device-id with --secret"),
            };
            let Some(url) = &cli.url else {
                bail!("need --url when no config file is given");
            };
            SessionConfig::new(credentials, url.as_str())
        }
    };

    if let Some(url) = &cli.url {
        config.server_url = url.clone();
    }
    if let Some(size) = cli.batch {
        config.batch.enabled = true;
        config.batch.size = size;
    }
    config.platform = "host-sim".to_string();
    Ok(config)
}

/// Slowly drifting temperature in degrees
fn synthetic_temperature(step: u64) -> f64 {
    20.0 + 3.0 * ((step as f64) / 12.0).sin()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli)?;
    tracing::info!("Simulating device against {}", config.server_url);

    let link = HostLink {
        mac_address: cli.mac.clone(),
    };
    let board = HostBoard { boot: Instant::now() };
    let mut session = SessionBuilder::from_config(config)
        .build(WebSocketTransport::new(), link, board)
        .context("invalid session configuration")?;

    {
        let handlers = session.handlers_mut();
        handlers.on_connect(|| tracing::info!("Connected, authenticating"));
        handlers.on_disconnect(|| tracing::warn!("Disconnected"));
        handlers.on_command(|command| tracing::info!("Command: {}", command));
        handlers.on_ota_update(|url| tracing::info!("OTA update offered: {}", url));
        handlers.on_ota_progress(|percent| tracing::info!("OTA progress: {}%", percent));
        handlers.on_config_update(|applied| tracing::info!("Config update: {:?}", applied));
        handlers.on_wifi_config(|ssid, _| tracing::info!("Wi-Fi credentials for {}", ssid));
        handlers.on_project_info(|project| tracing::info!("Project: {}", project));
    }

    if let Err(e) = session.connect() {
        tracing::warn!("Initial connect failed, will retry: {}", e);
    }

    let started = Instant::now();
    let reading_every = Duration::from_secs(cli.interval.max(1));
    let mut last_reading = Instant::now();
    let mut step = 0u64;
    let mut was_active = false;

    loop {
        session.tick();

        let active = session.is_active();
        if active != was_active {
            match session.auth_status() {
                Ok(()) => tracing::info!("Session active as {}", session.device_id()),
                Err(e) if session.state() == SessionState::Disconnected => {
                    tracing::warn!("Session inactive: {}", e)
                }
                Err(_) => {}
            }
            was_active = active;
        }

        if last_reading.elapsed() >= reading_every {
            last_reading = Instant::now();
            step += 1;
            let readings = [
                ("temperature", Reading::from(synthetic_temperature(step))),
                ("counter", Reading::from(step)),
            ];
            if let Err(e) = session.send_readings(&readings, Some("C"), Priority::Normal) {
                tracing::warn!("Reading not sent: {}", e);
            }
            tracing::debug!(queued = session.queued_count(), "Reading {}", step);
        }

        if cli.duration > 0 && started.elapsed() >= Duration::from_secs(cli.duration) {
            break;
        }
        thread::sleep(Duration::from_millis(cli.tick_ms));
    }

    if session.is_active() {
        if let Err(e) = session.flush_queue() {
            tracing::warn!("Final flush failed: {}", e);
        }
        if let Err(e) = session.send_status("offline") {
            tracing::warn!("Status not sent: {}", e);
        }
    }
    session.disconnect();
    tracing::info!("Simulator stopped");
    Ok(())
}
