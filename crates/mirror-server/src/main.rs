//! Desk Mirror host: entry point.
//!
//! Streams the host screen to one remote viewer and replays that viewer's
//! pointer gestures on the host.
//!
//! # Usage
//!
//! ```text
//! mirror-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>        TOML config file
//!   --bind <IP>            Address both channels listen on [default: 127.0.0.1]
//!   --screen-port <PORT>   Screen channel port [default: 9001]
//!   --input-port <PORT>    Input channel port [default: 9002]
//!   --stream-width <PX>    Width of the streamed image [default: 960]
//!   --jpeg-quality <1-100> JPEG quality [default: 80]
//!   --frame-delay <SECS>   Delay between frames [default: 0.03]
//!   --click-hold-ms <MS>   Button hold time for a click [default: 10]
//! ```
//!
//! Precedence, lowest first: built-in defaults, the config file, environment
//! variables (`MIRROR_*`), command-line flags.
//!
//! Listening on a LAN address (`--bind 0.0.0.0`) exposes unauthenticated
//! control of the host pointer; it is never the default.
//!
//! # Back-ends
//!
//! Built with `--features native`, frames come from the primary display and
//! gestures drive the real pointer (XTest on Linux, CoreGraphics on macOS).
//! Otherwise a synthetic test pattern is streamed and pointer commands are
//! only logged.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mirror_server::application::{FrameEncoder, FrameSource, PointerActuator};
use mirror_server::domain::config::{frame_delay_from_secs, parse_bind_host};
use mirror_server::domain::{FileConfig, ServerConfig};
use mirror_server::infrastructure::pointer::dry_run::DryRunPointerActuator;
use mirror_server::infrastructure::ws_server::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Desk Mirror host.
///
/// Every option is optional so that unset flags fall through to the config
/// file and then to the built-in defaults.
#[derive(Debug, Default, Parser)]
#[command(
    name = "mirror-server",
    about = "Stream this screen to a viewer and replay its pointer gestures",
    version
)]
struct Cli {
    /// TOML config file.
    #[arg(long, env = "MIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// IP address both channels bind to.
    ///
    /// Use `0.0.0.0` to accept viewers from the LAN.
    #[arg(long, env = "MIRROR_BIND")]
    bind: Option<String>,

    #[arg(long, env = "MIRROR_SCREEN_PORT")]
    screen_port: Option<u16>,

    #[arg(long, env = "MIRROR_INPUT_PORT")]
    input_port: Option<u16>,

    /// Width in pixels of the streamed image; height follows the display's
    /// aspect ratio.
    #[arg(long, env = "MIRROR_STREAM_WIDTH")]
    stream_width: Option<u32>,

    #[arg(long, env = "MIRROR_JPEG_QUALITY")]
    jpeg_quality: Option<u8>,

    /// Delay between frames, in seconds.
    #[arg(long, env = "MIRROR_FRAME_DELAY")]
    frame_delay: Option<f64>,

    #[arg(long, env = "MIRROR_CLICK_HOLD_MS")]
    click_hold_ms: Option<u64>,
}

impl Cli {
    /// Merges defaults, the config file, and these flags into a validated
    /// [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, a flag
    /// value is invalid, or the merged config fails validation.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => FileConfig::load(path)
                .and_then(FileConfig::into_server_config)
                .with_context(|| format!("invalid config file {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(bind) = &self.bind {
            let host = parse_bind_host(bind)?;
            config.screen_bind_addr.set_ip(host);
            config.input_bind_addr.set_ip(host);
        }
        if let Some(port) = self.screen_port {
            config.screen_bind_addr.set_port(port);
        }
        if let Some(port) = self.input_port {
            config.input_bind_addr.set_port(port);
        }
        if let Some(width) = self.stream_width {
            config.stream_width = width;
        }
        if let Some(quality) = self.jpeg_quality {
            config.jpeg_quality = quality;
        }
        if let Some(secs) = self.frame_delay {
            config.frame_delay = frame_delay_from_secs(secs)?;
        }
        if let Some(ms) = self.click_hold_ms {
            config.click_hold = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }
}

// ── Back-end selection ────────────────────────────────────────────────────────

#[cfg(feature = "native")]
fn open_frame_source(config: &ServerConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    use mirror_server::infrastructure::capture::scrap::ScrapFrameSource;

    let source = ScrapFrameSource::start(FrameEncoder::new(config.jpeg_quality))
        .context("cannot open the primary display")?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "native"))]
fn open_frame_source(config: &ServerConfig) -> anyhow::Result<Box<dyn FrameSource>> {
    use mirror_server::infrastructure::capture::synthetic::SyntheticFrameSource;

    info!(
        "streaming a {}x{} synthetic test pattern (build with --features native for real capture)",
        config.synthetic_display.width, config.synthetic_display.height
    );
    Ok(Box::new(SyntheticFrameSource::new(
        config.synthetic_display,
        FrameEncoder::new(config.jpeg_quality),
    )))
}

fn open_actuator() -> Arc<dyn PointerActuator> {
    match mirror_server::infrastructure::pointer::native_actuator() {
        Ok(actuator) => actuator,
        Err(e) => {
            warn!("pointer injection disabled ({e}); commands will only be logged");
            Arc::new(DryRunPointerActuator::new())
        }
    }
}

fn bind_summary(addr: SocketAddr) -> String {
    if addr.ip().is_loopback() {
        addr.to_string()
    } else {
        format!("{addr} (reachable from the network)")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_server_config()?;

    info!(
        "Desk Mirror starting: screen={}, input={}, stream width {}, quality {}, frame delay {:?}",
        bind_summary(config.screen_bind_addr),
        bind_summary(config.input_bind_addr),
        config.stream_width,
        config.jpeg_quality,
        config.frame_delay
    );

    let frame_source = open_frame_source(&config)?;
    let actuator = open_actuator();

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(config, frame_source, actuator, running).await?;

    info!("Desk Mirror stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
