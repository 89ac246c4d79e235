//! Server configuration.
//!
//! [`ServerConfig`] is the single source of truth for runtime settings.  It
//! is assembled once at startup from three layers, lowest precedence first:
//!
//! 1. built-in defaults ([`ServerConfig::default`]),
//! 2. an optional TOML file ([`FileConfig`]),
//! 3. command-line flags / `MIRROR_*` environment variables (see `main.rs`).
//!
//! ```toml
//! [network]
//! bind = "127.0.0.1"     # "0.0.0.0" exposes both channels on the LAN
//! screen_port = 9001
//! input_port = 9002
//!
//! [stream]
//! width = 960            # stream width in pixels; height follows the display
//! jpeg_quality = 80      # 1–100
//! frame_delay = 0.03     # seconds between frames
//!
//! [input]
//! click_hold_ms = 10     # press→release gap of a synthetic click
//!
//! [synthetic]            # only used without the `native` feature
//! width = 1440
//! height = 900
//! ```
//!
//! Missing sections and fields fall back to the defaults, so an empty file
//! is valid.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use mirror_core::DisplayGeometry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SCREEN_PORT: u16 = 9001;
pub const DEFAULT_INPUT_PORT: u16 = 9002;
pub const DEFAULT_STREAM_WIDTH: u32 = 960;
/// Largest width a baseline JPEG can carry.
pub const MAX_STREAM_WIDTH: u32 = u16::MAX as u32;
pub const DEFAULT_JPEG_QUALITY: u8 = 80;
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(30);
pub const DEFAULT_CLICK_HOLD: Duration = Duration::from_millis(10);

/// Error type for building and validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),

    #[error("jpeg quality {0} is outside 1..=100")]
    InvalidQuality(u8),

    #[error("stream width must be positive")]
    ZeroStreamWidth,

    #[error("stream width {0} exceeds the JPEG limit of 65535")]
    StreamWidthTooLarge(u32),

    #[error("frame delay {0} is not a positive number of seconds")]
    InvalidFrameDelay(f64),

    #[error("screen and input channels cannot share {0}")]
    SharedBindAddress(SocketAddr),

    #[error("synthetic display {width}x{height} must have positive dimensions")]
    InvalidSyntheticDisplay { width: u32, height: u32 },
}

/// All runtime configuration for the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Where the screen channel listens.  Loopback by default; LAN exposure
    /// is an explicit opt-in.
    pub screen_bind_addr: SocketAddr,
    /// Where the input channel listens.
    pub input_bind_addr: SocketAddr,
    /// Width of the streamed image; the height is derived per display.
    pub stream_width: u32,
    /// JPEG quality, 1–100.
    pub jpeg_quality: u8,
    /// Target gap between frames (best-effort).
    pub frame_delay: Duration,
    /// Gap between the press and release of a synthetic click.
    pub click_hold: Duration,
    /// Display size reported by the synthetic capture back-end.
    pub synthetic_display: DisplayGeometry,
}

impl Default for ServerConfig {
    /// | Field             | Default            |
    /// |-------------------|--------------------|
    /// | screen_bind_addr  | `127.0.0.1:9001`   |
    /// | input_bind_addr   | `127.0.0.1:9002`   |
    /// | stream_width      | 960                |
    /// | jpeg_quality      | 80                 |
    /// | frame_delay       | 30 ms              |
    /// | click_hold        | 10 ms              |
    /// | synthetic_display | 1440×900           |
    fn default() -> Self {
        let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
        Self {
            screen_bind_addr: SocketAddr::new(loopback, DEFAULT_SCREEN_PORT),
            input_bind_addr: SocketAddr::new(loopback, DEFAULT_INPUT_PORT),
            stream_width: DEFAULT_STREAM_WIDTH,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            frame_delay: DEFAULT_FRAME_DELAY,
            click_hold: DEFAULT_CLICK_HOLD,
            synthetic_display: DisplayGeometry::new(1440, 900),
        }
    }
}

impl ServerConfig {
    /// Checks the invariants the loops rely on.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::InvalidQuality(self.jpeg_quality));
        }
        if self.stream_width == 0 {
            return Err(ConfigError::ZeroStreamWidth);
        }
        if self.stream_width > MAX_STREAM_WIDTH {
            return Err(ConfigError::StreamWidthTooLarge(self.stream_width));
        }
        if self.frame_delay.is_zero() {
            return Err(ConfigError::InvalidFrameDelay(0.0));
        }
        if self.screen_bind_addr == self.input_bind_addr {
            return Err(ConfigError::SharedBindAddress(self.screen_bind_addr));
        }
        let DisplayGeometry { width, height } = self.synthetic_display;
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidSyntheticDisplay { width, height });
        }
        Ok(())
    }
}

/// Converts a frame delay given in seconds.
///
/// # Errors
///
/// [`ConfigError::InvalidFrameDelay`] for zero, negative, or non-finite
/// values.  Resolution is one microsecond.
pub fn frame_delay_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    let micros = (secs * 1_000_000.0).round();
    if !micros.is_finite() || micros < 1.0 || micros > u64::MAX as f64 {
        return Err(ConfigError::InvalidFrameDelay(secs));
    }
    Ok(Duration::from_micros(micros as u64))
}

/// Parses a bind host (`"127.0.0.1"`, `"0.0.0.0"`, `"::1"`).
///
/// # Errors
///
/// [`ConfigError::InvalidBindAddress`] if `host` is not an IP address.
pub fn parse_bind_host(host: &str) -> Result<IpAddr, ConfigError> {
    host.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidBindAddress(host.to_string()))
}

// ── TOML file schema ──────────────────────────────────────────────────────────

/// On-disk configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub network: NetworkSection,
    pub stream: StreamSection,
    pub input: InputSection,
    pub synthetic: SyntheticSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkSection {
    pub bind: String,
    pub screen_port: u16,
    pub input_port: u16,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            bind: Ipv4Addr::LOCALHOST.to_string(),
            screen_port: DEFAULT_SCREEN_PORT,
            input_port: DEFAULT_INPUT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamSection {
    pub width: u32,
    pub jpeg_quality: u8,
    /// Seconds.
    pub frame_delay: f64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            width: DEFAULT_STREAM_WIDTH,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            frame_delay: DEFAULT_FRAME_DELAY.as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputSection {
    pub click_hold_ms: u64,
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            click_hold_ms: DEFAULT_CLICK_HOLD.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyntheticSection {
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticSection {
    fn default() -> Self {
        Self {
            width: 1440,
            height: 900,
        }
    }
}

impl FileConfig {
    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`]
    /// if it is not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parses config from TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] on invalid TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Resolves the file into a [`ServerConfig`].  Not yet validated; CLI
    /// overrides are applied on top before [`ServerConfig::validate`].
    ///
    /// # Errors
    ///
    /// Bad bind host or frame delay.
    pub fn into_server_config(self) -> Result<ServerConfig, ConfigError> {
        let host = parse_bind_host(&self.network.bind)?;
        Ok(ServerConfig {
            screen_bind_addr: SocketAddr::new(host, self.network.screen_port),
            input_bind_addr: SocketAddr::new(host, self.network.input_port),
            stream_width: self.stream.width,
            jpeg_quality: self.stream.jpeg_quality,
            frame_delay: frame_delay_from_secs(self.stream.frame_delay)?,
            click_hold: Duration::from_millis(self.input.click_hold_ms),
            synthetic_display: DisplayGeometry::new(self.synthetic.width, self.synthetic.height),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
