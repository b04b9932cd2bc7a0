//! Station configuration.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use telecam_core::link::serial::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use telecam_core::link::udp::{DEFAULT_CAMERA_ADDR, DEFAULT_LOCAL_PORT, DEFAULT_SLICE_SIZE};
use telecam_core::{
    BufferMode, FrameFormat, LinkError, SerialLinkConfig, SlicePolicy, StreamConfig,
    UdpLinkConfig,
};

/// Top-level configuration for the station.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub link: LinkConfig,
    pub udp: UdpConfig,
    pub serial: SerialConfig,
    pub display: DisplayConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    #[default]
    Udp,
    Serial,
}

/// Which transport to open.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub transport: Transport,
}

/// UDP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    /// Local address slices arrive on.
    pub bind_address: String,
    /// Camera address commands go to.
    pub remote_address: String,
    /// Bytes per datagram. Must divide the raw frame size.
    pub slice_size: usize,
    /// `"strict"` or `"drop"`.
    pub slice_policy: SlicePolicy,
}

/// Serial transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
}

/// Display tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Frames per second pulled from the frame store (1..=120).
    pub tick_hz: u32,
    /// `"single"` or `"double"`.
    pub buffer_mode: BufferMode,
    /// Events buffered before frames start being dropped.
    pub event_queue: usize,
}

/// What the station does with frames and events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for PPM snapshots. Empty disables them.
    pub snapshot_dir: String,
    /// Write every Nth delivered frame.
    pub snapshot_every: u64,
    /// Print link events to stdout as JSON lines.
    pub json_events: bool,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_address: format!("0.0.0.0:{DEFAULT_LOCAL_PORT}"),
            remote_address: DEFAULT_CAMERA_ADDR.into(),
            slice_size: DEFAULT_SLICE_SIZE,
            slice_policy: SlicePolicy::Strict,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: if cfg!(windows) { "COM11" } else { "/dev/ttyUSB0" }.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tick_hz: telecam_core::controller::DEFAULT_TICK_HZ,
            buffer_mode: BufferMode::Double,
            event_queue: 8,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: "snapshots".into(),
            snapshot_every: 30,
            json_events: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl StationConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    // ── Conversion to link settings ──────────────────────────────

    pub fn to_stream_config(&self) -> StreamConfig {
        StreamConfig {
            tick_interval: StreamConfig::tick_interval_for(self.display.tick_hz),
            buffer_mode: self.display.buffer_mode,
            event_queue: self.display.event_queue.max(1),
        }
    }

    pub fn to_udp_config(&self) -> Result<UdpLinkConfig, LinkError> {
        let raw_len = FrameFormat::QVGA.raw_len();
        let slice_size = self.udp.slice_size;
        if slice_size == 0 || raw_len % slice_size != 0 {
            return Err(LinkError::InvalidConfig(format!(
                "udp.slice_size {slice_size} does not divide the {raw_len}-byte frame"
            )));
        }
        Ok(UdpLinkConfig {
            bind: parse_addr("udp.bind_address", &self.udp.bind_address)?,
            remote: parse_addr("udp.remote_address", &self.udp.remote_address)?,
            slice_size,
            slice_policy: self.udp.slice_policy,
            stream: self.to_stream_config(),
        })
    }

    pub fn to_serial_config(&self) -> Result<SerialLinkConfig, LinkError> {
        if self.serial.port.trim().is_empty() {
            return Err(LinkError::InvalidConfig("serial.port is empty".into()));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(LinkError::InvalidConfig(
                "serial.read_timeout_ms must be at least 1".into(),
            ));
        }
        Ok(SerialLinkConfig {
            port: self.serial.port.clone(),
            baud_rate: self.serial.baud_rate,
            read_timeout: Duration::from_millis(self.serial.read_timeout_ms),
            stream: self.to_stream_config(),
        })
    }
}

fn parse_addr(key: &str, value: &str) -> Result<SocketAddr, LinkError> {
    value
        .parse()
        .map_err(|e| LinkError::InvalidConfig(format!("{key} {value:?}: {e}")))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&StationConfig::default()).unwrap();
        assert!(text.contains("remote_address"));
        assert!(text.contains("slice_policy = \"strict\""));
        assert!(text.contains("buffer_mode = \"double\""));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&StationConfig::default()).unwrap();
        let parsed: StationConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.udp.slice_size, 640);
        assert_eq!(parsed.udp.remote_address, "192.168.1.88:8088");
        assert_eq!(parsed.link.transport, Transport::Udp);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: StationConfig = toml::from_str(
            r#"
            [link]
            transport = "serial"

            [udp]
            slice_size = 1280
            slice_policy = "drop"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.link.transport, Transport::Serial);
        assert_eq!(parsed.udp.slice_size, 1280);
        assert_eq!(parsed.udp.slice_policy, SlicePolicy::Drop);
        assert_eq!(parsed.display.tick_hz, 30);
    }

    #[test]
    fn udp_conversion_validates() {
        let mut cfg = StationConfig::default();
        let udp = cfg.to_udp_config().unwrap();
        assert_eq!(udp.bind.port(), 5000);
        assert_eq!(udp.slice_size, 640);

        cfg.udp.slice_size = 1000;
        assert!(matches!(cfg.to_udp_config(), Err(LinkError::InvalidConfig(_))));

        cfg.udp.slice_size = 1280;
        cfg.udp.remote_address = "not-an-address".into();
        let err = cfg.to_udp_config().unwrap_err();
        assert!(err.to_string().contains("udp.remote_address"));
    }

    #[test]
    fn tick_rate_is_clamped() {
        let mut cfg = StationConfig::default();
        cfg.display.tick_hz = 0;
        assert_eq!(cfg.to_stream_config().tick_interval, Duration::from_secs(1));
        cfg.display.tick_hz = 500;
        assert_eq!(
            cfg.to_stream_config().tick_interval,
            Duration::from_secs(1) / 120
        );
    }

    #[test]
    fn serial_conversion_validates() {
        let mut cfg = StationConfig::default();
        cfg.serial.port = "/dev/ttyACM0".into();
        let serial = cfg.to_serial_config().unwrap();
        assert_eq!(serial.read_timeout, Duration::from_millis(50));

        cfg.serial.read_timeout_ms = 0;
        assert!(cfg.to_serial_config().is_err());
        cfg.serial.read_timeout_ms = 10;
        cfg.serial.port = "  ".into();
        assert!(cfg.to_serial_config().is_err());
    }
}
