//! Interface configuration.
//!
//! [`InterfaceOptions`] mirrors the raw options a host passes in its
//! interface section. Converting it into an [`InterfaceConfig`] validates the
//! connection mode and resolves the modem preset that drives pacing.

use std::{fmt, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use crate::transport::BackoffConfig;

/// Default TCP port of both the Meshtastic network API and the Android bridge.
pub const DEFAULT_TCP_PORT: u16 = 4403;
/// Interface name used when the host supplies none.
pub const DEFAULT_NAME: &str = "Meshtastic";
/// Largest frame the host may hand to the interface.
pub const HW_MTU: usize = 564;
/// Default payload budget of one radio fragment, header excluded.
pub const DEFAULT_MAX_PAYLOAD: usize = 200;
/// Default limit on frames waiting for the link.
pub const DEFAULT_MAX_PENDING_FRAMES: usize = 64;

const DEFAULT_DATA_SPEED: u8 = 8;
const DEFAULT_HOP_LIMIT: u8 = 1;

/// Raw interface options as provided by the host.
///
/// Keys the interface does not recognise (such as the host's own `type` or
/// `enabled`) are ignored.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct InterfaceOptions {
    pub name: Option<String>,
    /// Serial device path.
    pub port: Option<String>,
    /// BLE address or device name.
    pub ble_port: Option<String>,
    /// `host[:port]` of a network-attached device.
    pub tcp_port: Option<String>,
    pub android_tcp_host: Option<String>,
    pub android_tcp_port: Option<u16>,
    pub data_speed: Option<u8>,
    pub hop_limit: Option<u8>,
    /// Overrides the bitrate advertised for the selected preset.
    pub bitrate: Option<u64>,
    pub max_payload: Option<usize>,
    /// Frames held while the bridge is down or busy; later frames are dropped.
    pub max_pending_frames: Option<usize>,
    pub reassembly_timeout_secs: Option<u64>,
}

/// Errors raised while validating [`InterfaceOptions`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no connection mode configured: set port, ble_port, tcp_port or android_tcp_host")]
    MissingMode,
    #[error("conflicting connection modes configured: {0}")]
    ConflictingModes(String),
    #[error("unknown data_speed {0}")]
    UnknownDataSpeed(u8),
    #[error("invalid tcp_port address {0:?}")]
    InvalidTcpAddress(String),
    #[error("max_payload must be at least 1 byte")]
    InvalidMaxPayload,
    #[error("max_pending_frames must be at least 1")]
    InvalidMaxPendingFrames,
}

/// Direct device connection handled by the radio library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativeTarget {
    Serial(String),
    Ble(String),
    Tcp { host: String, port: u16 },
}

impl fmt::Display for NativeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(path) => write!(f, "serial:{path}"),
            Self::Ble(address) => write!(f, "ble:{address}"),
            Self::Tcp { host, port } => write!(f, "tcp:{host}:{port}"),
        }
    }
}

/// How the interface reaches the radio.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Serial, BLE, or network-attached device.
    Native(NativeTarget),
    /// Line-oriented TCP bridge hosted by a companion Android app.
    Bridged { host: String, port: u16 },
}

impl ConnectionMode {
    /// Whether this mode owns its own reconnect loop.
    #[must_use]
    pub fn is_bridged(&self) -> bool { matches!(self, Self::Bridged { .. }) }
}

/// Meshtastic modem presets, indexed by the `data_speed` option.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModemPreset {
    LongFast,
    LongSlow,
    MediumSlow,
    MediumFast,
    ShortSlow,
    ShortFast,
    LongModerate,
    ShortTurbo,
}

impl ModemPreset {
    /// Delay between two radio packets.
    #[must_use]
    pub fn pacing(self) -> Duration {
        match self {
            Self::ShortTurbo => Duration::from_millis(400),
            Self::ShortFast => Duration::from_secs(1),
            Self::ShortSlow => Duration::from_secs(3),
            Self::MediumFast => Duration::from_secs(4),
            Self::MediumSlow => Duration::from_secs(6),
            Self::LongFast => Duration::from_secs(8),
            Self::LongModerate => Duration::from_secs(12),
            Self::LongSlow => Duration::from_secs(15),
        }
    }

    /// Nominal air bitrate in bits per second.
    #[must_use]
    pub fn bitrate(self) -> u64 {
        match self {
            Self::ShortTurbo => 21_880,
            Self::ShortFast => 10_940,
            Self::ShortSlow => 6_250,
            Self::MediumFast => 3_520,
            Self::MediumSlow => 1_950,
            Self::LongFast => 1_070,
            Self::LongModerate => 340,
            Self::LongSlow => 180,
        }
    }
}

impl TryFrom<u8> for ModemPreset {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::LongFast,
            1 => Self::LongSlow,
            3 => Self::MediumSlow,
            4 => Self::MediumFast,
            5 => Self::ShortSlow,
            6 => Self::ShortFast,
            7 => Self::LongModerate,
            8 => Self::ShortTurbo,
            other => return Err(ConfigError::UnknownDataSpeed(other)),
        })
    }
}

/// Validated interface settings.
#[derive(Clone, Debug)]
pub struct InterfaceConfig {
    pub name: String,
    pub mode: ConnectionMode,
    pub preset: ModemPreset,
    /// Delay between two radio packets; defaults to the preset's.
    pub pacing: Duration,
    pub bitrate: u64,
    pub hop_limit: u8,
    pub max_payload: usize,
    /// Largest number of frames queued for transmission at once.
    pub max_pending_frames: usize,
    /// Evict partial messages idle for this long. `None` keeps them until
    /// the peer starts another message.
    pub reassembly_timeout: Option<Duration>,
    /// Reconnect timing for the bridged mode.
    pub backoff: BackoffConfig,
}

impl InterfaceConfig {
    /// Build a configuration for `mode` with every other setting defaulted.
    #[must_use]
    pub fn new(mode: ConnectionMode) -> Self {
        let preset = ModemPreset::ShortTurbo;
        Self {
            name: DEFAULT_NAME.to_owned(),
            mode,
            preset,
            pacing: preset.pacing(),
            bitrate: preset.bitrate(),
            hop_limit: DEFAULT_HOP_LIMIT,
            max_payload: DEFAULT_MAX_PAYLOAD,
            max_pending_frames: DEFAULT_MAX_PENDING_FRAMES,
            reassembly_timeout: None,
            backoff: BackoffConfig::default(),
        }
    }

    /// Convenience constructor for the bridged mode.
    #[must_use]
    pub fn bridged(host: impl Into<String>, port: u16) -> Self {
        Self::new(ConnectionMode::Bridged {
            host: host.into(),
            port,
        })
    }
}

impl TryFrom<InterfaceOptions> for InterfaceConfig {
    type Error = ConfigError;

    fn try_from(options: InterfaceOptions) -> Result<Self, Self::Error> {
        let mode = select_mode(&options)?;
        let preset = ModemPreset::try_from(options.data_speed.unwrap_or(DEFAULT_DATA_SPEED))?;
        let max_payload = options.max_payload.unwrap_or(DEFAULT_MAX_PAYLOAD);
        if max_payload == 0 {
            return Err(ConfigError::InvalidMaxPayload);
        }
        let max_pending_frames = options
            .max_pending_frames
            .unwrap_or(DEFAULT_MAX_PENDING_FRAMES);
        if max_pending_frames == 0 {
            return Err(ConfigError::InvalidMaxPendingFrames);
        }

        Ok(Self {
            name: options.name.unwrap_or_else(|| DEFAULT_NAME.to_owned()),
            mode,
            preset,
            pacing: preset.pacing(),
            bitrate: options.bitrate.unwrap_or_else(|| preset.bitrate()),
            hop_limit: options.hop_limit.unwrap_or(DEFAULT_HOP_LIMIT),
            max_payload,
            max_pending_frames,
            reassembly_timeout: options.reassembly_timeout_secs.map(Duration::from_secs),
            backoff: BackoffConfig::default(),
        })
    }
}

fn select_mode(options: &InterfaceOptions) -> Result<ConnectionMode, ConfigError> {
    let mut selected = Vec::new();
    if let Some(path) = &options.port {
        selected.push(("port", ConnectionMode::Native(NativeTarget::Serial(path.clone()))));
    }
    if let Some(address) = &options.ble_port {
        selected.push(("ble_port", ConnectionMode::Native(NativeTarget::Ble(address.clone()))));
    }
    if let Some(address) = &options.tcp_port {
        selected.push(("tcp_port", ConnectionMode::Native(parse_tcp_target(address)?)));
    }
    if let Some(host) = &options.android_tcp_host {
        selected.push((
            "android_tcp_host",
            ConnectionMode::Bridged {
                host: host.clone(),
                port: options.android_tcp_port.unwrap_or(DEFAULT_TCP_PORT),
            },
        ));
    }

    if selected.len() > 1 {
        let names: Vec<&str> = selected.iter().map(|(name, _)| *name).collect();
        return Err(ConfigError::ConflictingModes(names.join(", ")));
    }
    selected
        .pop()
        .map(|(_, mode)| mode)
        .ok_or(ConfigError::MissingMode)
}

fn parse_tcp_target(address: &str) -> Result<NativeTarget, ConfigError> {
    let invalid = || ConfigError::InvalidTcpAddress(address.to_owned());
    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
        None => (address, DEFAULT_TCP_PORT),
    };
    if host.is_empty() {
        return Err(invalid());
    }
    Ok(NativeTarget::Tcp {
        host: host.to_owned(),
        port,
    })
}
