//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ConnectivityManager / NodeService (domain)
//! ```
//!
//! Driven adapters (WiFi station, MQTT client, chip reset, NVS) implement
//! these traits.  The domain consumes them via generics, so the escalation
//! ladder and discovery logic never touch the network stack directly and
//! can be exercised on the host with mocks.
//!
//! Blocking waits are not a port of their own: the domain takes any
//! [`embedded_hal::delay::DelayNs`].

use crate::config::NodeConfig;

// ───────────────────────────────────────────────────────────────
// Link port (WiFi station)
// ───────────────────────────────────────────────────────────────

/// Network link layer.  Health is queried live on every call; callers must
/// not cache the answer.
pub trait LinkPort {
    /// Whether the station is associated and has an address.
    fn is_up(&self) -> bool;

    /// One reconnect attempt using the stored credentials.
    fn reconnect(&mut self) -> Result<(), LinkError>;

    /// Driver-specific status code, for diagnostics only.
    fn status_code(&self) -> i32;

    /// Received signal strength in dBm, when associated.
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Session port (MQTT client)
// ───────────────────────────────────────────────────────────────

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Broker session layer.
pub trait SessionPort {
    /// Whether the broker session is currently established.
    fn is_connected(&self) -> bool;

    /// One connect attempt with the configured broker, client id and credentials.
    fn connect(&mut self) -> Result<(), SessionError>;

    /// Publish `payload` to `topic`.  Fails if the combined message does not
    /// fit the current send buffer.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), SessionError>;

    /// Current send buffer capacity in bytes.
    fn buffer_size(&self) -> usize;

    /// Resize the send buffer.  Returns `false` if the allocation failed.
    fn set_buffer_size(&mut self, size: usize) -> bool;

    /// Take the next message received on a subscribed topic, if any.
    fn poll_inbound(&mut self) -> Option<InboundMessage>;

    /// Client-specific state code, for diagnostics only.
    fn state_code(&self) -> i32;
}

// ───────────────────────────────────────────────────────────────
// System port (chip reset)
// ───────────────────────────────────────────────────────────────

/// Recovery of last resort.  Device state is fully re-derivable from
/// configuration plus fresh sensor readings, so a reset loses nothing.
pub trait SystemPort {
    /// Reset the device.  Never returns.
    fn restart(&mut self) -> !;
}

// ───────────────────────────────────────────────────────────────
// Clock port (monotonic time)
// ───────────────────────────────────────────────────────────────

/// Monotonic time since boot.  Sensor read timeouts are measured against
/// it; a blocking delay can overshoot by up to one FreeRTOS tick.
pub trait ClockPort {
    fn uptime_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST call [`NodeConfig::validate`] before persisting;
/// invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`NodeConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`LinkPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    /// The access point rejected the association or did not answer.
    ConnectionFailed,
}

/// Errors from [`SessionPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Broker refused or was unreachable.  Carries the client state code.
    ConnectFailed(i32),
    NotConnected,
    /// Topic + payload + framing exceed the current send buffer.
    BufferTooSmall { needed: usize, capacity: usize },
    PublishFailed,
    SubscribeFailed,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(
                f,
                "password invalid (must be 8-64 bytes for WPA2, or empty for open)"
            ),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl core::fmt::Display for SessionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConnectFailed(state) => write!(f, "broker connect failed (state {})", state),
            Self::NotConnected => write!(f, "not connected to broker"),
            Self::BufferTooSmall { needed, capacity } => write!(
                f,
                "message needs {} bytes, send buffer is {}",
                needed, capacity
            ),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for LinkError {}
impl std::error::Error for SessionError {}
impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Corrupted => Self::Config("stored config corrupted"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::IoError => Self::Config("config storage I/O error"),
        }
    }
}
