//! Node configuration parameters
//!
//! Everything the device needs to rebuild its state after a restart:
//! WiFi credentials, broker settings, discovery identity, retry budgets and timing.
//! Values are supplied by the provisioning portal and persisted through
//! [`ConfigPort`](crate::app::ports::ConfigPort).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// MQTT broker connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttSettings {
    /// Broker hostname or IP
    pub server: heapless::String<64>,
    pub port: u16,
    /// Empty = anonymous
    pub user: heapless::String<40>,
    pub password: heapless::String<64>,
    pub client_id: heapless::String<32>,
    /// Starting size of the client's send buffer (bytes).  Grows on demand.
    pub initial_buffer_size: usize,
}

/// WiFi station credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    /// Empty = open network
    pub password: heapless::String<64>,
}

/// Escalation-ladder budgets used by the connectivity manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// WiFi reconnect attempts before giving up on the link
    pub link_attempts: u8,
    /// MQTT reconnect attempts before giving up on the session
    pub session_attempts: u8,
    /// Pause before each reconnect attempt (milliseconds)
    pub backoff_ms: u32,
    /// Pause between the final diagnostic and the restart (milliseconds)
    pub restart_delay_ms: u32,
}

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub wifi: WifiCredentials,
    pub mqtt: MqttSettings,

    // --- Discovery identity ---
    /// Home Assistant discovery prefix
    pub discovery_prefix: heapless::String<32>,
    /// Human-facing device name, also the first half of the node id
    pub node_name: heapless::String<32>,

    pub retry: RetryPolicy,

    // --- Timing ---
    /// Delay between telemetry rounds (milliseconds)
    pub poll_interval_ms: u32,
    /// CO2 sensor heat-up wait after a successful first read (milliseconds)
    pub co2_warmup_ms: u32,
}

/// Copy `s` into a bounded string, truncating at capacity.
pub fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            server: bounded("raspberrypi.local"),
            port: 1883,
            user: heapless::String::new(),
            password: heapless::String::new(),
            client_id: bounded("airnode"),
            initial_buffer_size: 128,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            link_attempts: 3,
            session_attempts: 3,
            backoff_ms: 5_000,
            restart_delay_ms: 5_000,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            wifi: WifiCredentials::default(),
            mqtt: MqttSettings::default(),
            discovery_prefix: bounded("homeassistant"),
            node_name: bounded("air_gradient"),
            retry: RetryPolicy::default(),
            poll_interval_ms: 2_000,
            co2_warmup_ms: 10_000,
        }
    }
}

impl NodeConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.server.is_empty() {
            return Err(ConfigError::ValidationFailed("mqtt.server must not be empty"));
        }
        if self.mqtt.port == 0 {
            return Err(ConfigError::ValidationFailed("mqtt.port must be 1-65535"));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::ValidationFailed("mqtt.client_id must not be empty"));
        }
        if !(64..=4096).contains(&self.mqtt.initial_buffer_size) {
            return Err(ConfigError::ValidationFailed(
                "mqtt.initial_buffer_size must be 64-4096",
            ));
        }
        if !is_topic_segment(&self.discovery_prefix) {
            return Err(ConfigError::ValidationFailed(
                "discovery_prefix must be non-empty and free of '/', '+', '#' and spaces",
            ));
        }
        if !is_topic_segment(&self.node_name) {
            return Err(ConfigError::ValidationFailed(
                "node_name must be non-empty and free of '/', '+', '#' and spaces",
            ));
        }
        if !(1..=10).contains(&self.retry.link_attempts) {
            return Err(ConfigError::ValidationFailed("retry.link_attempts must be 1-10"));
        }
        if !(1..=10).contains(&self.retry.session_attempts) {
            return Err(ConfigError::ValidationFailed("retry.session_attempts must be 1-10"));
        }
        if self.retry.backoff_ms > 60_000 {
            return Err(ConfigError::ValidationFailed("retry.backoff_ms must be <= 60000"));
        }
        if self.retry.restart_delay_ms > 60_000 {
            return Err(ConfigError::ValidationFailed(
                "retry.restart_delay_ms must be <= 60000",
            ));
        }
        if !(500..=3_600_000).contains(&self.poll_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "poll_interval_ms must be 500-3600000",
            ));
        }
        if self.co2_warmup_ms > 60_000 {
            return Err(ConfigError::ValidationFailed("co2_warmup_ms must be <= 60000"));
        }
        Ok(())
    }
}

fn is_topic_segment(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| (0x21..=0x7E).contains(&b) && !matches!(b, b'/' | b'+' | b'#'))
}
