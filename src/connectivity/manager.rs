//! Owns the link and session and keeps them usable.
//!
//! ## Escalation ladder
//!
//! ```text
//!  Disconnected ──link down──▶ WiFiRetrying ──link up──▶ MqttRetrying ──▶ Connected
//!       │                           │                        │
//!       │                   budget spent, link down   budget spent, session down
//!       │                           └──────────┬─────────────┘
//!       └──link up, session down──▶ MqttRetrying
//!                                              ▼
//!                                 diagnostics → wait → restart
//! ```
//!
//! Each layer gets `RetryPolicy::{link,session}_attempts` tries, each
//! preceded by `backoff_ms`.  The session is only retried while the link
//! is up; a dead link is fatal whatever the session reports.  Restart is
//! the recovery of last resort: every piece of device state is rebuilt
//! from configuration and fresh readings on the next boot.
//!
//! Connection state is never cached.  [`ConnectivityManager::state`] asks
//! both ports on every call.

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use super::discovery::DiscoveryMessage;
use super::topics::{Topics, CATALOG_STATUS_TOPIC};
use crate::app::ports::{InboundMessage, LinkPort, SessionError, SessionPort, SystemPort};
use crate::config::{NodeConfig, RetryPolicy};
use crate::registry::SensorRegistry;

/// Bytes added to topic + payload when sizing the client send buffer.
pub const PUBLISH_OVERHEAD: usize = 10;

/// Connection state.  [`ConnectivityManager::state`] only ever reports
/// `Connected` or `Disconnected`; the two retrying states exist only while
/// [`ConnectivityManager::recover`] runs and are visible in its log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    WiFiRetrying,
    MqttRetrying,
    Connected,
}

/// Which layer was still down when its retry budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedLayer {
    Link,
    Session,
    Both,
}

impl fmt::Display for FailedLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link => write!(f, "WiFi"),
            Self::Session => write!(f, "MQTT"),
            Self::Both => write!(f, "WiFi and MQTT"),
        }
    }
}

/// Outcome of one pass through the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Restored {
        link_attempts: u8,
        session_attempts: u8,
    },
    Exhausted(FailedLayer),
}

pub struct ConnectivityManager<L, S, D, R> {
    link: L,
    session: S,
    delay: D,
    system: R,
    topics: Topics,
    node_name: String,
    retry: RetryPolicy,
}

impl<L, S, D, R> ConnectivityManager<L, S, D, R>
where
    L: LinkPort,
    S: SessionPort,
    D: DelayNs,
    R: SystemPort,
{
    pub fn new(link: L, session: S, delay: D, system: R, config: &NodeConfig, chip_id: u32) -> Self {
        let topics = Topics::new(&config.discovery_prefix, &config.node_name, chip_id);
        info!("Connectivity: node id {}", topics.node_id());
        Self {
            link,
            session,
            delay,
            system,
            topics,
            node_name: config.node_name.as_str().into(),
            retry: config.retry,
        }
    }

    // ── State ─────────────────────────────────────────────────

    /// Live state from the two ports.  Retrying states are only ever
    /// entered inside [`recover`](Self::recover).
    pub fn state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_up() && self.session.is_connected()
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Recompute every topic after an identity change.
    pub fn reidentify(&mut self, prefix: &str, node_name: &str, chip_id: u32) {
        self.topics = Topics::new(prefix, node_name, chip_id);
        self.node_name = node_name.into();
        info!("Connectivity: node id now {}", self.topics.node_id());
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    // ── Escalation ladder ─────────────────────────────────────

    /// Run the reconnect ladder once.  Never restarts.
    pub fn recover(&mut self) -> Recovery {
        let mut link_attempts = 0u8;
        if !self.link.is_up() {
            self.enter(ConnectionState::WiFiRetrying);
            while link_attempts < self.retry.link_attempts && !self.link.is_up() {
                link_attempts += 1;
                warn!(
                    "WiFi not connected, retrying in {} ms ({}/{}), status={}",
                    self.retry.backoff_ms,
                    link_attempts,
                    self.retry.link_attempts,
                    self.link.status_code()
                );
                self.delay.delay_ms(self.retry.backoff_ms);
                if let Err(e) = self.link.reconnect() {
                    warn!("WiFi: reconnect failed, {}", e);
                }
            }
        }

        let mut session_attempts = 0u8;
        if self.link.is_up() && !self.session.is_connected() {
            self.enter(ConnectionState::MqttRetrying);
            while session_attempts < self.retry.session_attempts && !self.session.is_connected() {
                session_attempts += 1;
                warn!(
                    "MQTT not connected, retrying in {} ms ({}/{}), state={}",
                    self.retry.backoff_ms,
                    session_attempts,
                    self.retry.session_attempts,
                    self.session.state_code()
                );
                self.delay.delay_ms(self.retry.backoff_ms);
                if let Err(e) = self.session.connect() {
                    warn!("MQTT: connect failed, {}", e);
                }
            }
        }

        match (self.link.is_up(), self.session.is_connected()) {
            (true, true) => {
                self.enter(ConnectionState::Connected);
                info!(
                    "Connection re-established after {} WiFi attempts and {} MQTT attempts",
                    link_attempts, session_attempts
                );
                Recovery::Restored {
                    link_attempts,
                    session_attempts,
                }
            }
            (false, true) => Recovery::Exhausted(FailedLayer::Link),
            (true, false) => Recovery::Exhausted(FailedLayer::Session),
            (false, false) => Recovery::Exhausted(FailedLayer::Both),
        }
    }

    /// Return once both layers are up, or restart the device.
    pub fn ensure_connected(&mut self) {
        if self.is_connected() {
            return;
        }
        if let Recovery::Exhausted(layer) = self.recover() {
            self.restart_after_failure(layer);
        }
    }

    fn restart_after_failure(&mut self, layer: FailedLayer) -> ! {
        if matches!(layer, FailedLayer::Link | FailedLayer::Both) {
            error!(
                "WiFi still down, was the router restarted? status={}",
                self.link.status_code()
            );
        }
        if matches!(layer, FailedLayer::Session | FailedLayer::Both) {
            error!(
                "Can't reach MQTT broker, is it down? state={}",
                self.session.state_code()
            );
        }
        error!(
            "{} recovery failed, rebooting in {} ms",
            layer, self.retry.restart_delay_ms
        );
        self.delay.delay_ms(self.retry.restart_delay_ms);
        self.system.restart()
    }

    fn enter(&self, state: ConnectionState) {
        info!("Connectivity: -> {:?}", state);
    }

    // ── Publishing ────────────────────────────────────────────

    /// Publish one telemetry payload to the state topic, recovering the
    /// connection first if needed.  A publish that fails because the
    /// connection dropped runs the ladder and is retried once.
    pub fn publish_state(&mut self, payload: &str) -> Result<(), SessionError> {
        if !self.is_connected() {
            warn!("Publish: not connected to WiFi or MQTT");
            self.ensure_connected();
        }
        let topic = self.topics.state().to_owned();
        info!("{} <- {}", topic, payload);
        match self.publish(&topic, payload.as_bytes()) {
            Err(e) if !self.is_connected() => {
                warn!("Publish: connection lost during publish ({}), reconnecting", e);
                self.ensure_connected();
                self.publish(&topic, payload.as_bytes())
            }
            result => result,
        }
    }

    /// Publish, growing the send buffer first if the message would not fit.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        let needed = topic.len() + payload.len() + PUBLISH_OVERHEAD;
        let capacity = self.session.buffer_size();
        if needed > capacity {
            warn!(
                "Message too large for MQTT buffer ({} > {}), increasing buffer size",
                needed, capacity
            );
            if !self.session.set_buffer_size(needed) {
                error!("MQTT: could not grow send buffer to {} bytes", needed);
                return Err(SessionError::BufferTooSmall { needed, capacity });
            }
        }
        self.session.publish(topic, payload).map_err(|e| {
            error!("Publishing to {} failed, {} (state {})", topic, e, self.session.state_code());
            e
        })
    }

    // ── Discovery ─────────────────────────────────────────────

    /// Announce every registered sensor, then subscribe to the command and
    /// catalog status topics.  Returns the number of announcements sent.
    pub fn announce(&mut self, registry: &SensorRegistry) -> usize {
        info!("Sending discovery information for {} sensors", registry.len());
        let mut sent = 0;
        for descriptor in registry.descriptors() {
            let message = DiscoveryMessage::new(descriptor, &self.topics, &self.node_name);
            let json = match message.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!("Discovery: could not encode {}, {}", descriptor.key, e);
                    continue;
                }
            };
            let topic = self.topics.discovery(descriptor.key);
            info!("{} <- {}", topic, json);
            if self.publish(&topic, json.as_bytes()).is_ok() {
                sent += 1;
            }
        }

        let command = self.topics.command().to_owned();
        for topic in [command.as_str(), CATALOG_STATUS_TOPIC] {
            if let Err(e) = self.session.subscribe(topic) {
                error!("MQTT: subscribe to {} failed, {}", topic, e);
            }
        }
        sent
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Handle every message received since the last call.
    pub fn process_inbound(&mut self) -> usize {
        let mut handled = 0;
        while let Some(message) = self.session.poll_inbound() {
            self.handle_message(&message);
            handled += 1;
        }
        handled
    }

    /// A message on the catalog status topic restarts the device so that
    /// discovery is replayed from a clean boot.
    pub fn handle_message(&mut self, message: &InboundMessage) {
        info!(
            "Message arrived in topic {}: {}",
            message.topic,
            String::from_utf8_lossy(&message.payload)
        );
        if message.topic == CATALOG_STATUS_TOPIC {
            warn!("Home Assistant change detected, restarting to replay discovery");
            self.system.restart();
        }
        if message.topic == self.topics.command() {
            info!("Command ignored, no handlers registered");
        }
    }
}
