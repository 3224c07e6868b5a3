//! MQTT session adapter.
//!
//! Implements [`SessionPort`] on top of:
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//!   Client events arrive on the MQTT task and are handed over through a
//!   mutex-guarded mailbox that [`SessionPort::poll_inbound`] drains.
//! - **all other targets**: an in-memory broker that records every publish
//!   and subscription, for host-side tests.
//!
//! One `connect` call is one attempt; the connectivity manager owns retries.

use log::{info, warn};

use crate::app::ports::{InboundMessage, SessionError, SessionPort};
use crate::config::MqttSettings;

#[cfg(target_os = "espidf")]
use std::collections::VecDeque;
#[cfg(target_os = "espidf")]
use std::sync::{Arc, Mutex};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttEvent, EventPayload, MqttClientConfiguration, QoS,
};

/// How long one connect attempt waits for the broker's CONNACK.
#[cfg(target_os = "espidf")]
const CONNECT_WAIT_MS: u32 = 5_000;
#[cfg(target_os = "espidf")]
const CONNECT_POLL_MS: u32 = 100;

/// Diagnostic codes reported by [`SessionPort::state_code`].
pub mod state {
    pub const CONNECTED: i32 = 0;
    pub const DISCONNECTED: i32 = -1;
    pub const CONNECT_FAILED: i32 = -2;
    pub const CONNECTION_TIMEOUT: i32 = -4;
}

// ───────────────────────────────────────────────────────────────
// Event mailbox (ESP-IDF)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
#[derive(Default)]
struct Mailbox {
    connected: bool,
    state: i32,
    inbound: VecDeque<InboundMessage>,
}

#[cfg(target_os = "espidf")]
fn on_event(mailbox: &Mutex<Mailbox>, event: &EspMqttEvent<'_>) {
    let Ok(mut m) = mailbox.lock() else {
        return;
    };
    match event.payload() {
        EventPayload::Connected(_) => {
            m.connected = true;
            m.state = state::CONNECTED;
        }
        EventPayload::Disconnected => {
            m.connected = false;
            m.state = state::DISCONNECTED;
        }
        EventPayload::Received {
            topic: Some(topic),
            data,
            ..
        } => m.inbound.push_back(InboundMessage {
            topic: topic.into(),
            payload: data.to_vec(),
        }),
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated broker (host)
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimBroker {
    pub connected: bool,
    /// Connect attempts still to be refused.
    pub refuse_next: u32,
    pub connects: u32,
    /// Largest buffer the "heap" can provide.
    pub max_buffer: usize,
    pub published: Vec<(String, Vec<u8>)>,
    pub subscriptions: Vec<String>,
    pub inbound: std::collections::VecDeque<InboundMessage>,
    pub state: i32,
}

#[cfg(not(target_os = "espidf"))]
impl SimBroker {
    /// Queue a message as if the broker forwarded it.  Dropped unless subscribed.
    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        if self.subscriptions.iter().any(|t| t == topic) {
            self.inbound.push_back(InboundMessage {
                topic: topic.into(),
                payload: payload.to_vec(),
            });
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Session adapter
// ───────────────────────────────────────────────────────────────

pub struct MqttSession {
    url: String,
    client_id: heapless::String<32>,
    user: heapless::String<40>,
    password: heapless::String<64>,
    buffer_size: usize,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    mailbox: Arc<Mutex<Mailbox>>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
}

impl MqttSession {
    pub fn new(settings: &MqttSettings) -> Self {
        Self {
            url: format!("mqtt://{}:{}", settings.server, settings.port),
            client_id: settings.client_id.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            buffer_size: settings.initial_buffer_size,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            mailbox: Arc::new(Mutex::new(Mailbox {
                state: state::DISCONNECTED,
                ..Default::default()
            })),
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker {
                max_buffer: 16 * 1024,
                state: state::DISCONNECTED,
                ..Default::default()
            },
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&mut self) -> &mut SimBroker {
        &mut self.sim
    }

    #[cfg(target_os = "espidf")]
    fn with_mailbox<T>(&self, f: impl FnOnce(&mut Mailbox) -> T) -> Option<T> {
        self.mailbox.lock().ok().map(|mut m| f(&mut m))
    }
}

#[cfg(target_os = "espidf")]
impl SessionPort for MqttSession {
    fn is_connected(&self) -> bool {
        self.client.is_some() && self.with_mailbox(|m| m.connected).unwrap_or(false)
    }

    fn connect(&mut self) -> Result<(), SessionError> {
        use esp_idf_hal::delay::FreeRtos;

        info!("MQTT: connecting to {} as '{}'", self.url, self.client_id);
        self.client = None;
        self.with_mailbox(|m| m.connected = false);

        let conf = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            username: (!self.user.is_empty()).then_some(self.user.as_str()),
            password: (!self.password.is_empty()).then_some(self.password.as_str()),
            buffer_size: self.buffer_size,
            out_buffer_size: self.buffer_size,
            ..Default::default()
        };
        let mailbox = Arc::clone(&self.mailbox);
        let client = EspMqttClient::new_cb(&self.url, &conf, move |event| on_event(&mailbox, &event))
            .map_err(|e| {
                warn!("MQTT: client setup failed, {}", e);
                SessionError::ConnectFailed(state::CONNECT_FAILED)
            })?;
        self.client = Some(client);

        let mut waited = 0;
        while waited < CONNECT_WAIT_MS {
            if self.is_connected() {
                info!("MQTT: connected");
                return Ok(());
            }
            FreeRtos::delay_ms(CONNECT_POLL_MS);
            waited += CONNECT_POLL_MS;
        }
        self.with_mailbox(|m| m.state = state::CONNECTION_TIMEOUT);
        Err(SessionError::ConnectFailed(state::CONNECTION_TIMEOUT))
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        let client = self.client.as_mut().ok_or(SessionError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: publish to {} failed, {}", topic, e);
                SessionError::PublishFailed
            })
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        let client = self.client.as_mut().ok_or(SessionError::NotConnected)?;
        client.subscribe(topic, QoS::AtMostOnce).map(|_| ()).map_err(|e| {
            warn!("MQTT: subscribe to {} failed, {}", topic, e);
            SessionError::SubscribeFailed
        })
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// The IDF client sizes its buffers when created and fragments larger
    /// publishes itself, so the new size applies from the next connect.
    fn set_buffer_size(&mut self, size: usize) -> bool {
        if size > self.buffer_size {
            info!("MQTT: buffer {} -> {} bytes", self.buffer_size, size);
            self.buffer_size = size;
        }
        true
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.with_mailbox(|m| m.inbound.pop_front()).flatten()
    }

    fn state_code(&self) -> i32 {
        self.with_mailbox(|m| m.state).unwrap_or(state::DISCONNECTED)
    }
}

#[cfg(not(target_os = "espidf"))]
impl SessionPort for MqttSession {
    fn is_connected(&self) -> bool {
        self.sim.connected
    }

    fn connect(&mut self) -> Result<(), SessionError> {
        self.sim.connects += 1;
        info!("MQTT(sim): connecting to {} as '{}'", self.url, self.client_id);
        if self.sim.refuse_next > 0 {
            self.sim.refuse_next -= 1;
            self.sim.connected = false;
            self.sim.state = state::CONNECT_FAILED;
            return Err(SessionError::ConnectFailed(state::CONNECT_FAILED));
        }
        self.sim.connected = true;
        self.sim.state = state::CONNECTED;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        if !self.sim.connected {
            return Err(SessionError::NotConnected);
        }
        let needed = topic.len() + payload.len() + crate::connectivity::manager::PUBLISH_OVERHEAD;
        if needed > self.buffer_size {
            return Err(SessionError::BufferTooSmall {
                needed,
                capacity: self.buffer_size,
            });
        }
        self.sim.published.push((topic.into(), payload.to_vec()));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        if !self.sim.connected {
            return Err(SessionError::NotConnected);
        }
        if !self.sim.subscriptions.iter().any(|t| t == topic) {
            self.sim.subscriptions.push(topic.into());
        }
        Ok(())
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn set_buffer_size(&mut self, size: usize) -> bool {
        if size > self.sim.max_buffer {
            warn!("MQTT(sim): cannot allocate {} byte buffer", size);
            return false;
        }
        self.buffer_size = self.buffer_size.max(size);
        true
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.sim.inbound.pop_front()
    }

    fn state_code(&self) -> i32 {
        self.sim.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> MqttSession {
        MqttSession::new(&MqttSettings::default())
    }

    #[test]
    fn builds_broker_url() {
        assert_eq!(session().url(), "mqtt://raspberrypi.local:1883");
    }

    #[test]
    fn publish_requires_connection() {
        let mut s = session();
        assert_eq!(s.publish("t", b"x"), Err(SessionError::NotConnected));
        s.connect().unwrap();
        assert!(s.publish("t", b"x").is_ok());
    }

    #[test]
    fn refused_connect_reports_state() {
        let mut s = session();
        s.sim().refuse_next = 1;
        assert_eq!(s.connect(), Err(SessionError::ConnectFailed(state::CONNECT_FAILED)));
        assert_eq!(s.state_code(), state::CONNECT_FAILED);
        assert!(s.connect().is_ok());
        assert_eq!(s.sim().connects, 2);
    }

    #[test]
    fn oversize_publish_is_rejected_not_truncated() {
        let mut s = session();
        s.connect().unwrap();
        let payload = vec![b'x'; 200];
        assert!(matches!(
            s.publish("topic", &payload),
            Err(SessionError::BufferTooSmall { .. })
        ));
        assert!(s.set_buffer_size(220));
        assert!(s.publish("topic", &payload).is_ok());
        assert_eq!(s.sim().published[0].1.len(), 200);
    }

    #[test]
    fn buffer_only_grows() {
        let mut s = session();
        assert!(s.set_buffer_size(64));
        assert_eq!(s.buffer_size(), 128);
        assert!(!s.set_buffer_size(1 << 20));
        assert_eq!(s.buffer_size(), 128);
    }

    #[test]
    fn delivers_only_subscribed_topics() {
        let mut s = session();
        s.connect().unwrap();
        s.subscribe("homeassistant/status").unwrap();
        s.sim().deliver("other/topic", b"ignored");
        s.sim().deliver("homeassistant/status", b"online");
        let msg = s.poll_inbound().unwrap();
        assert_eq!(msg.topic, "homeassistant/status");
        assert_eq!(msg.payload, b"online");
        assert!(s.poll_inbound().is_none());
    }
}
