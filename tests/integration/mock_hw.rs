//! Mock network adapters for integration tests.
//!
//! Records every port call so tests can assert on the full history
//! without a radio or a broker.  The link's "up" flag is shared with the
//! session so a publish can be checked against the link state at the
//! moment it happened.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use airnode::app::ports::{
    InboundMessage, LinkError, LinkPort, SessionError, SessionPort, SystemPort,
};
use airnode::sensors::{Reading, Sensor};

// ── Link ──────────────────────────────────────────────────────

pub struct MockLink {
    pub up: Rc<Cell<bool>>,
    /// Reconnect attempt number that brings the link back, if any.
    pub heal_on_attempt: Option<u32>,
    pub reconnects: u32,
    pub rssi: i8,
}

#[allow(dead_code)]
impl MockLink {
    pub fn up() -> Self {
        Self::with_state(true)
    }

    pub fn down() -> Self {
        Self::with_state(false)
    }

    fn with_state(up: bool) -> Self {
        Self {
            up: Rc::new(Cell::new(up)),
            heal_on_attempt: None,
            reconnects: 0,
            rssi: -58,
        }
    }

    pub fn healing_on(mut self, attempt: u32) -> Self {
        self.heal_on_attempt = Some(attempt);
        self
    }
}

impl LinkPort for MockLink {
    fn is_up(&self) -> bool {
        self.up.get()
    }

    fn reconnect(&mut self) -> Result<(), LinkError> {
        self.reconnects += 1;
        if self.heal_on_attempt == Some(self.reconnects) {
            self.up.set(true);
            Ok(())
        } else {
            Err(LinkError::ConnectionFailed)
        }
    }

    fn status_code(&self) -> i32 {
        if self.up.get() { 0 } else { -1 }
    }

    fn rssi(&self) -> Option<i8> {
        self.up.get().then_some(self.rssi)
    }
}

// ── Session ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct PublishRecord {
    pub topic: String,
    pub payload: String,
    /// Link state when the publish was issued.
    pub link_up: bool,
    /// Session state when the publish was issued.
    pub connected: bool,
}

pub struct MockSession {
    pub link_up: Rc<Cell<bool>>,
    pub connected: bool,
    pub heal_on_attempt: Option<u32>,
    pub connects: u32,
    pub buffer: usize,
    pub buffer_history: Vec<usize>,
    pub published: Vec<PublishRecord>,
    pub subscribed: Vec<String>,
    pub inbound: VecDeque<InboundMessage>,
    /// Publishes that drop the connection and fail before any succeeds.
    pub drop_on_publish: u32,
}

#[allow(dead_code)]
impl MockSession {
    /// A session observing `link`'s state.
    pub fn for_link(link: &MockLink, connected: bool) -> Self {
        Self {
            link_up: Rc::clone(&link.up),
            connected,
            heal_on_attempt: None,
            connects: 0,
            buffer: 128,
            buffer_history: Vec::new(),
            published: Vec::new(),
            subscribed: Vec::new(),
            inbound: VecDeque::new(),
            drop_on_publish: 0,
        }
    }

    pub fn healing_on(mut self, attempt: u32) -> Self {
        self.heal_on_attempt = Some(attempt);
        self
    }

    pub fn dropping_publishes(mut self, count: u32) -> Self {
        self.drop_on_publish = count;
        self
    }

    pub fn state_publishes(&self) -> Vec<&PublishRecord> {
        self.published
            .iter()
            .filter(|p| p.topic.ends_with("/state"))
            .collect()
    }

    pub fn discovery_publishes(&self) -> Vec<&PublishRecord> {
        self.published
            .iter()
            .filter(|p| p.topic.ends_with("/config"))
            .collect()
    }
}

impl SessionPort for MockSession {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn connect(&mut self) -> Result<(), SessionError> {
        self.connects += 1;
        if self.heal_on_attempt == Some(self.connects) {
            self.connected = true;
            Ok(())
        } else {
            Err(SessionError::ConnectFailed(-2))
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), SessionError> {
        if self.drop_on_publish > 0 {
            self.drop_on_publish -= 1;
            self.connected = false;
            return Err(SessionError::PublishFailed);
        }
        let needed = topic.len() + payload.len() + 10;
        if needed > self.buffer {
            return Err(SessionError::BufferTooSmall {
                needed,
                capacity: self.buffer,
            });
        }
        self.published.push(PublishRecord {
            topic: topic.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            link_up: self.link_up.get(),
            connected: self.connected,
        });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        self.subscribed.push(topic.into());
        Ok(())
    }

    fn buffer_size(&self) -> usize {
        self.buffer
    }

    fn set_buffer_size(&mut self, size: usize) -> bool {
        self.buffer_history.push(size);
        self.buffer = size;
        true
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.inbound.pop_front()
    }

    fn state_code(&self) -> i32 {
        if self.connected { 0 } else { -1 }
    }
}

// ── Delay ─────────────────────────────────────────────────────

/// Delay that records the total requested wait without sleeping.
#[derive(Clone, Default)]
pub struct MockDelay {
    pub total_ms: Rc<Cell<u64>>,
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ms.set(self.total_ms.get() + u64::from(ns) / 1_000_000);
    }
}

// ── System ────────────────────────────────────────────────────

pub const RESTART_PANIC: &str = "device restart requested";

/// Restart is observable as a panic; tests wrap calls in `catch_unwind`.
pub struct MockSystem;

impl SystemPort for MockSystem {
    fn restart(&mut self) -> ! {
        panic!("{}", RESTART_PANIC);
    }
}

// ── Sensors ───────────────────────────────────────────────────

/// Returns a fixed reading and counts how often it was asked.
pub struct FixedSensor {
    pub value: Reading,
    pub reads: Rc<Cell<u32>>,
}

#[allow(dead_code)]
impl FixedSensor {
    pub fn new(value: Reading) -> (Self, Rc<Cell<u32>>) {
        let reads = Rc::new(Cell::new(0));
        (
            Self {
                value,
                reads: Rc::clone(&reads),
            },
            reads,
        )
    }
}

impl Sensor for FixedSensor {
    fn read(&mut self) -> Reading {
        self.reads.set(self.reads.get() + 1);
        self.value
    }
}
