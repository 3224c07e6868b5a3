//! One poll round per tick: inbound, telemetry, publish.
//!
//! [`NodeService`] owns the sensor registry and the connectivity manager.
//! All I/O reaches it through the port traits, so the whole round can be
//! driven on the host with mock adapters.
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  SensorRegistry │          NodeService          │ ──▶ SessionPort
//!  ─────────────▶ │ inbound · telemetry · publish │
//!     LinkPort ──▶└──────────────────────────────┘
//! ```

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::ports::{LinkPort, SessionError, SessionPort, SystemPort};
use crate::connectivity::ConnectivityManager;
use crate::error::Result;
use crate::registry::SensorRegistry;
use crate::sensors::signal::RssiGauge;
use crate::telemetry::{TelemetryBuilder, TelemetryPayload};

pub struct NodeService<L, S, D, R> {
    registry: SensorRegistry,
    manager: ConnectivityManager<L, S, D, R>,
    signal: RssiGauge,
    rounds: u64,
}

impl<L, S, D, R> NodeService<L, S, D, R>
where
    L: LinkPort,
    S: SessionPort,
    D: DelayNs,
    R: SystemPort,
{
    /// `signal` is the gauge read by the registry's link-quality sensor, if any.
    pub fn new(
        registry: SensorRegistry,
        manager: ConnectivityManager<L, S, D, R>,
        signal: RssiGauge,
    ) -> Self {
        Self {
            registry,
            manager,
            signal,
            rounds: 0,
        }
    }

    /// Bring the connection up (or restart) and announce every sensor.
    pub fn start(&mut self) {
        self.manager.ensure_connected();
        let sent = self.manager.announce(&self.registry);
        if sent < self.registry.len() {
            warn!("Discovery: {}/{} announcements sent", sent, self.registry.len());
        }
        info!("Node started, publishing to {}", self.manager.topics().state());
    }

    /// One round: handle inbound messages, read every sensor, publish.
    pub fn tick(&mut self) -> Result<TelemetryPayload> {
        self.manager.process_inbound();
        self.signal.set(self.manager.link().rssi());

        let payload = TelemetryBuilder::build(&mut self.registry);
        let json = payload.to_json().map_err(|e| {
            warn!("Telemetry: could not encode payload, {}", e);
            SessionError::PublishFailed
        })?;
        self.manager.publish_state(&json)?;
        self.rounds += 1;
        Ok(payload)
    }

    /// Rounds published since boot.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn manager(&self) -> &ConnectivityManager<L, S, D, R> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConnectivityManager<L, S, D, R> {
        &mut self.manager
    }
}
