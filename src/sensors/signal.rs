//! WiFi link quality as a sensor.
//!
//! The link adapter is owned by the connectivity manager, so the sensor
//! reads a shared gauge that the service refreshes before each round.

use core::cell::Cell;
use std::rc::Rc;

use super::{Reading, Sensor};

/// Last known RSSI in dBm, `None` while not associated.
#[derive(Clone, Default)]
pub struct RssiGauge(Rc<Cell<Option<i8>>>);

impl RssiGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, rssi: Option<i8>) {
        self.0.set(rssi);
    }

    pub fn get(&self) -> Option<i8> {
        self.0.get()
    }
}

pub struct SignalStrengthSensor {
    gauge: RssiGauge,
}

impl SignalStrengthSensor {
    pub fn new(gauge: RssiGauge) -> Self {
        Self { gauge }
    }
}

impl Sensor for SignalStrengthSensor {
    fn read(&mut self) -> Reading {
        self.gauge
            .get()
            .map_or(Reading::Unavailable, |dbm| Reading::Integer(dbm as i64))
    }
}
