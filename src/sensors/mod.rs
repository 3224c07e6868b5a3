//! Sensor subsystem — individual drivers behind one [`Sensor`] capability.
//!
//! Each concrete sensor (particulate, CO2, temperature, humidity, link
//! quality) produces a single [`Reading`] per call.  Uniform polling code
//! in [`TelemetryBuilder`](crate::telemetry::TelemetryBuilder) drives them
//! through `Box<dyn Sensor>` handles held by the
//! [`SensorRegistry`](crate::registry::SensorRegistry), never knowing which
//! wire protocol sits underneath.
//!
//! A failed read is [`Reading::Unavailable`], which renders as
//! [`UNAVAILABLE_MARKER`].  It is never zero: zero is a legitimate reading.

pub mod co2;
pub mod pms;
pub mod serial;
pub mod sht;
pub mod signal;

use core::fmt;

use serde::{Serialize, Serializer};

/// Literal emitted in place of a value when a sensor could not be read.
pub const UNAVAILABLE_MARKER: &str = "NULL";

/// One sensor value, or the "no value" sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// Whole-number quantity (ppm, µg/m³, dBm).
    Integer(i64),
    /// Fractional quantity, kept at two decimals (°C, %RH).
    Decimal(f32),
    /// The sensor did not answer, or answered with a corrupt frame.
    Unavailable,
}

impl Reading {
    /// Build a two-decimal reading.  Non-finite input is treated as a failed read.
    pub fn decimal(value: f32) -> Self {
        if value.is_finite() {
            Self::Decimal((value * 100.0).round() / 100.0)
        } else {
            Self::Unavailable
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Unavailable)
    }
}

impl From<Option<u16>> for Reading {
    fn from(value: Option<u16>) -> Self {
        value.map_or(Self::Unavailable, |v| Self::Integer(v as i64))
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Decimal(v) => write!(f, "{:.2}", v),
            Self::Unavailable => f.write_str(UNAVAILABLE_MARKER),
        }
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Decimal(v) => serializer.serialize_f32(*v),
            Self::Unavailable => serializer.serialize_str(UNAVAILABLE_MARKER),
        }
    }
}

/// The single capability every sensor exposes: produce the current reading.
///
/// Implementations absorb their own retries and timeouts; a call always
/// returns, and a failure is reported as [`Reading::Unavailable`].
pub trait Sensor {
    fn read(&mut self) -> Reading;
}
