//! Unified error types for the AirNode firmware.
//!
//! Every subsystem error converts into [`Error`] so log lines and the
//! top-level loop can treat failures uniformly.  All variants are `Copy`;
//! none of them allocate.
//!
//! Nothing here is process-fatal.  The only deliberate terminal path is
//! the restart escalation in the connectivity manager, which is an action
//! rather than an error value.

use core::fmt;

use crate::app::ports::{LinkError, SessionError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not produce a reading.
    Sensor(SensorError),
    /// A received frame failed framing or integrity checks.
    Frame(FrameError),
    /// The WiFi link could not be brought up.
    Link(LinkError),
    /// The broker session refused an operation.
    Session(SessionError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Session(e) => write!(f, "session: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors (transient I/O)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// No reply bytes arrived within the wait budget.
    NoResponse,
    /// The reply started but stopped before it was complete.
    Truncated,
    /// Writing the request to the serial line failed.
    WriteFailed,
    /// The I2C bus returned an error.
    BusError,
    /// A word on the I2C bus failed its CRC-8 check.
    CrcMismatch,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResponse => write!(f, "no response within timeout"),
            Self::Truncated => write!(f, "reply truncated"),
            Self::WriteFailed => write!(f, "serial write failed"),
            Self::BusError => write!(f, "I2C bus error"),
            Self::CrcMismatch => write!(f, "CRC mismatch"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Framing / integrity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The declared frame length is not one of the supported sizes.
    UnsupportedLength(u16),
    /// The transmitted checksum does not match the accumulated sum.
    Checksum { expected: u16, calculated: u16 },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedLength(len) => write!(
                f,
                "unsupported frame length {len} (different sensor model or transmission error)"
            ),
            Self::Checksum {
                expected,
                calculated,
            } => write!(
                f,
                "checksum mismatch: frame says {expected:#06x}, calculated {calculated:#06x}"
            ),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl std::error::Error for Error {}
impl std::error::Error for SensorError {}
impl std::error::Error for FrameError {}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
