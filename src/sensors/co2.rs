//! SenseAir S8 CO2 sensor over a Modbus-style request/response line.
//!
//! A fixed 7-byte "read input register" request yields a fixed 7-byte
//! reply with the concentration at offsets 3..5 (big-endian).  The reply
//! CRC is not verified; a reply is accepted on completeness alone.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::serial::SerialPort;
use super::{Reading, Sensor};
use crate::error::SensorError;

/// Read CO2 (input register 0x0003).
pub const CMD_READ_CO2: [u8; 7] = [0xFE, 0x44, 0x00, 0x08, 0x02, 0x9F, 0x25];
pub const REPLY_LEN: usize = 7;

/// Request resends while the line stays silent.
const SEND_ATTEMPTS: u32 = 10;
/// Waits for the rest of the reply once bytes start arriving.
const REPLY_WAITS: u32 = 10;
const POLL_INTERVAL_MS: u32 = 50;
/// Raw transactions per public read.
pub const READ_ATTEMPTS: u32 = 5;

pub struct Co2Transceiver<S, D> {
    serial: S,
    delay: D,
}

impl<S: SerialPort, D: DelayNs> Co2Transceiver<S, D> {
    pub fn new(serial: S, delay: D) -> Self {
        Self { serial, delay }
    }

    /// One request/response transaction.
    pub fn read_raw(&mut self) -> Result<u16, SensorError> {
        let mut sent = 0;
        while self.serial.available() == 0 {
            if sent == SEND_ATTEMPTS {
                return Err(SensorError::NoResponse);
            }
            // Keep asking until the sensor starts answering.
            if self.serial.write(&CMD_READ_CO2).is_err() {
                return Err(SensorError::WriteFailed);
            }
            sent += 1;
            self.delay.delay_ms(POLL_INTERVAL_MS);
        }

        let mut waits = 0;
        while self.serial.available() < REPLY_LEN {
            waits += 1;
            if waits > REPLY_WAITS {
                // Partial reply: throw it away, the read below then fails.
                while let Ok(Some(_)) = self.serial.read_byte() {}
                break;
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
        }

        let mut reply = [0u8; REPLY_LEN];
        for slot in reply.iter_mut() {
            match self.serial.read_byte() {
                Ok(Some(byte)) => *slot = byte,
                _ => return Err(SensorError::Truncated),
            }
        }
        Ok(u16::from_be_bytes([reply[3], reply[4]]))
    }
}

pub struct Co2Sensor<S, D> {
    transceiver: Co2Transceiver<S, D>,
}

impl<S: SerialPort, D: DelayNs> Co2Sensor<S, D> {
    pub fn new(serial: S, delay: D) -> Self {
        Self {
            transceiver: Co2Transceiver::new(serial, delay),
        }
    }

    /// Read the sensor once; on success, hold for `warmup_ms` while it heats up.
    pub fn init(&mut self, warmup_ms: u32) -> bool {
        info!("CO2: initialising");
        match self.transceiver.read_raw() {
            Ok(_) => {
                info!("CO2: initialised, heating up for {} ms", warmup_ms);
                self.transceiver.delay.delay_ms(warmup_ms);
                true
            }
            Err(e) => {
                warn!("CO2: init failed ({})", e);
                false
            }
        }
    }

    /// Concentration in ppm, `None` after [`READ_ATTEMPTS`] failed transactions.
    pub fn read_ppm(&mut self) -> Option<u16> {
        for attempt in 1..=READ_ATTEMPTS {
            match self.transceiver.read_raw() {
                Ok(ppm) => return Some(ppm),
                Err(e) => warn!("CO2: attempt {}/{} failed ({})", attempt, READ_ATTEMPTS, e),
            }
        }
        None
    }
}

impl<S: SerialPort, D: DelayNs> Sensor for Co2Sensor<S, D> {
    fn read(&mut self) -> Reading {
        self.read_ppm().into()
    }
}
