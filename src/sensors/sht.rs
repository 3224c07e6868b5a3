//! Sensirion SHT3x temperature / humidity transducer on I2C, and the pair
//! of [`Sensor`]s that share it.
//!
//! One measurement yields both quantities, so the temperature and humidity
//! readers share a single cached sample: whichever is read first triggers
//! the measurement and the other reuses it.  Once both have consumed the
//! sample the pair starts a new cycle.

use core::cell::RefCell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::warn;

use super::{Reading, Sensor};
use crate::error::SensorError;

/// Default address (ADDR pin low).
pub const DEFAULT_ADDRESS: u8 = 0x44;

/// Single shot, high repeatability, no clock stretching.
const CMD_MEASURE_HIGH: [u8; 2] = [0x24, 0x00];
/// Worst-case high-repeatability conversion time.
const MEASURE_TIME_MS: u32 = 15;

/// One measurement from the transducer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Something that measures temperature and relative humidity together.
pub trait Thermohygrometer {
    fn sample(&mut self) -> Result<ClimateSample, SensorError>;
}

/// CRC-8, polynomial 0x31, init 0xFF.
pub(crate) fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data.iter().copied() {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 == 0 {
                crc <<= 1;
            } else {
                crc = (crc << 1) ^ 0x31u8;
            }
        }
    }
    crc
}

pub struct Sht3x<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> Sht3x<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn word(chunk: &[u8]) -> Result<u16, SensorError> {
        if crc8(&chunk[..2]) != chunk[2] {
            return Err(SensorError::CrcMismatch);
        }
        Ok(u16::from_be_bytes([chunk[0], chunk[1]]))
    }
}

impl<I2C: I2c, D: DelayNs> Thermohygrometer for Sht3x<I2C, D> {
    fn sample(&mut self) -> Result<ClimateSample, SensorError> {
        self.i2c
            .write(self.address, &CMD_MEASURE_HIGH)
            .map_err(|_| SensorError::BusError)?;
        self.delay.delay_ms(MEASURE_TIME_MS);

        let mut buf = [0u8; 6];
        self.i2c
            .read(self.address, &mut buf)
            .map_err(|_| SensorError::BusError)?;

        let t_raw = Self::word(&buf[0..3])? as f32;
        let rh_raw = Self::word(&buf[3..6])? as f32;
        Ok(ClimateSample {
            temperature_c: -45.0 + 175.0 * t_raw / 65535.0,
            humidity_pct: 100.0 * rh_raw / 65535.0,
        })
    }
}

// ───────────────────────────────────────────────────────────────
// Shared acquisition
// ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Channel {
    Temperature,
    Humidity,
}

struct Acquisition<T> {
    transducer: T,
    sample: Option<Result<ClimateSample, SensorError>>,
    temperature_taken: bool,
    humidity_taken: bool,
}

impl<T: Thermohygrometer> Acquisition<T> {
    fn take(&mut self, channel: Channel) -> Result<ClimateSample, SensorError> {
        let taken = match channel {
            Channel::Temperature => self.temperature_taken,
            Channel::Humidity => self.humidity_taken,
        };
        let sample = match self.sample {
            Some(sample) if !taken => sample,
            _ => {
                let fresh = self.transducer.sample();
                if let Err(e) = fresh {
                    warn!("SHT: measurement failed ({})", e);
                }
                self.sample = Some(fresh);
                self.temperature_taken = false;
                self.humidity_taken = false;
                fresh
            }
        };

        match channel {
            Channel::Temperature => self.temperature_taken = true,
            Channel::Humidity => self.humidity_taken = true,
        }
        if self.temperature_taken && self.humidity_taken {
            self.sample = None;
            self.temperature_taken = false;
            self.humidity_taken = false;
        }
        sample
    }
}

/// Owner of one transducer shared by a temperature and a humidity reader.
pub struct SharedClimate<T> {
    inner: Rc<RefCell<Acquisition<T>>>,
}

impl<T: Thermohygrometer> SharedClimate<T> {
    pub fn new(transducer: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Acquisition {
                transducer,
                sample: None,
                temperature_taken: false,
                humidity_taken: false,
            })),
        }
    }

    pub fn temperature_reader(&self) -> TemperatureSensor<T> {
        TemperatureSensor {
            inner: Rc::clone(&self.inner),
        }
    }

    pub fn humidity_reader(&self) -> HumiditySensor<T> {
        HumiditySensor {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Temperature in °C.
pub struct TemperatureSensor<T> {
    inner: Rc<RefCell<Acquisition<T>>>,
}

/// Relative humidity in %.
pub struct HumiditySensor<T> {
    inner: Rc<RefCell<Acquisition<T>>>,
}

impl<T: Thermohygrometer> Sensor for TemperatureSensor<T> {
    fn read(&mut self) -> Reading {
        match self.inner.borrow_mut().take(Channel::Temperature) {
            Ok(s) => Reading::decimal(s.temperature_c),
            Err(_) => Reading::Unavailable,
        }
    }
}

impl<T: Thermohygrometer> Sensor for HumiditySensor<T> {
    fn read(&mut self) -> Reading {
        match self.inner.borrow_mut().take(Channel::Humidity) {
            Ok(s) => Reading::decimal(s.humidity_pct),
            Err(_) => Reading::Unavailable,
        }
    }
}
