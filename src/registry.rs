//! The ordered set of sensors this node reports.
//!
//! Each entry binds a [`SensorDescriptor`] (display name, JSON key, unit,
//! Home Assistant device class) to the [`Sensor`] that produces its value.
//! The same ordered list drives both the telemetry payload and the
//! discovery announcements, so the two cannot drift apart.  Entries are
//! fixed once the registry is built.

use core::fmt;

use crate::sensors::{Reading, Sensor};

/// Home Assistant sensor device classes used by this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    SignalStrength,
    CarbonDioxide,
    Pm1,
    Pm25,
    Pm10,
    Temperature,
    Humidity,
}

impl DeviceClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SignalStrength => "signal_strength",
            Self::CarbonDioxide => "carbon_dioxide",
            Self::Pm1 => "pm1",
            Self::Pm25 => "pm25",
            Self::Pm10 => "pm10",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata for one reported quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDescriptor {
    /// Human label, e.g. "CO2".
    pub name: &'static str,
    /// Key in the state payload, e.g. "rco2".
    pub key: &'static str,
    /// Unit of measurement, e.g. "ppm".
    pub unit: &'static str,
    pub class: DeviceClass,
}

impl SensorDescriptor {
    pub const fn new(
        name: &'static str,
        key: &'static str,
        unit: &'static str,
        class: DeviceClass,
    ) -> Self {
        Self {
            name,
            key,
            unit,
            class,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    EmptyKey,
    DuplicateKey(&'static str),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyKey => write!(f, "sensor key must not be empty"),
            Self::DuplicateKey(key) => write!(f, "sensor key '{}' registered twice", key),
        }
    }
}

struct Entry {
    descriptor: SensorDescriptor,
    sensor: Box<dyn Sensor>,
}

/// Ordered, immutable list of (descriptor, sensor) pairs.
pub struct SensorRegistry {
    entries: Vec<Entry>,
}

impl SensorRegistry {
    /// Build from declaration-ordered pairs.  Keys must be unique and non-empty.
    pub fn new(
        sensors: impl IntoIterator<Item = (SensorDescriptor, Box<dyn Sensor>)>,
    ) -> Result<Self, RegistryError> {
        let mut entries: Vec<Entry> = Vec::new();
        for (descriptor, sensor) in sensors {
            if descriptor.key.is_empty() {
                return Err(RegistryError::EmptyKey);
            }
            if entries.iter().any(|e| e.descriptor.key == descriptor.key) {
                return Err(RegistryError::DuplicateKey(descriptor.key));
            }
            entries.push(Entry { descriptor, sensor });
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptors in declaration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &SensorDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Read every sensor once, strictly in declaration order.
    pub fn read_each(&mut self, mut f: impl FnMut(&SensorDescriptor, Reading)) {
        for entry in self.entries.iter_mut() {
            let reading = entry.sensor.read();
            f(&entry.descriptor, reading);
        }
    }
}
