//! One poll round serialised into the state payload.
//!
//! The payload is a flat JSON object with one key per registered sensor,
//! in registry order.  A sensor that failed still gets its key, holding
//! the `"NULL"` marker, so one dead sensor never hides the others.

use log::warn;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::registry::SensorRegistry;
use crate::sensors::Reading;

/// Readings from one round, keyed and ordered as in the registry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelemetryPayload {
    fields: Vec<(&'static str, Reading)>,
}

impl TelemetryPayload {
    pub fn get(&self, key: &str) -> Option<Reading> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, r)| *r)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(&'static str, Reading)] {
        &self.fields
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for TelemetryPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, reading) in &self.fields {
            map.serialize_entry(key, reading)?;
        }
        map.end()
    }
}

pub struct TelemetryBuilder;

impl TelemetryBuilder {
    /// Read every sensor exactly once, in registry order.
    pub fn build(registry: &mut SensorRegistry) -> TelemetryPayload {
        let mut fields = Vec::with_capacity(registry.len());
        registry.read_each(|descriptor, reading| {
            if !reading.is_available() {
                warn!("{} ({}): no reading this round", descriptor.name, descriptor.key);
            }
            fields.push((descriptor.key, reading));
        });
        TelemetryPayload { fields }
    }
}
