//! Home Assistant MQTT discovery payloads.
//!
//! One message per registered sensor, published to
//! [`Topics::discovery`].  Field names use Home Assistant's abbreviated
//! schema.

use serde::Serialize;

use super::topics::Topics;
use crate::registry::SensorDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryMessage {
    pub dev_cla: &'static str,
    pub uniq_id: String,
    pub name: String,
    pub stat_t: String,
    pub unit_of_meas: &'static str,
    pub val_tpl: String,
}

impl DiscoveryMessage {
    pub fn new(descriptor: &SensorDescriptor, topics: &Topics, node_name: &str) -> Self {
        Self {
            dev_cla: descriptor.class.as_str(),
            uniq_id: topics.unique_id(descriptor.key),
            name: format!("{} {}", node_name, descriptor.name),
            stat_t: topics.state().into(),
            unit_of_meas: descriptor.unit,
            val_tpl: format!("{{{{ value_json.{} }}}}", descriptor.key),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
