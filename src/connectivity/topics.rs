//! MQTT topic strings derived from the node identity.
//!
//! ```text
//! <prefix>/sensor/<node_id>/state            telemetry
//! <prefix>/sensor/<node_id>/command          inbound commands
//! <prefix>/sensor/<node_id>_<key>/config     per-sensor discovery
//! ```
//!
//! `node_id` is `<node_name>_<chip id in lowercase hex>`.  All strings are
//! recomputed from the identity inputs; none are edited in place.

/// Home Assistant's birth / last-will channel.  A message here means the
/// catalog was reset and discovery must be replayed.
pub const CATALOG_STATUS_TOPIC: &str = "homeassistant/status";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
    node_id: String,
    state: String,
    command: String,
}

impl Topics {
    pub fn new(prefix: &str, node_name: &str, chip_id: u32) -> Self {
        Self::from_node_id(prefix, &format!("{}_{:x}", node_name, chip_id))
    }

    pub fn from_node_id(prefix: &str, node_id: &str) -> Self {
        Self {
            prefix: prefix.into(),
            node_id: node_id.into(),
            state: format!("{}/sensor/{}/state", prefix, node_id),
            command: format!("{}/sensor/{}/command", prefix, node_id),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// `<node_id>_<key>`
    pub fn object_id(&self, key: &str) -> String {
        format!("{}_{}", self.node_id, key)
    }

    pub fn discovery(&self, key: &str) -> String {
        format!("{}/sensor/{}/config", self.prefix, self.object_id(key))
    }

    pub fn unique_id(&self, key: &str) -> String {
        format!("sensor.{}", self.object_id(key))
    }
}
