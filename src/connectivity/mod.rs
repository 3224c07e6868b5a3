//! Connectivity — topic naming, discovery metadata and the reconnect /
//! restart escalation that keeps the node publishing.

pub mod discovery;
pub mod manager;
pub mod topics;

pub use discovery::DiscoveryMessage;
pub use manager::{ConnectionState, ConnectivityManager, FailedLayer, Recovery};
pub use topics::Topics;
