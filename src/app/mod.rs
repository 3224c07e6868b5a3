//! Application core — the poll-and-publish loop with zero direct I/O.
//!
//! Network, reset and storage interaction happens through the **port
//! traits** in [`ports`], keeping this layer testable without hardware.

pub mod ports;
pub mod service;
