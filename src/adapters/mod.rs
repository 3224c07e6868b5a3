//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements   | Connects to                    |
//! |-------------|--------------|--------------------------------|
//! | `wifi`      | LinkPort     | ESP-IDF WiFi STA               |
//! | `mqtt`      | SessionPort  | ESP-IDF MQTT client            |
//! | `system`    | SystemPort   | Chip reset                     |
//! | `nvs`       | ConfigPort   | NVS / in-memory store          |
//! | `time`      | ClockPort    | ESP high-resolution timer      |
//! | `device_id` | —            | eFuse factory MAC              |

pub mod device_id;
pub mod mqtt;
pub mod nvs;
pub mod system;
pub mod time;
pub mod wifi;
