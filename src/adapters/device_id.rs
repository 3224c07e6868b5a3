//! Device identity derived from the ESP32 factory MAC address.
//!
//! The chip id packs the last three MAC bytes in reverse order
//! (`mac[5] << 16 | mac[4] << 8 | mac[3]`).  It is deterministic across
//! reboots and becomes the suffix of the MQTT node id.

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn chip_id(mac: &MacAddress) -> u32 {
    (mac[5] as u32) << 16 | (mac[4] as u32) << 8 | mac[3] as u32
}
