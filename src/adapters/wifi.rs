//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`], the hexagonal boundary for the network link.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: a simulated station for host-side tests.
//!
//! The adapter makes one attempt per call.  Retry counting and backoff
//! belong to the connectivity manager.

use log::{info, warn};

use crate::app::ports::{LinkError, LinkPort};
use crate::config::WifiCredentials;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(LinkError::InvalidSsid);
    }
    if !ssid.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Simulated station
// ───────────────────────────────────────────────────────────────

/// Host stand-in for the radio.  Fails the next `fail_next` connects.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimStation {
    pub associated: bool,
    pub fail_next: u32,
    pub attempts: u32,
    pub rssi: i8,
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimStation,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            sim: SimStation {
                rssi: -60,
                ..Default::default()
            },
        }
    }

    pub fn set_credentials(&mut self, credentials: &WifiCredentials) -> Result<(), LinkError> {
        validate_ssid(&credentials.ssid)?;
        validate_password(&credentials.password)?;
        self.ssid = credentials.ssid.clone();
        self.password = credentials.password.clone();
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    /// First association at boot.
    pub fn connect(&mut self) -> Result<(), LinkError> {
        if self.ssid.is_empty() {
            return Err(LinkError::NoCredentials);
        }
        info!("WiFi: connecting to '{}'", self.ssid);
        match self.platform_connect() {
            Ok(()) => {
                info!("WiFi: connected (RSSI={:?})", self.rssi());
                Ok(())
            }
            Err(e) => {
                warn!("WiFi: connection failed, {}", e);
                Err(e)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&mut self) -> &mut SimStation {
        &mut self.sim
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), LinkError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| LinkError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| LinkError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });
        let fail = |e: esp_idf_svc::sys::EspError| {
            warn!("WiFi(espidf): {}", e);
            LinkError::ConnectionFailed
        };
        self.wifi.set_configuration(&config).map_err(fail)?;
        if !self.wifi.is_started().map_err(fail)? {
            self.wifi.start().map_err(fail)?;
        }
        self.wifi.connect().map_err(fail)?;
        self.wifi.wait_netif_up().map_err(fail)?;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), LinkError> {
        self.sim.attempts += 1;
        if self.sim.fail_next > 0 {
            self.sim.fail_next -= 1;
            warn!("WiFi(sim): simulated failure (attempt {})", self.sim.attempts);
            self.sim.associated = false;
            return Err(LinkError::ConnectionFailed);
        }
        self.sim.associated = true;
        info!("WiFi(sim): associated with '{}' (attempt {})", self.ssid, self.sim.attempts);
        Ok(())
    }

    /// `esp_wifi_sta_get_ap_info` result: 0 while associated.
    #[cfg(target_os = "espidf")]
    fn ap_info(&self) -> (i32, Option<i8>) {
        let mut info = esp_idf_svc::sys::wifi_ap_record_t::default();
        // SAFETY: `info` is a valid out-pointer for the duration of the call.
        let code = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut info) };
        (code, (code == 0).then_some(info.rssi))
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

impl LinkPort for WifiAdapter {
    #[cfg(target_os = "espidf")]
    fn is_up(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_up(&self) -> bool {
        self.sim.associated
    }

    fn reconnect(&mut self) -> Result<(), LinkError> {
        if self.ssid.is_empty() {
            return Err(LinkError::NoCredentials);
        }
        self.platform_connect()
    }

    #[cfg(target_os = "espidf")]
    fn status_code(&self) -> i32 {
        self.ap_info().0
    }

    #[cfg(not(target_os = "espidf"))]
    fn status_code(&self) -> i32 {
        if self.sim.associated { 0 } else { -1 }
    }

    #[cfg(target_os = "espidf")]
    fn rssi(&self) -> Option<i8> {
        self.ap_info().1
    }

    #[cfg(not(target_os = "espidf"))]
    fn rssi(&self) -> Option<i8> {
        self.sim.associated.then_some(self.sim.rssi)
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
