//! Monotonic clock adapter, implementing [`ClockPort`].
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()`, the ESP-IDF
//!   high-resolution timer (microseconds since boot).
//! - **all other targets**: `std::time::Instant` taken at construction.

use crate::app::ports::ClockPort;

#[derive(Debug, Clone, Copy)]
pub struct TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        // SAFETY: reads a free-running hardware timer; no preconditions.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl ClockPort for TimeAdapter {
    fn uptime_ms(&self) -> u64 {
        self.uptime_us() / 1_000
    }
}
