//! ESP32 time adapter.
//!
//! Two clocks with different jobs:
//!
//! - **uptime** (monotonic ms) drives every scheduler comparison.
//! - **epoch** (wall clock ms) only stamps REST responses, and is `None`
//!   until SNTP has set the system time.
//!
//! On `espidf` builds uptime wraps `esp_timer_get_time()`; host builds use
//! `std::time::Instant` / `SystemTime`.

/// Anything before 2020-01-01 means the wall clock has not been synced.
const EPOCH_2020_MS: u64 = 1_577_836_800_000;

/// Time adapter for the ESP32 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(feature = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(feature = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(feature = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(feature = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Wall-clock milliseconds since the Unix epoch, if synced.
    pub fn epoch_ms(&self) -> Option<u64> {
        let ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?
            .as_millis() as u64;
        synced(ms)
    }
}

fn synced(ms: u64) -> Option<u64> {
    (ms >= EPOCH_2020_MS).then_some(ms)
}
