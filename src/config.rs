//! Pump configuration parameters
//!
//! Mechanical constants and scheduling timings for the dosing pump.
//! Defaults describe the 40:1 worm drive with a 15T pinion over a 40 mm
//! stroke (315 U per cartridge). Values can be overridden via NVS.

use serde::{Deserialize, Serialize};

/// Core pump configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpConfig {
    // --- Reservoir ---
    /// Full-cartridge volume in units
    pub capacity_units: f32,
    /// Volume delivered by a single motor pulse (units)
    pub dose_increment_units: f32,

    // --- Actuation ---
    /// Forward run time for one dose increment (milliseconds)
    pub pulse_duration_ms: u32,
    /// Gap between consecutive bolus pulses (milliseconds)
    pub bolus_interval_ms: u32,
    /// A basal pulse is skipped when a bolus pulse happened this recently (milliseconds)
    pub basal_yield_window_ms: u32,

    // --- Persistence ---
    /// Debounce window for state writes to flash (milliseconds)
    pub save_interval_ms: u32,

    // --- Timing ---
    /// Control loop period (milliseconds)
    pub tick_period_ms: u32,
    /// Lockout after a manual prime before the button re-arms (milliseconds)
    pub prime_lockout_ms: u32,
    /// Snapshot re-broadcast period when nothing changes (milliseconds)
    pub keepalive_interval_ms: u32,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            // Reservoir
            capacity_units: 315.0,
            dose_increment_units: 0.5,

            // Actuation
            pulse_duration_ms: 55, // 19.3° of output shaft per 0.5 U
            bolus_interval_ms: 1000,
            basal_yield_window_ms: 200,

            // Persistence
            save_interval_ms: 30_000,

            // Timing
            tick_period_ms: 10,       // 100 Hz
            prime_lockout_ms: 200,
            keepalive_interval_ms: 3000,
        }
    }
}

impl PumpConfig {
    /// Number of pulses that drain a full cartridge.
    pub fn pulses_per_cartridge(&self) -> u32 {
        (self.capacity_units / self.dose_increment_units).round() as u32
    }
}
