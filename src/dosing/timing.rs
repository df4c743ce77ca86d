//! Tick arithmetic: rates and volumes into pulse timings.
//!
//! Intervals are recomputed from the current rate on every tick, so a
//! rate change takes effect on the next tick without re-arming anything.

/// Milliseconds per hour.
const MS_PER_HOUR: f32 = 3_600_000.0;

/// "Never", returned for a zero or negative rate.
pub const NEVER_MS: u64 = u64::MAX;

/// Gap between basal pulses for an hourly `rate`.
///
/// `rate / increment` pulses per hour, evenly spaced. A rate of zero (or
/// anything non-positive or non-finite) yields [`NEVER_MS`].
pub fn basal_interval_ms(rate_per_hour: f32, dose_increment: f32) -> u64 {
    if rate_per_hour <= 0.0 || !rate_per_hour.is_finite() || dose_increment <= 0.0 {
        return NEVER_MS;
    }
    let pulses_per_hour = rate_per_hour / dose_increment;
    (MS_PER_HOUR / pulses_per_hour) as u64
}

/// Reverse run time needed to return the plunger after `delivered` units.
///
/// Each delivered increment took one `pulse_duration_ms` forward, so the
/// rewind takes the same time per increment backwards.
pub fn rewind_duration_ms(delivered: f32, dose_increment: f32, pulse_duration_ms: u32) -> u64 {
    if delivered <= 0.0 || !delivered.is_finite() || dose_increment <= 0.0 {
        return 0;
    }
    let pulses = delivered / dose_increment;
    (pulses * pulse_duration_ms as f32) as u64
}

/// Milliseconds from `earlier` to `now`, zero if the clock stepped back.
pub fn elapsed_ms(now: u64, earlier: u64) -> u64 {
    now.saturating_sub(earlier)
}
