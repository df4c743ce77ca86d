//! Delivery-mode state.
//!
//! The exclusive part of the mode is a single [`Activity`] tag, so
//! "at most one of prime / bolus / rewind" holds by construction. Suspend,
//! the temp-basal window, and the base basal rate are orthogonal: they
//! coexist with an activity and are carried as separate fields in
//! [`ModeState`].
//!
//! ```text
//!            bolus()              pending ≤ ε / suspend / stop / empty
//!   Idle ───────────────▶ Bolusing ────────────────────────────────▶ Idle
//!    │  primeEdge()                                                  ▲
//!    ├─────────────▶ Priming ──(one pulse, synchronous)──────────────┤
//!    │  reset(), delivered > 0                                       │
//!    └─────────────▶ Rewinding ──(elapsed ≥ duration)────────────────┘
//! ```

use crate::app::events::DeviceStatus;

use super::EPSILON;

/// The exclusive activity. Exactly one is current at any instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Activity {
    Idle,
    /// A manual prime pulse is being fired (only observable from inside the pulse).
    Priming,
    /// Bolus in progress with `pending_units` still to deliver.
    Bolusing { pending_units: f32 },
    /// Reverse actuation started at `started_ms`, lasting `duration_ms`.
    Rewinding { started_ms: u64, duration_ms: u64 },
}

/// A time-bounded basal override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempBasal {
    pub rate: f32,
    /// Absolute clock value at which the override lapses.
    pub ends_at_ms: u64,
}

impl TempBasal {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.ends_at_ms
    }
}

/// Everything that describes "what the pump is doing".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeState {
    pub activity: Activity,
    pub suspended: bool,
    pub base_basal_rate: f32,
    pub temp_basal: Option<TempBasal>,
}

impl ModeState {
    pub fn new(base_basal_rate: f32) -> Self {
        Self {
            activity: Activity::Idle,
            suspended: false,
            base_basal_rate,
            temp_basal: None,
        }
    }

    pub fn is_bolusing(&self) -> bool {
        matches!(self.activity, Activity::Bolusing { .. })
    }

    pub fn is_rewinding(&self) -> bool {
        matches!(self.activity, Activity::Rewinding { .. })
    }

    pub fn pending_units(&self) -> f32 {
        match self.activity {
            Activity::Bolusing { pending_units } => pending_units,
            _ => 0.0,
        }
    }

    /// The rate basal pulses are scheduled from. A temp override replaces
    /// the base rate outright.
    pub fn active_basal_rate(&self) -> f32 {
        self.temp_basal.map_or(self.base_basal_rate, |t| t.rate)
    }

    /// Basal counts as running when a base rate is set or any override is
    /// active (a zero-rate override is still a basal program).
    pub fn basal_active(&self) -> bool {
        self.base_basal_rate > EPSILON || self.temp_basal.is_some()
    }

    /// Drop any in-flight bolus. Returns `true` if one was cancelled.
    pub fn cancel_bolus(&mut self) -> bool {
        if self.is_bolusing() {
            self.activity = Activity::Idle;
            true
        } else {
            false
        }
    }

    /// Status in priority order: rewind, suspend, bolus, basal, empty, idle.
    pub fn status(&self, reservoir_empty: bool) -> DeviceStatus {
        if self.is_rewinding() {
            DeviceStatus::Priming
        } else if self.suspended {
            DeviceStatus::Suspended
        } else if self.is_bolusing() {
            DeviceStatus::DeliveringBolus
        } else if self.basal_active() {
            DeviceStatus::DeliveringBasal
        } else if reservoir_empty {
            DeviceStatus::Error
        } else {
            DeviceStatus::Idle
        }
    }
}
