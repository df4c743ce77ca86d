//! Outbound application events.
//!
//! The dose scheduler emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them: log to serial, push to the live
//! update stream, redraw the status display.

use serde::{Serialize, Serializer};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Full state snapshot, pushed after every state change and on keep-alive.
    Snapshot(PumpSnapshot),

    /// One dose increment left the reservoir.
    PulseDelivered { source: PulseSource, remaining: f32 },

    /// A bolus finished (all pending units delivered).
    BolusComplete { units: f32 },

    /// A temp-basal override ran out; the base rate applies again.
    TempBasalExpired,

    /// Reverse actuation started for a cartridge change.
    RewindStarted { duration_ms: u64 },

    /// Rewind finished; the reservoir is full again.
    RewindComplete,

    /// The reservoir just latched empty.
    ReservoirEmpty,

    /// The persistence record was written (`checkpoint` = bypassed debounce).
    StateSaved { checkpoint: bool },

    /// The application service has started (carries the restored state).
    Started(PumpSnapshot),
}

/// Which delivery path fired a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseSource {
    Prime,
    Bolus,
    Basal,
}

impl PulseSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Prime => "PRIME",
            Self::Bolus => "BOLUS",
            Self::Basal => "BASAL",
        }
    }
}

/// Coarse device status as reported to remote controllers.
///
/// A rewind reports `PRIMING`: the controller sees the cartridge-change
/// cycle as a priming step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Priming,
    Suspended,
    DeliveringBolus,
    DeliveringBasal,
    Error,
    Idle,
}

impl DeviceStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Priming => "PRIMING",
            Self::Suspended => "SUSPENDED",
            Self::DeliveringBolus => "DELIVERING_BOLUS",
            Self::DeliveringBasal => "DELIVERING_BASAL",
            Self::Error => "ERROR",
            Self::Idle => "IDLE",
        }
    }
}

/// A point-in-time state snapshot suitable for the live update stream.
///
/// Serialized field names are the dashboard's wire names. Volumes and
/// rates go out with one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PumpSnapshot {
    #[serde(serialize_with = "one_decimal")]
    pub delivered: f32,
    #[serde(serialize_with = "one_decimal")]
    pub remaining: f32,
    #[serde(serialize_with = "one_decimal")]
    pub capacity: f32,
    /// Rate currently driving basal pulses (temp override if active).
    #[serde(rename = "basal", serialize_with = "one_decimal")]
    pub active_basal_rate: f32,
    pub empty: bool,
    /// A bolus is in progress.
    pub pumping: bool,
    pub rewinding: bool,
    pub suspended: bool,
    #[serde(rename = "pending", serialize_with = "one_decimal")]
    pub pending_units: f32,
    #[serde(skip)]
    pub temp_basal_active: bool,
    #[serde(skip)]
    pub last_bolus_units: f32,
    #[serde(skip)]
    pub status: DeviceStatus,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn one_decimal<S: Serializer>(v: &f32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((f64::from(*v) * 10.0).round() / 10.0)
}
