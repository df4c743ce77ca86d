//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (REST API,
//! prime button) that the [`AppService`](super::service::AppService)
//! routes into the dose scheduler.

use serde::Serialize;

use super::events::DeviceStatus;
use crate::error::Rejection;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    /// Deliver `units` as a sequence of pulses.
    Bolus { units: f32 },

    /// Override the basal rate for `duration_minutes`.
    SetTempBasal { rate: f32, duration_minutes: i64 },

    /// Change the persistent base basal rate.
    SetBasalRate { rate: f32 },

    /// Inhibit all delivery; cancels an in-flight bolus.
    Suspend,

    /// Lift a suspend.
    Resume,

    /// Cancel bolus, temp basal, and base basal.
    Stop,

    /// Rewind the plunger for a new cartridge.
    Reset,

    /// Manual prime button edge: one synchronous pulse.
    PrimeEdge,

    /// Audible locate / acknowledge beep.
    Beep,
}

impl AppCommand {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bolus { .. } => "bolus",
            Self::SetTempBasal { .. } => "temp-basal",
            Self::SetBasalRate { .. } => "basal",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Reset => "reset",
            Self::PrimeEdge => "prime",
            Self::Beep => "beep",
        }
    }
}

/// Data returned with an accepted command.
///
/// Serialized as the `data` object of the REST response, using the
/// controller's field names.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Accepted {
    /// Bolus armed; `units_delivered` echoes the requested volume.
    #[serde(rename_all = "camelCase")]
    Bolus { units_delivered: f32 },
    #[serde(rename_all = "camelCase")]
    TempBasal { rate: f32, duration_minutes: i64 },
    #[serde(rename_all = "camelCase")]
    BasalRate { rate: f32 },
    /// Status-only acknowledgement (suspend, resume, stop).
    #[serde(rename_all = "camelCase")]
    Status { device_status: DeviceStatus },
    /// Reset accepted; zero duration means the refill already happened.
    #[serde(rename_all = "camelCase")]
    Reset {
        device_status: DeviceStatus,
        estimated_rewind_duration_ms: u64,
    },
    /// Prime edge handled; `delivered` is false when the pulse was refused.
    #[serde(rename_all = "camelCase")]
    Primed { delivered: bool },
    /// Nothing to report.
    Ack {},
}

/// Result of routing one command through the service.
pub type CommandOutcome = Result<Accepted, Rejection>;
