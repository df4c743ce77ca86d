//! Unified error types for the DosePump firmware.
//!
//! Two families live here:
//!
//! - [`Rejection`] — the synchronous reason a dosing command was refused.
//!   Rejections are expected outcomes, never faults: the caller re-issues
//!   the command later if it still wants it.
//! - [`Error`] — collaborator failures (actuator, storage, config)
//!   that every subsystem can convert into, keeping the entry
//!   point's error handling uniform.
//!
//! All variants are `Copy` so they pass through the control loop without
//! allocation.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Command rejections
// ---------------------------------------------------------------------------

/// Why a command was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A mutually-exclusive activity is in progress (bolus, rewind) or the
    /// reservoir is latched empty.
    Busy,
    /// Delivery is suspended.
    Suspended,
    /// An argument was out of range (non-positive volume, negative duration, NaN).
    InvalidArgument(&'static str),
}

impl Rejection {
    /// HTTP status the REST layer answers with.
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Busy | Self::Suspended => 409,
            Self::InvalidArgument(_) => 400,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "Device busy or suspended"),
            Self::Suspended => write!(f, "Delivery suspended"),
            Self::InvalidArgument(why) => write!(f, "invalid argument: {why}"),
        }
    }
}

impl core::error::Error for Rejection {}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// PWM duty-cycle write failed.
    PwmWriteFailed,
    /// Requested pulse width is outside the servo's accepted range.
    PulseOutOfRange(u16),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::PulseOutOfRange(us) => write!(f, "servo pulse {us}us out of range"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible collaborator operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// Persistent storage failed.
    Storage(StorageError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
