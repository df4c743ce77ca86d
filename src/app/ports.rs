//! Port traits — the hexagonal boundary between dosing logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ DoseScheduler / AppService (domain)
//! ```
//!
//! Driven adapters (servo, buzzer, event sinks, storage) implement these
//! traits. The [`AppService`](super::service::AppService) and the
//! [`DoseScheduler`](crate::dosing::scheduler::DoseScheduler) consume them
//! via generics, so the domain core never touches hardware directly.
//!
//! ## Persistence notes
//!
//! - **StoragePort** writes MUST be atomic per key; no torn values on
//!   power loss. The ESP-IDF NVS API guarantees this natively.
//! - **ConfigPort** implementations MUST validate before persisting.
//! - All port errors are typed; callers must handle every variant explicitly.

use crate::config::PumpConfig;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → motor)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the continuous-rotation dosing motor.
pub trait ActuatorPort {
    /// Drive the plunger forward (dispensing direction).
    fn forward(&mut self);

    /// Drive the plunger backward (rewind direction).
    fn reverse(&mut self);

    /// Stop the motor.
    fn stop(&mut self);

    /// Hold the current drive state for `ms` milliseconds, blocking.
    ///
    /// The pulse primitive relies on this to make one dose increment a
    /// fixed physical rotation. Nothing else runs while it blocks.
    fn dwell(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Buzzer port (driven adapter: domain → piezo)
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget audible feedback.
pub trait BuzzerPort {
    /// Start a tone; the adapter silences it after `duration_ms` on its own.
    fn tone(&mut self, freq_hz: u32, duration_ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry / UI)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log, live
/// update stream, status display).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Fan-out: a pair of sinks is a sink.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: &super::events::AppEvent) {
        (**self).emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads pump configuration.
///
/// # Validation
///
/// Implementations MUST validate a stored config when loading it.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped: a bad dose increment would make every
/// delivered-volume figure wrong.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`PumpConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<PumpConfig, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for the reservoir record.
///
/// Keys are namespaced to prevent collisions between subsystems. Values
/// are opaque byte strings; layout is the caller's business.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
