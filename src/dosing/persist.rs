//! Crash-safe reservoir record and the write-debounce policy.
//!
//! The record is the only dosing state that survives a restart. It is
//! stored as six named keys in an opaque key/value store:
//!
//! | Key       | Type    | Meaning                         |
//! |-----------|---------|---------------------------------|
//! | `deliv`   | f32 LE  | units delivered since last fill |
//! | `rem`     | f32 LE  | units remaining                 |
//! | `cap`     | f32 LE  | cartridge capacity              |
//! | `basal`   | f32 LE  | base basal rate (U/h)           |
//! | `l_bolus` | f32 LE  | last bolus request (U)          |
//! | `empty`   | u8      | empty latch (0/1)               |
//!
//! Flash wear rules out writing on every pulse. Mutations only mark the
//! record dirty; [`SaveDebouncer`] decides when a flush is due. Rewind
//! completion and an immediate reset are checkpoints and skip the window.

use log::warn;

use crate::app::ports::{StorageError, StoragePort};

pub const STATE_NAMESPACE: &str = "pump-state";

const KEY_DELIVERED: &str = "deliv";
const KEY_REMAINING: &str = "rem";
const KEY_CAPACITY: &str = "cap";
const KEY_BASAL: &str = "basal";
const KEY_LAST_BOLUS: &str = "l_bolus";
const KEY_EMPTY: &str = "empty";

/// Durable snapshot of the reservoir and base program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistRecord {
    pub delivered: f32,
    pub remaining: f32,
    pub capacity: f32,
    pub basal_rate: f32,
    pub last_bolus: f32,
    pub empty: bool,
}

impl PersistRecord {
    /// Fresh-cartridge record used when the store has nothing.
    pub fn fresh(capacity: f32) -> Self {
        Self {
            delivered: 0.0,
            remaining: capacity,
            capacity,
            basal_rate: 0.0,
            last_bolus: 0.0,
            empty: false,
        }
    }

    /// Load every field, falling back per key to `defaults`.
    ///
    /// A missing key is normal on first boot. A malformed one is logged
    /// and replaced by its default; loading never fails as a whole.
    pub fn load(store: &impl StoragePort, defaults: Self) -> Self {
        Self {
            delivered: read_f32(store, KEY_DELIVERED, defaults.delivered),
            remaining: read_f32(store, KEY_REMAINING, defaults.remaining),
            capacity: read_f32(store, KEY_CAPACITY, defaults.capacity),
            basal_rate: read_f32(store, KEY_BASAL, defaults.basal_rate),
            last_bolus: read_f32(store, KEY_LAST_BOLUS, defaults.last_bolus),
            empty: read_bool(store, KEY_EMPTY, defaults.empty),
        }
    }

    /// Write every field. Stops at the first failing key.
    pub fn save(&self, store: &mut impl StoragePort) -> Result<(), StorageError> {
        store.write(STATE_NAMESPACE, KEY_DELIVERED, &self.delivered.to_le_bytes())?;
        store.write(STATE_NAMESPACE, KEY_REMAINING, &self.remaining.to_le_bytes())?;
        store.write(STATE_NAMESPACE, KEY_CAPACITY, &self.capacity.to_le_bytes())?;
        store.write(STATE_NAMESPACE, KEY_BASAL, &self.basal_rate.to_le_bytes())?;
        store.write(STATE_NAMESPACE, KEY_LAST_BOLUS, &self.last_bolus.to_le_bytes())?;
        store.write(STATE_NAMESPACE, KEY_EMPTY, &[u8::from(self.empty)])?;
        Ok(())
    }
}

fn read_f32(store: &impl StoragePort, key: &str, default: f32) -> f32 {
    let mut buf = [0u8; 4];
    match store.read(STATE_NAMESPACE, key, &mut buf) {
        Ok(4) => {
            let v = f32::from_le_bytes(buf);
            if v.is_finite() {
                v
            } else {
                warn!("persist: '{}' is not finite, using {}", key, default);
                default
            }
        }
        Ok(n) => {
            warn!("persist: '{}' has {} bytes, expected 4; using {}", key, n, default);
            default
        }
        Err(StorageError::NotFound) => default,
        Err(e) => {
            warn!("persist: read '{}' failed ({}), using {}", key, e, default);
            default
        }
    }
}

fn read_bool(store: &impl StoragePort, key: &str, default: bool) -> bool {
    let mut buf = [0u8; 1];
    match store.read(STATE_NAMESPACE, key, &mut buf) {
        Ok(1) => buf[0] != 0,
        Ok(_) => default,
        Err(StorageError::NotFound) => default,
        Err(e) => {
            warn!("persist: read '{}' failed ({}), using {}", key, e, default);
            default
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Debounce policy
// ═══════════════════════════════════════════════════════════════

/// Dirty flag plus the time of the last flush attempt.
#[derive(Debug, Clone, Copy)]
pub struct SaveDebouncer {
    interval_ms: u64,
    dirty: bool,
    last_attempt_ms: u64,
}

impl SaveDebouncer {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms: u64::from(interval_ms),
            dirty: false,
            last_attempt_ms: 0,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// A flush is due when dirty and the window since the last attempt has passed.
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.dirty && now_ms.saturating_sub(self.last_attempt_ms) >= self.interval_ms
    }

    /// Record a flush attempt. On failure the flag stays set and the
    /// retry waits for the next window.
    pub fn record_attempt(&mut self, now_ms: u64, ok: bool) {
        self.last_attempt_ms = now_ms;
        if ok {
            self.dirty = false;
        }
    }
}
