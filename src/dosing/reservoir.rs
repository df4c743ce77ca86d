//! Reservoir volume bookkeeping.
//!
//! `remaining` is always derived from `capacity − delivered`, so the two
//! can never disagree. `empty` is a latch: it is set the moment
//! `remaining` reaches zero and only a refill clears it.

use super::EPSILON;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reservoir {
    capacity: f32,
    delivered: f32,
    empty: bool,
}

impl Reservoir {
    /// A full cartridge.
    pub fn full(capacity: f32) -> Self {
        Self {
            capacity,
            delivered: 0.0,
            empty: false,
        }
    }

    /// Rebuild from a persisted record. `delivered` is clamped into
    /// `0..=capacity`; the empty latch is re-derived from the volume as well.
    pub fn restore(capacity: f32, delivered: f32, empty: bool) -> Self {
        let delivered = if delivered.is_finite() {
            delivered.clamp(0.0, capacity)
        } else {
            0.0
        };
        let mut r = Self {
            capacity,
            delivered,
            empty,
        };
        if r.remaining() <= EPSILON {
            r.empty = true;
        }
        r
    }

    pub fn capacity(&self) -> f32 {
        self.capacity
    }

    pub fn delivered(&self) -> f32 {
        self.delivered
    }

    pub fn remaining(&self) -> f32 {
        (self.capacity - self.delivered).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// True when no further increment can leave the reservoir.
    pub fn is_depleted(&self) -> bool {
        self.remaining() <= EPSILON
    }

    /// Account for one pulse of `increment` units. Returns `true` if this
    /// pulse emptied the reservoir.
    pub fn record_pulse(&mut self, increment: f32) -> bool {
        self.delivered = (self.delivered + increment).min(self.capacity);
        if self.is_depleted() && !self.empty {
            self.empty = true;
            return true;
        }
        false
    }

    /// Latch empty. Returns `true` if the latch changed.
    pub fn latch_empty(&mut self) -> bool {
        let changed = !self.empty;
        self.empty = true;
        changed
    }

    /// Back to a full cartridge of `capacity` units (rewind complete /
    /// new cartridge).
    pub fn refill(&mut self, capacity: f32) {
        self.capacity = capacity;
        self.delivered = 0.0;
        self.empty = false;
    }
}
