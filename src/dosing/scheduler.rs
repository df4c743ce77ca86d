//! The dose scheduler — sole owner and mutator of dosing state.
//!
//! An external loop calls [`DoseScheduler::tick`] once per control period
//! (≈10 ms) and routes commands into the command methods. Both run to
//! completion on the control thread, so no locking is involved; the
//! [`Activity`] tag is what keeps delivery paths mutually exclusive.
//!
//! ```text
//!  tick(now)
//!   1. temp-basal expiry        now ≥ ends_at → base rate applies again
//!   2. rewind progress          elapsed ≥ duration → stop, refill, checkpoint
//!   3. bolus progress           interval elapsed → pulse, pending −= inc
//!   4. basal progress           interval(rate) elapsed → pulse (yields to bolus)
//!   5. debounced flush          dirty ∧ window elapsed → persist
//! ```
//!
//! Every pulse goes through [`DoseScheduler::fire_pulse`], which blocks
//! for the physical actuation time.

use log::{debug, info, warn};

use crate::app::commands::{Accepted, CommandOutcome};
use crate::app::events::{AppEvent, DeviceStatus, PulseSource, PumpSnapshot};
use crate::app::ports::{ActuatorPort, BuzzerPort, EventSink, StoragePort};
use crate::config::PumpConfig;
use crate::error::Rejection;

use super::EPSILON;
use super::activity::{Activity, ModeState, TempBasal};
use super::persist::{PersistRecord, SaveDebouncer};
use super::reservoir::Reservoir;
use super::timing::{basal_interval_ms, elapsed_ms, rewind_duration_ms};

/// Tone played when a bolus finishes.
const TONE_BOLUS_DONE: (u32, u32) = (1500, 150);
/// Tone played when a rewind finishes and the pump is ready.
const TONE_REWIND_DONE: (u32, u32) = (1000, 500);

pub struct DoseScheduler {
    config: PumpConfig,
    reservoir: Reservoir,
    mode: ModeState,
    last_bolus_units: f32,
    /// Time of the last bolus pulse (or of the bolus command that armed it).
    last_bolus_pulse_ms: u64,
    last_basal_pulse_ms: u64,
    saver: SaveDebouncer,
}

impl DoseScheduler {
    /// A scheduler with a full cartridge and no basal program.
    pub fn new(config: PumpConfig) -> Self {
        let record = PersistRecord::fresh(config.capacity_units);
        Self::restore(config, &record)
    }

    /// Rebuild from the persisted record. Volatile state (activity, pending
    /// bolus, rewind job, suspend, temp basal) always starts cleared.
    ///
    /// The stored capacity describes the cartridge still in the pump, so it
    /// holds until the next reset; a refill takes `config.capacity_units`.
    pub fn restore(config: PumpConfig, record: &PersistRecord) -> Self {
        let capacity = if record.capacity > 0.0 {
            record.capacity
        } else {
            config.capacity_units
        };
        let reservoir = Reservoir::restore(capacity, record.delivered, record.empty);
        let base_rate = if record.basal_rate.is_finite() {
            record.basal_rate.max(0.0)
        } else {
            0.0
        };
        let saver = SaveDebouncer::new(config.save_interval_ms);
        Self {
            config,
            reservoir,
            mode: ModeState::new(base_rate),
            last_bolus_units: record.last_bolus,
            last_bolus_pulse_ms: 0,
            last_basal_pulse_ms: 0,
            saver,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &PumpConfig {
        &self.config
    }

    pub fn reservoir(&self) -> &Reservoir {
        &self.reservoir
    }

    pub fn mode(&self) -> &ModeState {
        &self.mode
    }

    pub fn status(&self) -> DeviceStatus {
        self.mode.status(self.reservoir.is_empty())
    }

    pub fn last_bolus_units(&self) -> f32 {
        self.last_bolus_units
    }

    /// Whether the persistence record has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.saver.is_dirty()
    }

    /// The durable part of the state.
    pub fn record(&self) -> PersistRecord {
        PersistRecord {
            delivered: self.reservoir.delivered(),
            remaining: self.reservoir.remaining(),
            capacity: self.reservoir.capacity(),
            basal_rate: self.mode.base_basal_rate,
            last_bolus: self.last_bolus_units,
            empty: self.reservoir.is_empty(),
        }
    }

    pub fn snapshot(&self) -> PumpSnapshot {
        PumpSnapshot {
            delivered: self.reservoir.delivered(),
            remaining: self.reservoir.remaining(),
            capacity: self.reservoir.capacity(),
            active_basal_rate: self.mode.active_basal_rate(),
            empty: self.reservoir.is_empty(),
            pumping: self.mode.is_bolusing(),
            rewinding: self.mode.is_rewinding(),
            suspended: self.mode.suspended,
            pending_units: self.mode.pending_units(),
            temp_basal_active: self.mode.temp_basal.is_some(),
            last_bolus_units: self.last_bolus_units,
            status: self.status(),
        }
    }

    // ── Commands ──────────────────────────────────────────────

    /// Start a bolus of `units`. The first pulse fires one bolus interval
    /// after acceptance.
    pub fn bolus(&mut self, units: f32, now_ms: u64, sink: &mut impl EventSink) -> CommandOutcome {
        if self.mode.suspended {
            return Err(Rejection::Suspended);
        }
        if self.mode.is_rewinding() || self.mode.is_bolusing() || self.reservoir.is_empty() {
            return Err(Rejection::Busy);
        }
        if !units.is_finite() || units <= 0.0 {
            return Err(Rejection::InvalidArgument("units must be a positive volume"));
        }

        self.mode.activity = Activity::Bolusing {
            pending_units: units,
        };
        self.last_bolus_units = units;
        self.last_bolus_pulse_ms = now_ms;
        self.saver.mark_dirty();
        info!("Bolus: {:.1} U armed", units);
        self.notify(sink);
        Ok(Accepted::Bolus {
            units_delivered: units,
        })
    }

    /// Enter or refresh a temp-basal override. A zero duration is accepted
    /// and lapses on the next tick.
    pub fn set_temp_basal(
        &mut self,
        rate: f32,
        duration_minutes: i64,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> CommandOutcome {
        if !rate.is_finite() || rate < 0.0 {
            return Err(Rejection::InvalidArgument("rate must be a non-negative number"));
        }
        if duration_minutes < 0 {
            return Err(Rejection::InvalidArgument("durationMinutes must not be negative"));
        }

        let duration_ms = (duration_minutes as u64).saturating_mul(60_000);
        self.mode.temp_basal = Some(TempBasal {
            rate,
            ends_at_ms: now_ms.saturating_add(duration_ms),
        });
        info!("Temp basal: {:.2} U/h for {} min", rate, duration_minutes);
        self.notify(sink);
        Ok(Accepted::TempBasal {
            rate,
            duration_minutes,
        })
    }

    /// Change the persistent base basal rate.
    pub fn set_basal_rate(&mut self, rate: f32, sink: &mut impl EventSink) -> CommandOutcome {
        if !rate.is_finite() || rate < 0.0 {
            return Err(Rejection::InvalidArgument("rate must be a non-negative number"));
        }
        self.mode.base_basal_rate = rate;
        self.saver.mark_dirty();
        info!("Basal rate set to {:.2} U/h", rate);
        self.notify(sink);
        Ok(Accepted::BasalRate { rate })
    }

    /// Inhibit delivery. An in-flight bolus is dropped; a rewind carries on.
    pub fn suspend(&mut self, sink: &mut impl EventSink) -> CommandOutcome {
        self.mode.suspended = true;
        if self.mode.cancel_bolus() {
            info!("Suspend: in-flight bolus cancelled");
        }
        info!("Delivery suspended");
        self.notify(sink);
        Ok(Accepted::Status {
            device_status: DeviceStatus::Suspended,
        })
    }

    pub fn resume(&mut self, sink: &mut impl EventSink) -> CommandOutcome {
        self.mode.suspended = false;
        info!("Delivery resumed");
        self.notify(sink);
        Ok(Accepted::Status {
            device_status: self.status(),
        })
    }

    /// Cancel bolus, temp basal, and base basal. A rewind is left running:
    /// stopping it part-way would lose the plunger position.
    pub fn stop(&mut self, sink: &mut impl EventSink) -> CommandOutcome {
        self.mode.cancel_bolus();
        self.mode.temp_basal = None;
        self.mode.base_basal_rate = 0.0;
        self.saver.mark_dirty();
        info!("Stop: all delivery programs cleared");
        self.notify(sink);
        Ok(Accepted::Status {
            device_status: DeviceStatus::Idle,
        })
    }

    /// Cartridge change. With volume delivered, starts a rewind sized to
    /// it; otherwise refills immediately and checkpoints.
    pub fn reset(
        &mut self,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> CommandOutcome {
        if self.mode.suspended {
            return Err(Rejection::Suspended);
        }
        if self.mode.is_bolusing() || self.mode.is_rewinding() {
            return Err(Rejection::Busy);
        }

        let duration_ms = rewind_duration_ms(
            self.reservoir.delivered(),
            self.config.dose_increment_units,
            self.config.pulse_duration_ms,
        );

        if duration_ms > 0 {
            self.mode.activity = Activity::Rewinding {
                started_ms: now_ms,
                duration_ms,
            };
            hw.reverse();
            info!("Rewind: reversing worm gear for {} ms", duration_ms);
            sink.emit(&AppEvent::RewindStarted { duration_ms });
        } else {
            self.reservoir.refill(self.config.capacity_units);
            info!("Reset: reservoir already at start position");
            self.checkpoint(now_ms, store, sink);
        }
        self.notify(sink);
        Ok(Accepted::Reset {
            device_status: DeviceStatus::Priming,
            estimated_rewind_duration_ms: duration_ms,
        })
    }

    /// Manual prime: one pulse, fired synchronously.
    pub fn prime_edge(
        &mut self,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> CommandOutcome {
        if self.mode.suspended {
            return Err(Rejection::Suspended);
        }
        if self.mode.is_bolusing() || self.mode.is_rewinding() {
            return Err(Rejection::Busy);
        }

        self.mode.activity = Activity::Priming;
        let delivered = self.fire_pulse(PulseSource::Prime, hw, sink);
        self.mode.activity = Activity::Idle;
        Ok(Accepted::Primed { delivered })
    }

    // ── Tick ──────────────────────────────────────────────────

    /// Advance the scheduler to `now_ms`.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl ActuatorPort + BuzzerPort),
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.expire_temp_basal(now_ms, sink);
        self.progress_rewind(now_ms, hw, store, sink);
        self.progress_bolus(now_ms, hw, sink);
        self.progress_basal(now_ms, hw, sink);
        self.flush_if_due(now_ms, store, sink);
    }

    fn expire_temp_basal(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        let expired = self.mode.temp_basal.is_some_and(|t| t.is_expired(now_ms));
        if expired {
            self.mode.temp_basal = None;
            info!("Temp basal finished, base rate {:.2} U/h", self.mode.base_basal_rate);
            sink.emit(&AppEvent::TempBasalExpired);
            self.notify(sink);
        }
    }

    fn progress_rewind(
        &mut self,
        now_ms: u64,
        hw: &mut (impl ActuatorPort + BuzzerPort),
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let Activity::Rewinding {
            started_ms,
            duration_ms,
        } = self.mode.activity
        else {
            return;
        };
        if elapsed_ms(now_ms, started_ms) < duration_ms {
            return;
        }

        hw.stop();
        self.mode.activity = Activity::Idle;
        self.reservoir.refill(self.config.capacity_units);
        hw.tone(TONE_REWIND_DONE.0, TONE_REWIND_DONE.1);
        info!("Rewind complete, reservoir full ({:.1} U)", self.reservoir.capacity());
        sink.emit(&AppEvent::RewindComplete);
        self.notify(sink);
        self.checkpoint(now_ms, store, sink);
    }

    fn progress_bolus(
        &mut self,
        now_ms: u64,
        hw: &mut (impl ActuatorPort + BuzzerPort),
        sink: &mut impl EventSink,
    ) {
        let Activity::Bolusing { pending_units } = self.mode.activity else {
            return;
        };
        if self.mode.suspended
            || elapsed_ms(now_ms, self.last_bolus_pulse_ms) < u64::from(self.config.bolus_interval_ms)
        {
            return;
        }

        let mut pending = pending_units;
        if pending > EPSILON && !self.reservoir.is_empty() {
            pending -= self.config.dose_increment_units;
            self.mode.activity = Activity::Bolusing {
                pending_units: pending.max(0.0),
            };
            self.fire_pulse(PulseSource::Bolus, hw, sink);
            self.last_bolus_pulse_ms = now_ms;
        }

        if pending <= EPSILON {
            self.mode.activity = Activity::Idle;
            hw.tone(TONE_BOLUS_DONE.0, TONE_BOLUS_DONE.1);
            info!("Bolus complete ({:.1} U)", self.last_bolus_units);
            sink.emit(&AppEvent::BolusComplete {
                units: self.last_bolus_units,
            });
            self.notify(sink);
        } else if self.reservoir.is_empty() {
            self.mode.activity = Activity::Idle;
            warn!("Bolus abandoned with {:.1} U pending: reservoir empty", pending);
            self.notify(sink);
        }
    }

    fn progress_basal(&mut self, now_ms: u64, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        let rate = self.mode.active_basal_rate();
        if rate <= EPSILON
            || self.reservoir.is_empty()
            || self.mode.is_rewinding()
            || self.mode.suspended
        {
            return;
        }
        let interval = basal_interval_ms(rate, self.config.dose_increment_units);
        if elapsed_ms(now_ms, self.last_basal_pulse_ms) < interval {
            return;
        }

        // Yield to a bolus pulse inside the window; the basal timer is not
        // re-armed, so the pulse goes out on the first tick past the window.
        let bolus_recent = self.mode.is_bolusing()
            && elapsed_ms(now_ms, self.last_bolus_pulse_ms)
                <= u64::from(self.config.basal_yield_window_ms);
        if bolus_recent {
            debug!("Basal pulse yields to bolus");
            return;
        }

        self.fire_pulse(PulseSource::Basal, hw, sink);
        self.last_basal_pulse_ms = now_ms;
    }

    // ── Pulse primitive ───────────────────────────────────────

    /// Deliver one dose increment. Returns `false` (and does nothing
    /// physical) when empty, rewinding, or suspended.
    ///
    /// Blocks for `pulse_duration_ms` while the motor runs forward.
    fn fire_pulse(
        &mut self,
        source: PulseSource,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> bool {
        if self.reservoir.is_empty() || self.mode.is_rewinding() || self.mode.suspended {
            return false;
        }
        if self.reservoir.is_depleted() {
            // Restored record said "not empty" but there is nothing left.
            self.reservoir.latch_empty();
            self.mode.cancel_bolus();
            self.saver.mark_dirty();
            warn!("Pulse [{}] refused: reservoir empty", source.label());
            sink.emit(&AppEvent::ReservoirEmpty);
            self.notify(sink);
            return false;
        }

        let inc = self.config.dose_increment_units;
        let just_emptied = self.reservoir.record_pulse(inc);
        self.saver.mark_dirty();

        hw.forward();
        hw.dwell(self.config.pulse_duration_ms);
        hw.stop();

        let remaining = self.reservoir.remaining();
        info!("Pulse [{}] delivered, remaining {:.1} U", source.label(), remaining);
        sink.emit(&AppEvent::PulseDelivered { source, remaining });
        if just_emptied {
            warn!("Reservoir empty after {:.1} U", self.reservoir.delivered());
            sink.emit(&AppEvent::ReservoirEmpty);
        }
        self.notify(sink);
        true
    }

    // ── Persistence ───────────────────────────────────────────

    /// Write the record now, bypassing the debounce window.
    fn checkpoint(&mut self, now_ms: u64, store: &mut impl StoragePort, sink: &mut impl EventSink) {
        self.saver.mark_dirty();
        self.write_record(now_ms, true, store, sink);
    }

    fn flush_if_due(&mut self, now_ms: u64, store: &mut impl StoragePort, sink: &mut impl EventSink) {
        if self.saver.is_due(now_ms) {
            self.write_record(now_ms, false, store, sink);
        }
    }

    fn write_record(
        &mut self,
        now_ms: u64,
        checkpoint: bool,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        match self.record().save(store) {
            Ok(()) => {
                self.saver.record_attempt(now_ms, true);
                info!("State saved{}", if checkpoint { " (checkpoint)" } else { "" });
                sink.emit(&AppEvent::StateSaved { checkpoint });
            }
            Err(e) => {
                self.saver.record_attempt(now_ms, false);
                warn!("State save failed ({}), retrying next window", e);
            }
        }
    }

    fn notify(&self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Snapshot(self.snapshot()));
    }
}
