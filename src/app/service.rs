//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the [`DoseScheduler`] and exposes a clean,
//! hardware-agnostic API. All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  AppCommand ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                 │       AppService        │
//! ActuatorPort ◀──│  DoseScheduler · keep-  │ ◀─▶ StoragePort
//!   BuzzerPort ◀──│  alive snapshots        │
//!                 └────────────────────────┘
//! ```

use log::info;

use crate::config::PumpConfig;
use crate::dosing::persist::PersistRecord;
use crate::dosing::scheduler::DoseScheduler;

use super::commands::{Accepted, AppCommand, CommandOutcome};
use super::events::{AppEvent, DeviceStatus, PumpSnapshot};
use super::ports::{ActuatorPort, BuzzerPort, EventSink, StoragePort};

/// Locate / acknowledge beep.
const TONE_BEEP: (u32, u32) = (2000, 300);

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    scheduler: DoseScheduler,
    keepalive_ms: u64,
    last_keepalive_ms: u64,
}

impl AppService {
    /// Construct the service with a full cartridge.
    ///
    /// Call [`start`](Self::start) next to pick up the persisted record.
    pub fn new(config: PumpConfig) -> Self {
        let keepalive_ms = u64::from(config.keepalive_interval_ms);
        Self {
            scheduler: DoseScheduler::new(config),
            keepalive_ms,
            last_keepalive_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore the reservoir record from `store` and announce the result.
    pub fn start(&mut self, store: &impl StoragePort, sink: &mut impl EventSink) {
        let config = self.scheduler.config().clone();
        let record = PersistRecord::load(store, PersistRecord::fresh(config.capacity_units));
        self.scheduler = DoseScheduler::restore(config, &record);

        let snap = self.scheduler.snapshot();
        sink.emit(&AppEvent::Started(snap));
        info!(
            "AppService started: {:.1}/{:.1} U remaining, basal {:.2} U/h, status {}",
            snap.remaining,
            snap.capacity,
            snap.active_basal_rate,
            snap.status.as_str()
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`ActuatorPort`] and
    /// [`BuzzerPort`]; this avoids a double mutable borrow while keeping
    /// the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl ActuatorPort + BuzzerPort),
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.scheduler.tick(now_ms, hw, store, sink);

        if now_ms.saturating_sub(self.last_keepalive_ms) > self.keepalive_ms {
            sink.emit(&AppEvent::Snapshot(self.scheduler.snapshot()));
            self.last_keepalive_ms = now_ms;
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Route an external command (REST, prime button) into the scheduler.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u64,
        hw: &mut (impl ActuatorPort + BuzzerPort),
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> CommandOutcome {
        let s = &mut self.scheduler;
        let outcome = match cmd {
            AppCommand::Bolus { units } => s.bolus(units, now_ms, sink),
            AppCommand::SetTempBasal {
                rate,
                duration_minutes,
            } => s.set_temp_basal(rate, duration_minutes, now_ms, sink),
            AppCommand::SetBasalRate { rate } => s.set_basal_rate(rate, sink),
            AppCommand::Suspend => s.suspend(sink),
            AppCommand::Resume => s.resume(sink),
            AppCommand::Stop => s.stop(sink),
            AppCommand::Reset => s.reset(now_ms, hw, store, sink),
            AppCommand::PrimeEdge => s.prime_edge(hw, sink),
            AppCommand::Beep => {
                hw.tone(TONE_BEEP.0, TONE_BEEP.1);
                Ok(Accepted::Ack {})
            }
        };
        if let Err(r) = &outcome {
            info!("Command '{}' rejected: {}", cmd.name(), r);
        }
        outcome
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn snapshot(&self) -> PumpSnapshot {
        self.scheduler.snapshot()
    }

    pub fn status(&self) -> DeviceStatus {
        self.scheduler.status()
    }

    pub fn scheduler(&self) -> &DoseScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &PumpConfig {
        self.scheduler.config()
    }
}
