//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! Pulse and snapshot events are high-volume and go out at `debug`.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Snapshot(s) => {
                debug!(
                    "SNAP  | {} | rem={:.1}/{:.1}U basal={:.2}U/h pending={:.1}U empty={}",
                    s.status.as_str(),
                    s.remaining,
                    s.capacity,
                    s.active_basal_rate,
                    s.pending_units,
                    s.empty,
                );
            }
            AppEvent::PulseDelivered { source, remaining } => {
                debug!("PULSE | {} | rem={:.1}U", source.label(), remaining);
            }
            AppEvent::BolusComplete { units } => {
                info!("BOLUS | complete, {:.1}U", units);
            }
            AppEvent::TempBasalExpired => {
                info!("BASAL | temp override expired");
            }
            AppEvent::RewindStarted { duration_ms } => {
                info!("REWND | started, {} ms", duration_ms);
            }
            AppEvent::RewindComplete => {
                info!("REWND | complete, reservoir full");
            }
            AppEvent::ReservoirEmpty => {
                warn!("RESVR | empty");
            }
            AppEvent::StateSaved { checkpoint } => {
                debug!("SAVE  | checkpoint={}", checkpoint);
            }
            AppEvent::Started(s) => {
                info!(
                    "START | status={} rem={:.1}U basal={:.2}U/h",
                    s.status.as_str(),
                    s.remaining,
                    s.active_basal_rate
                );
            }
        }
    }
}
