//! Status page for the 128×64 OLED.
//!
//! Only the text layout lives here: which strings go on which row. Pixel
//! drawing belongs to the panel driver.
//!
//! ```text
//!  row 0   ST: DELIVERING_BASAL        ▂▄▆ / X
//!  row 18  Rem:312.5U                  (double size)
//!  row 42  Basal: 0.8 U/h   |  Basal: 2.0 (TMP)
//!  row 54  *** SUSPENDED *** | Bolus: 1.5 U Left | Last: 2.0 U
//! ```

use core::fmt::Write as _;

use crate::app::events::{AppEvent, PumpSnapshot};
use crate::app::ports::EventSink;

pub type Line = heapless::String<24>;

/// Wi-Fi indicator in the top-right corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalIndicator {
    /// Not associated: an `X` is drawn.
    Disconnected,
    /// 0–3 bars.
    Bars(u8),
}

/// Bars from RSSI in dBm.
pub fn signal_bars(rssi: Option<i8>) -> SignalIndicator {
    match rssi {
        None => SignalIndicator::Disconnected,
        Some(r) if r > -65 => SignalIndicator::Bars(3),
        Some(r) if r > -75 => SignalIndicator::Bars(2),
        Some(r) if r > -90 => SignalIndicator::Bars(1),
        Some(_) => SignalIndicator::Bars(0),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPage {
    pub status: Line,
    pub signal: SignalIndicator,
    pub remaining: Line,
    pub basal: Line,
    pub footer: Line,
}

impl StatusPage {
    pub fn render(s: &PumpSnapshot, rssi: Option<i8>) -> Self {
        // Every line is well under 24 chars; a failed write only truncates.
        let mut status = Line::new();
        let _ = write!(status, "ST: {}", s.status.as_str());

        let mut remaining = Line::new();
        let _ = write!(remaining, "Rem:{:.1}U", s.remaining);

        let mut basal = Line::new();
        let suffix = if s.temp_basal_active { "(TMP)" } else { "U/h" };
        let _ = write!(basal, "Basal: {:.1} {}", s.active_basal_rate, suffix);

        let mut footer = Line::new();
        let _ = if s.suspended {
            write!(footer, "*** SUSPENDED ***")
        } else if s.pumping {
            write!(footer, "Bolus: {:.1} U Left", s.pending_units)
        } else {
            write!(footer, "Last: {:.1} U", s.last_bolus_units)
        };

        Self {
            status,
            signal: signal_bars(rssi),
            remaining,
            basal,
            footer,
        }
    }
}

/// Re-renders the page on every snapshot.
#[derive(Default)]
pub struct DisplaySink {
    rssi: Option<i8>,
    page: Option<StatusPage>,
    changed: bool,
}

impl DisplaySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest RSSI, used from the next render on.
    pub fn set_rssi(&mut self, rssi: Option<i8>) {
        self.rssi = rssi;
    }

    /// The page if it differs from the last one taken.
    pub fn take_changed(&mut self) -> Option<&StatusPage> {
        if core::mem::take(&mut self.changed) {
            self.page.as_ref()
        } else {
            None
        }
    }
}

impl EventSink for DisplaySink {
    fn emit(&mut self, event: &AppEvent) {
        if let AppEvent::Snapshot(s) | AppEvent::Started(s) = event {
            let page = StatusPage::render(s, self.rssi);
            if self.page.as_ref() != Some(&page) {
                self.page = Some(page);
                self.changed = true;
            }
        }
    }
}
