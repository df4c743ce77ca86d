//! Prime button: polled edge detector with post-trigger lockout.
//!
//! ## Hardware
//!
//! Active-low momentary switch with internal pull-up. The main loop
//! samples it every control tick; a HIGH→LOW transition is one press.
//!
//! After a press fires, further edges are ignored for the lockout window.
//! The level is still tracked during lockout, so a held button does not
//! re-fire when the window ends.

use embedded_hal::digital::InputPin;
use log::warn;

pub struct PrimeButton<P> {
    pin: P,
    /// Level seen on the previous poll (`true` = released).
    last_high: bool,
    lockout_ms: u64,
    locked_until_ms: u64,
}

impl<P: InputPin> PrimeButton<P> {
    pub fn new(pin: P, lockout_ms: u32) -> Self {
        Self {
            pin,
            last_high: true,
            lockout_ms: u64::from(lockout_ms),
            locked_until_ms: 0,
        }
    }

    /// Sample the pin. Returns `true` exactly once per accepted press.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let high = match self.pin.is_high() {
            Ok(level) => level,
            Err(_) => {
                warn!("prime button: GPIO read failed");
                return false;
            }
        };

        let falling = self.last_high && !high;
        self.last_high = high;

        if falling && now_ms >= self.locked_until_ms {
            self.locked_until_ms = now_ms.saturating_add(self.lockout_ms);
            return true;
        }
        false
    }
}
