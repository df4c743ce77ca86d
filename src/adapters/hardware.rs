//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the servo, the buzzer, and a blocking delay, exposing them
//! through [`ActuatorPort`] and [`BuzzerPort`]. This is the only module
//! in the system that commands actual hardware. The ports are
//! infallible, so driver errors are logged and counted here.

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::app::ports::{ActuatorPort, BuzzerPort};
use crate::drivers::buzzer::{Buzzer, ToneFrequency};
use crate::drivers::servo::{Motion, ServoDriver};
use crate::error::ActuatorError;

/// Concrete adapter that combines all actuators behind port traits.
pub struct PumpHardware<S, B, F, D> {
    servo: ServoDriver<S>,
    buzzer: Buzzer<B, F>,
    delay: D,
    faults: u32,
}

impl<S, B, F, D> PumpHardware<S, B, F, D>
where
    S: SetDutyCycle,
    B: SetDutyCycle,
    F: ToneFrequency,
    D: DelayNs,
{
    pub fn new(servo: ServoDriver<S>, buzzer: Buzzer<B, F>, delay: D) -> Self {
        Self {
            servo,
            buzzer,
            delay,
            faults: 0,
        }
    }

    /// Per-tick housekeeping: ends tones whose time is up.
    pub fn poll(&mut self, now_ms: u64) {
        self.buzzer.poll(now_ms);
    }

    pub fn motion(&self) -> Motion {
        self.servo.motion()
    }

    /// Driver errors since boot.
    pub fn fault_count(&self) -> u32 {
        self.faults
    }

    fn check(&mut self, what: &str, result: Result<(), ActuatorError>) {
        if let Err(e) = result {
            self.faults = self.faults.wrapping_add(1);
            warn!("hardware: {} failed: {}", what, e);
        }
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<S, B, F, D> ActuatorPort for PumpHardware<S, B, F, D>
where
    S: SetDutyCycle,
    B: SetDutyCycle,
    F: ToneFrequency,
    D: DelayNs,
{
    fn forward(&mut self) {
        let r = self.servo.forward();
        self.check("servo forward", r);
    }

    fn reverse(&mut self) {
        let r = self.servo.reverse();
        self.check("servo reverse", r);
    }

    fn stop(&mut self) {
        let r = self.servo.stop();
        self.check("servo stop", r);
    }

    fn dwell(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

// ── BuzzerPort implementation ─────────────────────────────────

impl<S, B, F, D> BuzzerPort for PumpHardware<S, B, F, D>
where
    S: SetDutyCycle,
    B: SetDutyCycle,
    F: ToneFrequency,
    D: DelayNs,
{
    fn tone(&mut self, freq_hz: u32, duration_ms: u32) {
        let r = self.buzzer.tone(freq_hz, duration_ms);
        self.check("buzzer tone", r);
    }
}
