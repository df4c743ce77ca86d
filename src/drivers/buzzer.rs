//! Piezo buzzer on a PWM channel.
//!
//! A tone is a carrier frequency at 50 % duty for a fixed time. Starting
//! a tone never blocks: [`Buzzer::poll`] runs every control tick and
//! silences the output once the tone has run its course.

use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::error::ActuatorError;

/// Retunes the PWM carrier. `embedded-hal` has no frequency control, so
/// the platform supplies it (LEDC timer on target).
pub trait ToneFrequency {
    fn set_frequency(&mut self, hz: u32) -> Result<(), ActuatorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToneState {
    Silent,
    /// Output started; the end time is stamped on the next poll.
    Starting { duration_ms: u32 },
    Sounding { until_ms: u64 },
}

pub struct Buzzer<P, F> {
    pwm: P,
    freq: F,
    state: ToneState,
}

impl<P: SetDutyCycle, F: ToneFrequency> Buzzer<P, F> {
    pub fn new(pwm: P, freq: F) -> Self {
        Self {
            pwm,
            freq,
            state: ToneState::Silent,
        }
    }

    /// Start a tone, replacing any tone already sounding.
    pub fn tone(&mut self, freq_hz: u32, duration_ms: u32) -> Result<(), ActuatorError> {
        self.freq.set_frequency(freq_hz)?;
        self.pwm
            .set_duty_cycle_percent(50)
            .map_err(|_| ActuatorError::PwmWriteFailed)?;
        self.state = ToneState::Starting { duration_ms };
        Ok(())
    }

    /// Advance the tone timer; call once per tick.
    pub fn poll(&mut self, now_ms: u64) {
        match self.state {
            ToneState::Silent => {}
            ToneState::Starting { duration_ms } => {
                self.state = ToneState::Sounding {
                    until_ms: now_ms.saturating_add(u64::from(duration_ms)),
                };
            }
            ToneState::Sounding { until_ms } => {
                if now_ms >= until_ms {
                    self.silence();
                }
            }
        }
    }

    pub fn silence(&mut self) {
        if self.pwm.set_duty_cycle_fully_off().is_err() {
            warn!("buzzer: failed to silence output");
        }
        self.state = ToneState::Silent;
    }
}
