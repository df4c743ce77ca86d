//! Continuous-rotation servo driving the worm gear.
//!
//! The servo is commanded by pulse width on a 50 Hz PWM carrier:
//!
//! | Pulse   | Motion                       |
//! |---------|------------------------------|
//! | 2000 µs | forward (plunger advances)   |
//! | 1500 µs | stop                         |
//! | 1000 µs | reverse (rewind)             |
//!
//! The driver is generic over [`SetDutyCycle`], so the same code runs
//! against an LEDC channel on target and a recording mock in tests.

use embedded_hal::pwm::SetDutyCycle;

use crate::error::ActuatorError;

/// PWM carrier period at 50 Hz.
pub const PERIOD_US: u16 = 20_000;

pub const PULSE_FORWARD_US: u16 = 2000;
pub const PULSE_STOP_US: u16 = 1500;
pub const PULSE_REVERSE_US: u16 = 1000;

/// Range the servo accepts; anything outside is a programming error.
const PULSE_MIN_US: u16 = 500;
const PULSE_MAX_US: u16 = 2500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Stopped,
    Forward,
    Reverse,
}

pub struct ServoDriver<P> {
    pwm: P,
    motion: Motion,
}

impl<P: SetDutyCycle> ServoDriver<P> {
    /// Take the PWM channel and park the servo at the stop pulse.
    pub fn new(pwm: P) -> Result<Self, ActuatorError> {
        let mut driver = Self {
            pwm,
            motion: Motion::Stopped,
        };
        driver.stop()?;
        Ok(driver)
    }

    pub fn forward(&mut self) -> Result<(), ActuatorError> {
        self.write_pulse_us(PULSE_FORWARD_US)?;
        self.motion = Motion::Forward;
        Ok(())
    }

    pub fn reverse(&mut self) -> Result<(), ActuatorError> {
        self.write_pulse_us(PULSE_REVERSE_US)?;
        self.motion = Motion::Reverse;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), ActuatorError> {
        self.write_pulse_us(PULSE_STOP_US)?;
        self.motion = Motion::Stopped;
        Ok(())
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    /// Set the pulse width in microseconds.
    pub fn write_pulse_us(&mut self, pulse_us: u16) -> Result<(), ActuatorError> {
        if !(PULSE_MIN_US..=PULSE_MAX_US).contains(&pulse_us) {
            return Err(ActuatorError::PulseOutOfRange(pulse_us));
        }
        self.pwm
            .set_duty_cycle_fraction(pulse_us, PERIOD_US)
            .map_err(|_| ActuatorError::PwmWriteFailed)
    }
}
