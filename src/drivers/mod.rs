//! Actuator and input drivers over `embedded-hal` traits.

pub mod button;
pub mod buzzer;
pub mod servo;
pub mod watchdog;
