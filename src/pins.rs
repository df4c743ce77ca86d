//! GPIO / peripheral pin assignments for the pump main board (ESP32).
//!
//! Single source of truth. `main` moves the matching `Peripherals` pins
//! into the drivers and asserts at compile time that they agree with the
//! numbers here.

// ---------------------------------------------------------------------------
// Worm-drive servo (continuous rotation, 50 Hz)
// ---------------------------------------------------------------------------

/// LEDC output to the servo signal line.
pub const SERVO_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// User I/O
// ---------------------------------------------------------------------------

/// Prime button, active LOW with internal pull-up.
pub const BUTTON_GPIO: i32 = 4;
/// Piezo buzzer, LEDC output.
pub const BUZZER_GPIO: i32 = 25;

// ---------------------------------------------------------------------------
// Status display (SH1106 128×64 on I2C)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// 7-bit I2C address of the OLED.
pub const OLED_I2C_ADDR: u8 = 0x3C;
