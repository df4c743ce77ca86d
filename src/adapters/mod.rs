//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to                 |
//! |-------------|--------------------|-----------------------------|
//! | `hardware`  | ActuatorPort       | Servo PWM, delay            |
//! |             | BuzzerPort         | Piezo PWM                   |
//! | `log_sink`  | EventSink          | Serial log output           |
//! | `live_sink` | EventSink          | Live update channel         |
//! | `display`   | EventSink          | OLED status page (text)     |
//! | `nvs`       | ConfigPort         | NVS / in-memory store       |
//! |             | StoragePort        |                             |
//! | `time`      | —                  | ESP32 system timer, SNTP    |

pub mod display;
pub mod hardware;
pub mod live_sink;
pub mod log_sink;
pub mod nvs;
pub mod time;
