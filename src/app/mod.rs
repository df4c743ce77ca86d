//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the command and event vocabulary of the pump and
//! the service that routes commands into the dose scheduler. All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
