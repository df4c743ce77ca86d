//! DosePump firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(feature = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod api;
pub mod app;
pub mod config;
pub mod dosing;
pub mod error;
pub mod pins;

// Adapters and drivers carry host simulation backends, so they build
// (and test) without the ESP-IDF feature.
pub mod adapters;
pub mod drivers;
