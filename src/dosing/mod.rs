//! Dosing core: reservoir accounting, delivery modes, pulse timing, and
//! the scheduler that ties them together.
//!
//! Everything in here is pure logic over the [`ports`](crate::app::ports)
//! traits and runs unchanged on the host test harness.

pub mod activity;
pub mod persist;
pub mod reservoir;
pub mod scheduler;
pub mod timing;

/// Volume tolerance (units) for "nothing left" and "nothing pending".
pub const EPSILON: f32 = 0.01;
