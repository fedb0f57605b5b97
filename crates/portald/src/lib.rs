//! Resident captive portal client.
//!
//! [`ControlLoop`] alternates between online detection and login, waiting
//! `loop_interval` between cycles. [`setup`] wires it from the settings file.

mod control_loop;
mod detector;
pub mod setup;

pub use control_loop::{ControlLoop, CycleOutcome, LoopConfig, LoopState, ShutdownOutcome};
pub use detector::{Offline, OnlineDetector};
