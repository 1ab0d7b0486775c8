//! Telescope altimeter
//!
//! Reads gravity from a 3-axis accelerometer, turns it into an altitude angle
//! relative to a calibrated reference, and walks the user through calibration
//! with a single button.

#![cfg_attr(not(test), no_std)]

pub mod logger;
pub mod application;
pub mod config;
pub mod drivers;
pub mod os;

#[cfg(target_arch = "avr")]
pub mod hal;

pub use application::{Altimeter, Frame, Presenter, StartupError};
