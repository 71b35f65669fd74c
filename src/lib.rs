//! # rusty_hand
//!
//! Drives a multi-finger robotic hand from a tracked hand pose.
//!
//! ```text
//! landmarks -> curl -> normalize (calibration) -> protocol -> serial
//!                                                               |
//!                                firmware: decode -> actuate <--+
//! ```
//!
//! The host side (`curl`, `calibration`, `normalize`, `protocol`,
//! `transport`, `session`) runs next to the camera. The `firmware` module is
//! the controller side of the link and avoids heap allocation so it can run
//! on a microcontroller; `servo_sim` runs it on the host for bench testing.

pub mod args;
pub mod calibration;
pub mod camera;
pub mod config;
pub mod curl;
pub mod error;
pub mod firmware;
pub mod normalize;
pub mod protocol;
pub mod session;
pub mod tracker;
pub mod transport;
pub mod types;
