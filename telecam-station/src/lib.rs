//! # telecam-station — headless ground station
//!
//! Opens a `telecam-core` link to the camera, drives it from stdin,
//! writes periodic PPM snapshots of the received frames and can print
//! every link event as a JSON line.

pub mod config;
pub mod console;
pub mod events;
pub mod snapshot;
