//! Utility Module
//!
//! - [`time`]: frame timing feeding the adaptive quality controller

pub mod time;

pub use time::FrameTimer;
