//! I2S streams.
//!
//! - [`clock`]: divider encoding and the sample-rate model
//! - [`config`]: pins, mode and resources of a stream
//! - [`controller`]: [`I2sStream`], which owns the claimed hardware

pub mod clock;
pub mod config;
pub mod controller;


pub use clock::ClockDivider;
pub use config::{StreamConfig, StreamMode};
pub use controller::{I2sStream, StreamState};
