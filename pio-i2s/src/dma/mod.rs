//! DMA channel configuration for PIO FIFO transfers.

pub mod config;

pub use config::{dreq, ChannelConfig, Direction};
