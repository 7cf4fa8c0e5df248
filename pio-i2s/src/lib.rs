//! # pio-i2s
//!
//! A `no_std`, allocation-free I2S engine for the
//! [RP2040](https://www.raspberrypi.com/products/rp2040/). A PIO state
//! machine generates BCLK and LRCK and shifts the serial data, and one DMA
//! channel per direction moves samples between memory and the PIO FIFOs.
//! Channels re-arm themselves from the shared DMA completion interrupt, so
//! a running stream needs no CPU time beyond one handler call per buffer.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Program | [`program`] | PIO instruction encoding, I2S program synthesis, instruction memory |
//! | Transfer | [`dma`] | DMA channel control words and FIFO pacing |
//! | Interrupt | [`registry`] | Per-channel slots and the completion dispatcher |
//! | Stream | [`stream`] | Pin and clock setup, start/stop, sample-rate control |
//! | Ownership | [`claims`] | Exclusive state machines, DMA channels and memory slots |
//! | Hardware | [`hw`] | Register backend traits and the RP2040 implementation |
//! | Signal | [`pattern`] | Double-buffered test-pattern source (feature-gated) |
//!
//! ## Quick start
//!
//! ```ignore
//! use pio_i2s::{I2sStream, PatternBuffer, Pattern, PatternSettings, StreamConfig};
//!
//! static TONE: PatternBuffer<256> = PatternBuffer::new();
//!
//! TONE.configure(PatternSettings {
//!     pattern: Pattern::Sine,
//!     offset: 0,
//!     amplitude: 1 << 28,
//!     length: 96,
//! })?;
//!
//! // Data on GPIO 9, BCLK on GPIO 10, LRCK on GPIO 11.
//! let hw = Rp2040Hardware::new(pio0, pio1, dma, &mut resets, 125_000_000);
//! let mut stream = I2sStream::new(hw, StreamConfig::transmit(9, 10, &TONE))?;
//! stream.set_sample_rate(48_000)?;
//! stream.start()?;
//!
//! // In the DMA_IRQ_0 handler:
//! pio_i2s::dma_irq_handler(&hw);
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `pattern` | yes | [`PatternBuffer`] test-signal source |
//! | `rp2040` | no | [`Rp2040Hardware`] register backend (requires `rp2040-pac`) |
//! | `defmt` | no | Logging and `Format` impls through `defmt` |
//! | `log` | no | Logging through `log` when `defmt` is off |
//!
//! ## Stream parameters
//!
//! - **Bit depth:** 2 to 32 bits per sample, 32 by default
//! - **Sample format:** `i32` words, left-justified, left channel first
//! - **Sample rate:** `sys_clk * 256 / (divider * cycles_per_bit * 2 * bits)`,
//!   96 kHz at 120 MHz with the default divider ([`ClockDivider::DEFAULT`])
//! - **Pins:** data, then BCLK and LRCK on consecutive GPIOs from the clock base

#![no_std]

#[macro_use]
mod fmt;

pub mod claims;
pub mod constants;
pub mod dma;
pub mod error;
pub mod hw;
pub mod program;
pub mod registry;
pub mod stream;

#[cfg(feature = "pattern")]
pub mod pattern;

pub use claims::{HardwareClaims, CLAIMS};
pub use error::{Error, Result};
pub use hw::{DmaBackend, PioBackend, PioBlock};
pub use program::Mode;
pub use registry::{
    dma_irq_handler, BufferSource, CaptureBuffers, CaptureSink, ChannelRegistry, DispatchReport,
    RxBuffer, StaticBuffer, TxBuffer, REGISTRY,
};
pub use stream::{ClockDivider, I2sStream, StreamConfig, StreamMode, StreamState};

#[cfg(feature = "pattern")]
pub use pattern::{Pattern, PatternBuffer, PatternSettings};

#[cfg(feature = "rp2040")]
pub use hw::rp2040::Rp2040Hardware;
