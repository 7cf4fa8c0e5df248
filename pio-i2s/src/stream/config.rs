//! Stream configuration.
//!
//! Pin map per mode (`C` is the clock base pin):
//!
//! | Mode | BCLK | LRCK | extra | data |
//! |------|------|------|-------|------|
//! | transmit | C | C+1 | | `data_out` |
//! | receive | C | C+1 | | `data_in` |
//! | transceive | C | C+1 | C+2, held low | `data_out`, `data_out + 1` in |
//!
//! Transmit samples are MSB aligned in the 32-bit word: only the top
//! `bit_depth` bits are shifted out. Received samples arrive right aligned.

use crate::constants::{DEFAULT_BIT_DEPTH, DMA_CHANNELS, GPIO_PINS, STATE_MACHINES_PER_BLOCK};
use crate::error::{Error, Result};
use crate::hw::registers::{
    EXECCTRL_WRAP_BOTTOM_SHIFT, EXECCTRL_WRAP_TOP_SHIFT, PINCTRL_IN_BASE_SHIFT,
    PINCTRL_OUT_BASE_SHIFT, PINCTRL_OUT_COUNT_SHIFT, PINCTRL_SET_BASE_SHIFT,
    PINCTRL_SET_COUNT_SHIFT, PINCTRL_SIDESET_BASE_SHIFT, PINCTRL_SIDESET_COUNT_SHIFT,
    SHIFTCTRL_AUTOPULL, SHIFTCTRL_AUTOPUSH, SHIFTCTRL_FJOIN_RX, SHIFTCTRL_FJOIN_TX,
    SHIFTCTRL_PULL_THRESH_SHIFT, SHIFTCTRL_PUSH_THRESH_SHIFT,
};
use crate::hw::{PioBlock, SmRegisters};
use crate::program::{validate_bit_depth, LoadedProgram, Mode};
use crate::registry::{BufferSource, CaptureSink};

use super::clock::ClockDivider;

/// Direction and data pins, with the endpoint each direction uses.
#[derive(Clone, Copy)]
pub enum StreamMode {
    Transmit {
        data_out: u8,
        source: &'static dyn BufferSource,
    },
    Receive {
        data_in: u8,
        sink: &'static dyn CaptureSink,
    },
    /// Data in is `data_out + 1`.
    Transceive {
        data_out: u8,
        source: &'static dyn BufferSource,
        sink: &'static dyn CaptureSink,
    },
}

impl StreamMode {
    pub fn kind(&self) -> Mode {
        match self {
            StreamMode::Transmit { .. } => Mode::Transmit,
            StreamMode::Receive { .. } => Mode::Receive,
            StreamMode::Transceive { .. } => Mode::Transceive,
        }
    }

    pub fn data_out(&self) -> Option<u8> {
        match *self {
            StreamMode::Transmit { data_out, .. } | StreamMode::Transceive { data_out, .. } => {
                Some(data_out)
            }
            StreamMode::Receive { .. } => None,
        }
    }

    pub fn data_in(&self) -> Option<u8> {
        match *self {
            StreamMode::Transmit { .. } => None,
            StreamMode::Receive { data_in, .. } => Some(data_in),
            StreamMode::Transceive { data_out, .. } => Some(data_out.saturating_add(1)),
        }
    }

    pub fn source(&self) -> Option<&'static dyn BufferSource> {
        match *self {
            StreamMode::Transmit { source, .. } | StreamMode::Transceive { source, .. } => {
                Some(source)
            }
            StreamMode::Receive { .. } => None,
        }
    }

    pub fn sink(&self) -> Option<&'static dyn CaptureSink> {
        match *self {
            StreamMode::Receive { sink, .. } | StreamMode::Transceive { sink, .. } => Some(sink),
            StreamMode::Transmit { .. } => None,
        }
    }
}

impl core::fmt::Debug for StreamMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StreamMode")
            .field("kind", &self.kind())
            .field("data_out", &self.data_out())
            .field("data_in", &self.data_in())
            .finish()
    }
}

/// Everything needed to build an [`I2sStream`](super::I2sStream).
///
/// ```ignore
/// static TONE: PatternBuffer<256> = PatternBuffer::new();
///
/// let config = StreamConfig::transmit(9, 10, &TONE)
///     .with_bit_depth(24)
///     .with_state_machine(PioBlock::Pio0, 1)
///     .with_dma_channel(4);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    pub mode: StreamMode,
    /// BCLK pin; LRCK is the next one.
    pub clock_base: u8,
    pub bit_depth: u8,
    pub pio: PioBlock,
    pub state_machine: u8,
    /// Transmit or receive channel. Transceive also uses the next channel,
    /// for receive.
    pub dma_channel: u8,
    pub divider: ClockDivider,
}

impl StreamConfig {
    fn with_mode(mode: StreamMode, clock_base: u8) -> Self {
        StreamConfig {
            mode,
            clock_base,
            bit_depth: DEFAULT_BIT_DEPTH,
            pio: PioBlock::Pio0,
            state_machine: 0,
            dma_channel: 0,
            divider: ClockDivider::DEFAULT,
        }
    }

    pub fn transmit(data_out: u8, clock_base: u8, source: &'static dyn BufferSource) -> Self {
        Self::with_mode(StreamMode::Transmit { data_out, source }, clock_base)
    }

    pub fn receive(data_in: u8, clock_base: u8, sink: &'static dyn CaptureSink) -> Self {
        Self::with_mode(StreamMode::Receive { data_in, sink }, clock_base)
    }

    pub fn transceive(
        data_out: u8,
        clock_base: u8,
        source: &'static dyn BufferSource,
        sink: &'static dyn CaptureSink,
    ) -> Self {
        Self::with_mode(
            StreamMode::Transceive {
                data_out,
                source,
                sink,
            },
            clock_base,
        )
    }

    pub fn with_bit_depth(mut self, bit_depth: u8) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    pub fn with_state_machine(mut self, pio: PioBlock, state_machine: u8) -> Self {
        self.pio = pio;
        self.state_machine = state_machine;
        self
    }

    pub fn with_dma_channel(mut self, dma_channel: u8) -> Self {
        self.dma_channel = dma_channel;
        self
    }

    pub fn with_divider(mut self, divider: ClockDivider) -> Self {
        self.divider = divider;
        self
    }

    /// `(transmit, receive)` DMA channel ids.
    pub fn dma_channels(&self) -> (Option<u8>, Option<u8>) {
        match self.mode {
            StreamMode::Transmit { .. } => (Some(self.dma_channel), None),
            StreamMode::Receive { .. } => (None, Some(self.dma_channel)),
            StreamMode::Transceive { .. } => {
                (Some(self.dma_channel), Some(self.dma_channel.saturating_add(1)))
            }
        }
    }

    /// Clock pins driven by side-set, BCLK first.
    pub fn clock_pins(&self) -> impl Iterator<Item = u8> {
        let base = self.clock_base;
        (0..self.mode.kind().clock_pins()).map(move |i| base.saturating_add(i))
    }

    /// Check everything that can be checked without touching hardware.
    pub fn validate(&self) -> Result<()> {
        validate_bit_depth(self.bit_depth)?;
        if self.state_machine as usize >= STATE_MACHINES_PER_BLOCK {
            return Err(Error::InvalidStateMachine);
        }
        let (tx, rx) = self.dma_channels();
        for channel in [tx, rx].into_iter().flatten() {
            if channel as usize >= DMA_CHANNELS {
                return Err(Error::InvalidDmaChannel(channel));
            }
        }

        let mut used = 0u32;
        let pins = self
            .clock_pins()
            .chain(self.mode.data_out())
            .chain(self.mode.data_in());
        for pin in pins {
            if pin >= GPIO_PINS {
                return Err(Error::InvalidPin(pin));
            }
            if used & (1 << pin) != 0 {
                return Err(Error::PinConflict(pin));
            }
            used |= 1 << pin;
        }
        Ok(())
    }

    /// Register values for running `program` on this stream's state machine.
    pub(crate) fn registers(&self, program: &LoadedProgram) -> SmRegisters {
        let kind = self.mode.kind();
        let top = program.address(program.len() as u8 - 1) as u32;
        let bottom = program.offset() as u32;
        let execctrl = top << EXECCTRL_WRAP_TOP_SHIFT | bottom << EXECCTRL_WRAP_BOTTOM_SHIFT;

        // 32 is encoded as 0
        let threshold = (self.bit_depth & 0x1f) as u32;
        let mut shiftctrl = 0;
        if kind.transmits() {
            shiftctrl |= SHIFTCTRL_AUTOPULL | threshold << SHIFTCTRL_PULL_THRESH_SHIFT;
        }
        if kind.receives() {
            shiftctrl |= SHIFTCTRL_AUTOPUSH | threshold << SHIFTCTRL_PUSH_THRESH_SHIFT;
        }
        match kind {
            Mode::Transmit => shiftctrl |= SHIFTCTRL_FJOIN_TX,
            Mode::Receive => shiftctrl |= SHIFTCTRL_FJOIN_RX,
            Mode::Transceive => {}
        }

        SmRegisters {
            clkdiv: self.divider.to_register(),
            execctrl,
            shiftctrl,
            pinctrl: self.pin_control(),
        }
    }

    /// PINCTRL for the running program.
    pub(crate) fn pin_control(&self) -> u32 {
        let mut pinctrl = (self.mode.kind().clock_pins() as u32) << PINCTRL_SIDESET_COUNT_SHIFT
            | (self.clock_base as u32) << PINCTRL_SIDESET_BASE_SHIFT;
        if let Some(pin) = self.mode.data_out() {
            pinctrl |= 1 << PINCTRL_OUT_COUNT_SHIFT | (pin as u32) << PINCTRL_OUT_BASE_SHIFT;
        }
        if let Some(pin) = self.mode.data_in() {
            pinctrl |= (pin as u32) << PINCTRL_IN_BASE_SHIFT;
        }
        pinctrl
    }

    /// PINCTRL that points `set` at a single pin, for direction setup.
    pub(crate) fn set_pin_control(&self, pin: u8) -> u32 {
        self.pin_control()
            | 1 << PINCTRL_SET_COUNT_SHIFT
            | (pin as u32) << PINCTRL_SET_BASE_SHIFT
    }

    /// Every pin the stream routes to PIO, with `true` for outputs.
    pub(crate) fn pin_directions(&self) -> impl Iterator<Item = (u8, bool)> {
        self.clock_pins()
            .chain(self.mode.data_out())
            .map(|pin| (pin, true))
            .chain(self.mode.data_in().map(|pin| (pin, false)))
    }
}
