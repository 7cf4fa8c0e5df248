//! The I2S stream: resource ownership, hardware setup and start/stop.
//!
//! ## Lifecycle
//!
//! ```text
//!   new() ──► Configured ──start()──► Running ──stop()──► Stopped
//!                                        ▲                   │
//!                                        └──────start()──────┘
//! ```
//!
//! Every claim a stream makes is an owned handle, so a failed `new()`
//! releases whatever it already took and dropping a stream releases the
//! rest. Dropping masks the channel interrupts, then deactivates the
//! registry slots, then aborts the transfers, all before any DMA channel or
//! state machine is given back.
//!
//! ## Usage with RTIC
//!
//! ```ignore
//! static TONE: PatternBuffer<128> = PatternBuffer::new();
//!
//! // init
//! let hw = Rp2040Hardware::new(pio0, pio1, dma, &mut resets, 125_000_000);
//! let mut stream = I2sStream::new(hw, StreamConfig::transmit(9, 10, &TONE))?;
//! stream.start()?;
//!
//! // DMA_IRQ_0
//! pio_i2s::dma_irq_handler(&hw);
//! ```

use crate::claims::{DmaChannel, HardwareClaims, StateMachine, CLAIMS};
use crate::dma::ChannelConfig;
use crate::error::{Error, Result};
use crate::hw::{DmaBackend, PioBackend, PioBlock};
use crate::program::instruction::SetDestination;
use crate::program::{synthesize, Entry, Instruction, LoadedProgram, Mode, SideSet};
use crate::registry::{Binding, ChannelRegistry, SlotGuard, REGISTRY};

use super::clock::ClockDivider;
use super::config::{StreamConfig, StreamMode};

/// Where a stream is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamState {
    /// Hardware set up, never started.
    Configured,
    Running,
    /// Stopped after running; `start()` restarts the state machine.
    Stopped,
}

/// A configured I2S stream on one state machine and one or two DMA
/// channels.
pub struct I2sStream<H: PioBackend + DmaBackend> {
    // Field order is drop order: slots, then channels, then PIO resources.
    tx_slot: Option<SlotGuard>,
    rx_slot: Option<SlotGuard>,
    tx_dma: Option<DmaChannel>,
    rx_dma: Option<DmaChannel>,
    program: LoadedProgram,
    sm: StateMachine,
    hw: H,
    mode: StreamMode,
    bit_depth: u8,
    divider: ClockDivider,
    entry: Entry,
    side_set: SideSet,
    state: StreamState,
}

impl<H: PioBackend + DmaBackend> I2sStream<H> {
    /// Build a stream registered in [`REGISTRY`] with claims taken from
    /// [`CLAIMS`].
    pub fn new(hw: H, config: StreamConfig) -> Result<Self> {
        Self::new_in(hw, config, &REGISTRY, &CLAIMS)
    }

    /// Build a stream against a specific registry and claim set.
    ///
    /// Every check and claim happens before the first register write, so
    /// on error the hardware is untouched.
    pub fn new_in(
        hw: H,
        config: StreamConfig,
        registry: &'static ChannelRegistry,
        claims: &'static HardwareClaims,
    ) -> Result<Self> {
        config.validate()?;
        let kind = config.mode.kind();
        let synthesized = synthesize(kind, config.bit_depth)?;
        if let Some(sink) = config.mode.sink() {
            if !sink.current().is_valid() {
                return Err(Error::InvalidBuffer);
            }
        }
        let (tx_id, rx_id) = config.dma_channels();
        let tx_config = tx_id
            .map(|ch| ChannelConfig::transmit(ch, config.pio, config.state_machine))
            .transpose()?;
        let rx_config = rx_id
            .map(|ch| ChannelConfig::receive(ch, config.pio, config.state_machine))
            .transpose()?;

        let sm = claims.claim_state_machine(config.pio, config.state_machine)?;
        let tx_dma = tx_id.map(|ch| claims.claim_dma_channel(ch)).transpose()?;
        let rx_dma = rx_id.map(|ch| claims.claim_dma_channel(ch)).transpose()?;

        let tx_slot = match (&tx_dma, config.mode.source()) {
            (Some(ch), Some(source)) => Some(registry.reserve(ch.id(), Binding::Transmit(source))?),
            _ => None,
        };
        let rx_slot = match (&rx_dma, config.mode.sink()) {
            (Some(ch), Some(sink)) => Some(registry.reserve(ch.id(), Binding::Receive(sink))?),
            _ => None,
        };

        // First hardware write; nothing after this fails.
        let program = LoadedProgram::load(&hw, claims, config.pio, &synthesized)?;

        let stream = I2sStream {
            tx_slot,
            rx_slot,
            tx_dma,
            rx_dma,
            program,
            sm,
            hw,
            mode: config.mode,
            bit_depth: config.bit_depth,
            divider: config.divider,
            entry: synthesized.entry(),
            side_set: synthesized.side_set(),
            state: StreamState::Configured,
        };
        stream.configure_hardware(&config, tx_config, rx_config);

        if let Some(slot) = &stream.tx_slot {
            slot.activate();
        }
        if let Some(slot) = &stream.rx_slot {
            slot.activate();
        }
        info!(
            "I2S stream on PIO{} SM{}: {} bits, {} Hz",
            config.pio.index(),
            config.state_machine,
            config.bit_depth,
            stream.sample_rate()
        );
        Ok(stream)
    }

    fn configure_hardware(
        &self,
        config: &StreamConfig,
        tx_config: Option<ChannelConfig>,
        rx_config: Option<ChannelConfig>,
    ) {
        let hw = &self.hw;
        let (block, sm) = (self.sm.block(), self.sm.id());
        let regs = config.registers(&self.program);

        hw.set_enabled(block, sm, false);
        hw.configure_state_machine(block, sm, &regs);

        let set_dir = |output: bool| {
            Instruction::set(SetDestination::PinDirs, output as u8).encode(self.side_set)
        };
        let set_low = Instruction::set(SetDestination::Pins, 0).encode(self.side_set);
        for (pin, output) in config.pin_directions() {
            hw.connect_pin(block, pin);
            hw.set_pin_control(block, sm, config.set_pin_control(pin));
            hw.exec(block, sm, set_dir(output));
            if output {
                hw.exec(block, sm, set_low);
            }
        }
        hw.set_pin_control(block, sm, regs.pinctrl);

        if let Some(dma) = tx_config {
            hw.configure(
                dma.channel(),
                dma.to_register(),
                core::ptr::null(),
                hw.tx_fifo(block, sm),
                0,
            );
        }
        if let (Some(dma), Some(sink)) = (rx_config, self.mode.sink()) {
            let target = sink.current();
            hw.configure(
                dma.channel(),
                dma.to_register(),
                hw.rx_fifo(block, sm),
                target.ptr as *mut u32,
                target.words,
            );
        }

        self.exec_entry();
    }

    /// Point the state machine at the program entry.
    fn exec_entry(&self) {
        let (block, sm) = (self.sm.block(), self.sm.id());
        if let Some(counter) = self.entry.counter {
            let preload = Instruction::set(SetDestination::X, counter).encode(self.side_set);
            self.hw.exec(block, sm, preload);
        }
        let jump = Instruction::jmp(self.entry.target)
            .relocate(self.program.offset())
            .encode(self.side_set);
        self.hw.exec(block, sm, jump);
    }

    /// Arm the first transfer(s) and enable the state machine.
    ///
    /// The transmit source is asked for a buffer here, while this stream's
    /// channel interrupt is still masked.
    pub fn start(&mut self) -> Result<()> {
        if self.state == StreamState::Running {
            return Err(Error::AlreadyRunning);
        }
        let tx_buffer = match self.mode.source() {
            Some(source) => {
                let buffer = source.next_buffer();
                if !buffer.is_valid() {
                    return Err(Error::InvalidBuffer);
                }
                Some(buffer)
            }
            None => None,
        };
        let rx_buffer = match self.mode.sink() {
            Some(sink) => {
                let buffer = sink.current();
                if !buffer.is_valid() {
                    return Err(Error::InvalidBuffer);
                }
                Some(buffer)
            }
            None => None,
        };

        let hw = &self.hw;
        let (block, sm) = (self.sm.block(), self.sm.id());
        if self.state == StreamState::Stopped {
            hw.restart(block, sm);
            hw.clear_fifos(block, sm);
            self.exec_entry();
        }

        if let (Some(ch), Some(buffer)) = (&self.rx_dma, rx_buffer) {
            self.clear_stale(ch.id());
            hw.set_irq_enabled(ch.id(), true);
            hw.arm_write(ch.id(), buffer.ptr as *mut u32, buffer.words);
        }
        if let (Some(ch), Some(buffer)) = (&self.tx_dma, tx_buffer) {
            self.clear_stale(ch.id());
            hw.set_irq_enabled(ch.id(), true);
            hw.arm_read(ch.id(), buffer.ptr as *const u32, buffer.words);
        }
        hw.set_enabled(block, sm, true);

        self.state = StreamState::Running;
        debug!("I2S stream on PIO{} SM{} started", block.index(), sm);
        Ok(())
    }

    /// Disable the state machine, mask the interrupts and abandon any
    /// in-flight transfer.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != StreamState::Running {
            return Err(Error::NotRunning);
        }
        self.mask_interrupts();
        self.halt();
        self.state = StreamState::Stopped;
        debug!(
            "I2S stream on PIO{} SM{} stopped",
            self.sm.block().index(),
            self.sm.id()
        );
        Ok(())
    }

    fn mask_interrupts(&self) {
        for ch in [&self.tx_dma, &self.rx_dma].into_iter().flatten() {
            self.hw.set_irq_enabled(ch.id(), false);
        }
    }

    /// Disable the state machine and abandon in-flight transfers. The
    /// channel interrupts must already be masked.
    fn halt(&self) {
        let hw = &self.hw;
        hw.set_enabled(self.sm.block(), self.sm.id(), false);
        for ch in [&self.tx_dma, &self.rx_dma].into_iter().flatten() {
            hw.abort(ch.id());
            self.clear_stale(ch.id());
        }
    }

    /// Clear a completion flag raised by an abort, never one already clear.
    fn clear_stale(&self, channel: u8) {
        if self.hw.raw_complete(channel) {
            self.hw.acknowledge(channel);
        }
    }

    /// Change the divider. Applies from the next instruction.
    pub fn set_clock_divider(&mut self, divider: ClockDivider) {
        self.hw
            .set_clock_divider(self.sm.block(), self.sm.id(), divider.to_register());
        self.divider = divider;
    }

    /// Pick the divider closest to `sample_rate` and return the rate it
    /// actually gives.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<f32> {
        let divider = ClockDivider::for_sample_rate(
            self.hw.system_clock_hz(),
            sample_rate,
            self.bit_depth,
            self.mode(),
        )?;
        self.set_clock_divider(divider);
        Ok(self.sample_rate())
    }

    /// Stereo frames per second at the current divider.
    pub fn sample_rate(&self) -> f32 {
        self.divider
            .sample_rate(self.hw.system_clock_hz(), self.bit_depth, self.mode())
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn mode(&self) -> Mode {
        self.mode.kind()
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub fn clock_divider(&self) -> ClockDivider {
        self.divider
    }

    /// `(transmit, receive)` DMA channel ids.
    pub fn dma_channels(&self) -> (Option<u8>, Option<u8>) {
        (
            self.tx_dma.as_ref().map(DmaChannel::id),
            self.rx_dma.as_ref().map(DmaChannel::id),
        )
    }

    /// PIO block and state machine id.
    pub fn state_machine(&self) -> (PioBlock, u8) {
        (self.sm.block(), self.sm.id())
    }

    /// Instruction memory offset of the program.
    pub fn program_offset(&self) -> u8 {
        self.program.offset()
    }

    /// Latest completed capture; see [`CaptureSink::copy_latest`](crate::CaptureSink::copy_latest).
    /// `None` for transmit streams.
    pub fn copy_latest_capture(&self, out: &mut [i32]) -> Option<u32> {
        self.mode.sink()?.copy_latest(out)
    }
}

impl<H: PioBackend + DmaBackend> Drop for I2sStream<H> {
    fn drop(&mut self) {
        // A completion landing after the mask stays off the shared line and
        // is cleared by `halt()`; the dispatcher never sees an inactive slot
        // with its interrupt still enabled.
        self.mask_interrupts();
        for slot in [&self.tx_slot, &self.rx_slot].into_iter().flatten() {
            slot.deactivate();
        }
        self.halt();
    }
}
