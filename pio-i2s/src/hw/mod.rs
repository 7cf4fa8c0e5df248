//! Hardware seam.
//!
//! Everything above this module computes packed register words; the traits
//! here only move those words into the peripheral. All methods take `&self`
//! and are single bounded register accesses, so they are safe to call from
//! interrupt context.
//!
//! | Trait | Used by |
//! |-------|---------|
//! | [`PioBackend`] | program loading, state machine setup, start/stop |
//! | [`DmaBackend`] | channel setup, start/stop, interrupt dispatch |

pub mod registers;

#[cfg(feature = "rp2040")]
pub mod rp2040;

#[cfg(test)]
pub(crate) mod mock;

/// One of the two PIO blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PioBlock {
    Pio0 = 0,
    Pio1 = 1,
}

impl PioBlock {
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

/// Packed state machine configuration, written in one go before the program
/// starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmRegisters {
    pub clkdiv: u32,
    pub execctrl: u32,
    pub shiftctrl: u32,
    pub pinctrl: u32,
}

/// Register access to the PIO blocks.
pub trait PioBackend {
    /// Write one word of instruction memory.
    fn write_instruction(&self, block: PioBlock, addr: u8, word: u16);

    /// Write CLKDIV, EXECCTRL, SHIFTCTRL and PINCTRL of a state machine.
    fn configure_state_machine(&self, block: PioBlock, sm: u8, regs: &SmRegisters);

    /// Write CLKDIV only; takes effect on the next instruction boundary.
    fn set_clock_divider(&self, block: PioBlock, sm: u8, clkdiv: u32);

    /// Write PINCTRL only.
    fn set_pin_control(&self, block: PioBlock, sm: u8, pinctrl: u32);

    /// Execute an instruction immediately, outside the program.
    fn exec(&self, block: PioBlock, sm: u8, word: u16);

    fn set_enabled(&self, block: PioBlock, sm: u8, enabled: bool);

    /// Reset the state machine's internal state and clock divider phase.
    fn restart(&self, block: PioBlock, sm: u8);

    /// Drop any words left in both FIFOs.
    fn clear_fifos(&self, block: PioBlock, sm: u8);

    /// Route a GPIO to the PIO block.
    fn connect_pin(&self, block: PioBlock, pin: u8);

    /// Address of the TX FIFO (DMA write target).
    fn tx_fifo(&self, block: PioBlock, sm: u8) -> *mut u32;

    /// Address of the RX FIFO (DMA read source).
    fn rx_fifo(&self, block: PioBlock, sm: u8) -> *const u32;

    /// System clock feeding the PIO clock dividers.
    fn system_clock_hz(&self) -> u32;
}

/// Register access to the DMA engine and its shared completion interrupt.
pub trait DmaBackend {
    /// Write control, addresses and count without starting the channel.
    fn configure(&self, channel: u8, ctrl: u32, read: *const u32, write: *mut u32, count: u32);

    /// Start a transfer of `count` words from `read`.
    fn arm_read(&self, channel: u8, read: *const u32, count: u32);

    /// Start a transfer of `count` words into `write`.
    fn arm_write(&self, channel: u8, write: *mut u32, count: u32);

    /// Abandon any in-flight transfer.
    fn abort(&self, channel: u8);

    /// Enable or mask the channel on the shared completion interrupt.
    fn set_irq_enabled(&self, channel: u8, enabled: bool);

    /// Completion pending and enabled on the shared interrupt.
    fn irq_pending(&self, channel: u8) -> bool;

    /// Completion flag regardless of the interrupt mask.
    fn raw_complete(&self, channel: u8) -> bool;

    /// Clear this channel's completion flag and no other.
    fn acknowledge(&self, channel: u8);
}

impl<T: PioBackend + ?Sized> PioBackend for &T {
    fn write_instruction(&self, block: PioBlock, addr: u8, word: u16) {
        (**self).write_instruction(block, addr, word)
    }
    fn configure_state_machine(&self, block: PioBlock, sm: u8, regs: &SmRegisters) {
        (**self).configure_state_machine(block, sm, regs)
    }
    fn set_clock_divider(&self, block: PioBlock, sm: u8, clkdiv: u32) {
        (**self).set_clock_divider(block, sm, clkdiv)
    }
    fn set_pin_control(&self, block: PioBlock, sm: u8, pinctrl: u32) {
        (**self).set_pin_control(block, sm, pinctrl)
    }
    fn exec(&self, block: PioBlock, sm: u8, word: u16) {
        (**self).exec(block, sm, word)
    }
    fn set_enabled(&self, block: PioBlock, sm: u8, enabled: bool) {
        (**self).set_enabled(block, sm, enabled)
    }
    fn restart(&self, block: PioBlock, sm: u8) {
        (**self).restart(block, sm)
    }
    fn clear_fifos(&self, block: PioBlock, sm: u8) {
        (**self).clear_fifos(block, sm)
    }
    fn connect_pin(&self, block: PioBlock, pin: u8) {
        (**self).connect_pin(block, pin)
    }
    fn tx_fifo(&self, block: PioBlock, sm: u8) -> *mut u32 {
        (**self).tx_fifo(block, sm)
    }
    fn rx_fifo(&self, block: PioBlock, sm: u8) -> *const u32 {
        (**self).rx_fifo(block, sm)
    }
    fn system_clock_hz(&self) -> u32 {
        (**self).system_clock_hz()
    }
}

impl<T: DmaBackend + ?Sized> DmaBackend for &T {
    fn configure(&self, channel: u8, ctrl: u32, read: *const u32, write: *mut u32, count: u32) {
        (**self).configure(channel, ctrl, read, write, count)
    }
    fn arm_read(&self, channel: u8, read: *const u32, count: u32) {
        (**self).arm_read(channel, read, count)
    }
    fn arm_write(&self, channel: u8, write: *mut u32, count: u32) {
        (**self).arm_write(channel, write, count)
    }
    fn abort(&self, channel: u8) {
        (**self).abort(channel)
    }
    fn set_irq_enabled(&self, channel: u8, enabled: bool) {
        (**self).set_irq_enabled(channel, enabled)
    }
    fn irq_pending(&self, channel: u8) -> bool {
        (**self).irq_pending(channel)
    }
    fn raw_complete(&self, channel: u8) -> bool {
        (**self).raw_complete(channel)
    }
    fn acknowledge(&self, channel: u8) {
        (**self).acknowledge(channel)
    }
}
