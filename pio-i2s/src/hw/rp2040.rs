//! RP2040 register backend.
//!
//! [`Rp2040Hardware::new`] consumes the PIO and DMA peripherals and takes
//! them out of reset. The handle itself only carries the system clock, so
//! it is `Copy`: the stream owns one copy and the DMA interrupt another.
//!
//! GPIO routing writes `IO_BANK0` and `PADS_BANK0` directly for the pins a
//! stream uses. Those pins must not also be driven through another HAL.

use rp2040_pac as pac;

use super::registers::{
    CTRL_CLKDIV_RESTART_SHIFT, CTRL_SM_ENABLE_SHIFT, CTRL_SM_RESTART_SHIFT, GPIO_FUNC_PIO0,
    PADS_IE, PADS_OD, SHIFTCTRL_FJOIN_RX,
};
use super::{DmaBackend, PioBackend, PioBlock, SmRegisters};

/// Register access to PIO0, PIO1, DMA and the GPIO bank.
#[derive(Debug, Clone, Copy)]
pub struct Rp2040Hardware {
    system_clock_hz: u32,
}

impl Rp2040Hardware {
    pub fn new(
        _pio0: pac::PIO0,
        _pio1: pac::PIO1,
        _dma: pac::DMA,
        resets: &mut pac::RESETS,
        system_clock_hz: u32,
    ) -> Self {
        resets.reset().modify(|_, w| {
            w.pio0()
                .clear_bit()
                .pio1()
                .clear_bit()
                .dma()
                .clear_bit()
                .io_bank0()
                .clear_bit()
                .pads_bank0()
                .clear_bit()
        });
        loop {
            let done = resets.reset_done().read();
            if done.pio0().bit_is_set()
                && done.pio1().bit_is_set()
                && done.dma().bit_is_set()
                && done.io_bank0().bit_is_set()
                && done.pads_bank0().bit_is_set()
            {
                break;
            }
        }
        info!("PIO and DMA out of reset, sys clock {} Hz", system_clock_hz);
        Rp2040Hardware { system_clock_hz }
    }

    fn pio(&self, block: PioBlock) -> &'static pac::pio0::RegisterBlock {
        // SAFETY: both blocks were consumed in `new()`, and PIO1 has the
        // same register layout as PIO0.
        unsafe {
            match block {
                PioBlock::Pio0 => &*pac::PIO0::ptr(),
                PioBlock::Pio1 => &*pac::PIO1::ptr(),
            }
        }
    }

    fn dma(&self) -> &'static pac::dma::RegisterBlock {
        // SAFETY: consumed in `new()`; every access below touches only the
        // bits of a single channel or uses a critical section.
        unsafe { &*pac::DMA::ptr() }
    }

    fn pio_ctrl_modify(&self, block: PioBlock, f: impl FnOnce(u32) -> u32) {
        let ctrl = self.pio(block).ctrl();
        critical_section::with(|_| {
            let bits = f(ctrl.read().bits());
            ctrl.write(|w| unsafe { w.bits(bits) });
        });
    }
}

impl PioBackend for Rp2040Hardware {
    fn write_instruction(&self, block: PioBlock, addr: u8, word: u16) {
        self.pio(block)
            .instr_mem(addr as usize)
            .write(|w| unsafe { w.bits(word as u32) });
    }

    fn configure_state_machine(&self, block: PioBlock, sm: u8, regs: &SmRegisters) {
        let sm = self.pio(block).sm(sm as usize);
        sm.sm_clkdiv().write(|w| unsafe { w.bits(regs.clkdiv) });
        sm.sm_execctrl().write(|w| unsafe { w.bits(regs.execctrl) });
        sm.sm_shiftctrl().write(|w| unsafe { w.bits(regs.shiftctrl) });
        sm.sm_pinctrl().write(|w| unsafe { w.bits(regs.pinctrl) });
    }

    fn set_clock_divider(&self, block: PioBlock, sm: u8, clkdiv: u32) {
        self.pio(block)
            .sm(sm as usize)
            .sm_clkdiv()
            .write(|w| unsafe { w.bits(clkdiv) });
    }

    fn set_pin_control(&self, block: PioBlock, sm: u8, pinctrl: u32) {
        self.pio(block)
            .sm(sm as usize)
            .sm_pinctrl()
            .write(|w| unsafe { w.bits(pinctrl) });
    }

    fn exec(&self, block: PioBlock, sm: u8, word: u16) {
        self.pio(block)
            .sm(sm as usize)
            .sm_instr()
            .write(|w| unsafe { w.bits(word as u32) });
    }

    fn set_enabled(&self, block: PioBlock, sm: u8, enabled: bool) {
        let bit = 1 << (CTRL_SM_ENABLE_SHIFT + sm as u32);
        self.pio_ctrl_modify(block, |ctrl| if enabled { ctrl | bit } else { ctrl & !bit });
    }

    fn restart(&self, block: PioBlock, sm: u8) {
        // Restart bits are self-clearing.
        let bits = 1 << (CTRL_SM_RESTART_SHIFT + sm as u32)
            | 1 << (CTRL_CLKDIV_RESTART_SHIFT + sm as u32);
        self.pio_ctrl_modify(block, |ctrl| ctrl | bits);
    }

    fn clear_fifos(&self, block: PioBlock, sm: u8) {
        // Changing the join mode flushes both FIFOs; toggle it twice.
        let shiftctrl = self.pio(block).sm(sm as usize).sm_shiftctrl();
        for _ in 0..2 {
            shiftctrl.modify(|r, w| unsafe { w.bits(r.bits() ^ SHIFTCTRL_FJOIN_RX) });
        }
    }

    fn connect_pin(&self, block: PioBlock, pin: u8) {
        // SAFETY: single-register writes to the control of one pin.
        let io = unsafe { &*pac::IO_BANK0::ptr() };
        let pads = unsafe { &*pac::PADS_BANK0::ptr() };
        let funcsel = (GPIO_FUNC_PIO0 + block.index() as u8) as u32;
        io.gpio(pin as usize)
            .gpio_ctrl()
            .write(|w| unsafe { w.bits(funcsel) });
        pads.gpio(pin as usize)
            .modify(|r, w| unsafe { w.bits((r.bits() | PADS_IE) & !PADS_OD) });
    }

    fn tx_fifo(&self, block: PioBlock, sm: u8) -> *mut u32 {
        self.pio(block).txf(sm as usize).as_ptr()
    }

    fn rx_fifo(&self, block: PioBlock, sm: u8) -> *const u32 {
        self.pio(block).rxf(sm as usize).as_ptr() as *const u32
    }

    fn system_clock_hz(&self) -> u32 {
        self.system_clock_hz
    }
}

impl DmaBackend for Rp2040Hardware {
    fn configure(&self, channel: u8, ctrl: u32, read: *const u32, write: *mut u32, count: u32) {
        let ch = self.dma().ch(channel as usize);
        ch.ch_read_addr().write(|w| unsafe { w.bits(read as u32) });
        ch.ch_write_addr().write(|w| unsafe { w.bits(write as u32) });
        ch.ch_trans_count().write(|w| unsafe { w.bits(count) });
        // Alias 1 CTRL does not trigger.
        ch.ch_al1_ctrl().write(|w| unsafe { w.bits(ctrl) });
    }

    fn arm_read(&self, channel: u8, read: *const u32, count: u32) {
        let ch = self.dma().ch(channel as usize);
        ch.ch_trans_count().write(|w| unsafe { w.bits(count) });
        ch.ch_al3_read_addr_trig()
            .write(|w| unsafe { w.bits(read as u32) });
    }

    fn arm_write(&self, channel: u8, write: *mut u32, count: u32) {
        let ch = self.dma().ch(channel as usize);
        ch.ch_trans_count().write(|w| unsafe { w.bits(count) });
        ch.ch_al2_write_addr_trig()
            .write(|w| unsafe { w.bits(write as u32) });
    }

    fn abort(&self, channel: u8) {
        self.dma()
            .chan_abort()
            .write(|w| unsafe { w.bits(1 << channel) });
    }

    fn set_irq_enabled(&self, channel: u8, enabled: bool) {
        let inte = self.dma().inte0();
        let bit = 1u32 << channel;
        critical_section::with(|_| {
            inte.modify(|r, w| unsafe {
                w.bits(if enabled { r.bits() | bit } else { r.bits() & !bit })
            });
        });
    }

    fn irq_pending(&self, channel: u8) -> bool {
        self.dma().ints0().read().bits() & (1 << channel) != 0
    }

    fn raw_complete(&self, channel: u8) -> bool {
        self.dma().intr().read().bits() & (1 << channel) != 0
    }

    fn acknowledge(&self, channel: u8) {
        // Write-one-to-clear: only this channel's bit.
        self.dma()
            .ints0()
            .write(|w| unsafe { w.bits(1 << channel) });
    }
}
