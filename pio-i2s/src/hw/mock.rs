//! Register-recording backend for host tests.

use core::cell::{Cell, RefCell};

use crate::constants::{
    DMA_CHANNELS, INSTRUCTION_MEMORY_SLOTS, PIO_BLOCKS, STATE_MACHINES_PER_BLOCK,
};

use super::{DmaBackend, PioBackend, PioBlock, SmRegisters};

const LOG_LEN: usize = 512;

/// One recorded register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Instruction { block: usize, addr: u8, word: u16 },
    ConfigureSm { block: usize, sm: u8 },
    ClockDivider { block: usize, sm: u8, clkdiv: u32 },
    PinControl { block: usize, sm: u8, pinctrl: u32 },
    Exec { block: usize, sm: u8, word: u16 },
    Enable { block: usize, sm: u8, enabled: bool },
    Restart { block: usize, sm: u8 },
    ClearFifos { block: usize, sm: u8 },
    ConnectPin { block: usize, pin: u8 },
    ConfigureDma(u8),
    ArmRead(u8),
    ArmWrite(u8),
    Abort(u8),
    IrqEnable(u8, bool),
    Ack(u8),
}

/// Simulated DMA channel registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockChannel {
    pub ctrl: u32,
    pub read: usize,
    pub write: usize,
    pub count: u32,
    pub irq_enabled: bool,
    pub raw: bool,
    pub busy: bool,
    pub arms: u32,
    pub acks: u32,
    pub aborts: u32,
}

struct State {
    instr_mem: [[u16; INSTRUCTION_MEMORY_SLOTS]; PIO_BLOCKS],
    sm: [[SmRegisters; STATE_MACHINES_PER_BLOCK]; PIO_BLOCKS],
    enabled: [[bool; STATE_MACHINES_PER_BLOCK]; PIO_BLOCKS],
    fifos: [[u32; STATE_MACHINES_PER_BLOCK * 2]; PIO_BLOCKS],
    dma: [MockChannel; DMA_CHANNELS],
    log: [Option<Event>; LOG_LEN],
    log_len: usize,
}

/// Backend that keeps a register file and an ordered write log.
pub struct MockHardware {
    state: RefCell<State>,
    system_clock_hz: u32,
    /// Model the RP2040 quirk where an abort can raise the completion flag.
    pub abort_raises_flag: bool,
    /// Called right after a channel interrupt is masked.
    pub on_irq_mask: Cell<Option<fn(&MockHardware, u8)>>,
}

impl MockHardware {
    pub fn new(system_clock_hz: u32) -> Self {
        MockHardware {
            state: RefCell::new(State {
                instr_mem: [[0; INSTRUCTION_MEMORY_SLOTS]; PIO_BLOCKS],
                sm: [[SmRegisters::default(); STATE_MACHINES_PER_BLOCK]; PIO_BLOCKS],
                enabled: [[false; STATE_MACHINES_PER_BLOCK]; PIO_BLOCKS],
                fifos: [[0; STATE_MACHINES_PER_BLOCK * 2]; PIO_BLOCKS],
                dma: [MockChannel::default(); DMA_CHANNELS],
                log: [None; LOG_LEN],
                log_len: 0,
            }),
            system_clock_hz,
            abort_raises_flag: false,
            on_irq_mask: Cell::new(None),
        }
    }

    fn record(&self, event: Event) {
        let mut state = self.state.borrow_mut();
        let len = state.log_len;
        if len < LOG_LEN {
            state.log[len] = Some(event);
            state.log_len = len + 1;
        }
    }

    /// Finish the in-flight transfer on `channel`, raising its flag.
    pub fn complete(&self, channel: u8) {
        let mut state = self.state.borrow_mut();
        let ch = &mut state.dma[channel as usize];
        ch.busy = false;
        ch.raw = true;
    }

    pub fn channel(&self, channel: u8) -> MockChannel {
        self.state.borrow().dma[channel as usize]
    }

    pub fn instruction(&self, block: PioBlock, addr: u8) -> u16 {
        self.state.borrow().instr_mem[block.index()][addr as usize]
    }

    pub fn sm_registers(&self, block: PioBlock, sm: u8) -> SmRegisters {
        self.state.borrow().sm[block.index()][sm as usize]
    }

    pub fn is_enabled(&self, block: PioBlock, sm: u8) -> bool {
        self.state.borrow().enabled[block.index()][sm as usize]
    }

    pub fn events(&self) -> usize {
        self.state.borrow().log_len
    }

    pub fn event(&self, idx: usize) -> Event {
        self.state.borrow().log[idx].expect("event index out of range")
    }

    /// Index of the first event matching `pred`.
    pub fn position(&self, pred: impl Fn(&Event) -> bool) -> Option<usize> {
        let state = self.state.borrow();
        state.log[..state.log_len]
            .iter()
            .position(|e| e.as_ref().is_some_and(&pred))
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        let state = self.state.borrow();
        state.log[..state.log_len]
            .iter()
            .filter(|e| e.as_ref().is_some_and(&pred))
            .count()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.borrow_mut();
        state.log = [None; LOG_LEN];
        state.log_len = 0;
    }
}

impl PioBackend for MockHardware {
    fn write_instruction(&self, block: PioBlock, addr: u8, word: u16) {
        self.state.borrow_mut().instr_mem[block.index()][addr as usize] = word;
        self.record(Event::Instruction {
            block: block.index(),
            addr,
            word,
        });
    }

    fn configure_state_machine(&self, block: PioBlock, sm: u8, regs: &SmRegisters) {
        self.state.borrow_mut().sm[block.index()][sm as usize] = *regs;
        self.record(Event::ConfigureSm {
            block: block.index(),
            sm,
        });
    }

    fn set_clock_divider(&self, block: PioBlock, sm: u8, clkdiv: u32) {
        self.state.borrow_mut().sm[block.index()][sm as usize].clkdiv = clkdiv;
        self.record(Event::ClockDivider {
            block: block.index(),
            sm,
            clkdiv,
        });
    }

    fn set_pin_control(&self, block: PioBlock, sm: u8, pinctrl: u32) {
        self.state.borrow_mut().sm[block.index()][sm as usize].pinctrl = pinctrl;
        self.record(Event::PinControl {
            block: block.index(),
            sm,
            pinctrl,
        });
    }

    fn exec(&self, block: PioBlock, sm: u8, word: u16) {
        self.record(Event::Exec {
            block: block.index(),
            sm,
            word,
        });
    }

    fn set_enabled(&self, block: PioBlock, sm: u8, enabled: bool) {
        self.state.borrow_mut().enabled[block.index()][sm as usize] = enabled;
        self.record(Event::Enable {
            block: block.index(),
            sm,
            enabled,
        });
    }

    fn restart(&self, block: PioBlock, sm: u8) {
        self.record(Event::Restart {
            block: block.index(),
            sm,
        });
    }

    fn clear_fifos(&self, block: PioBlock, sm: u8) {
        self.record(Event::ClearFifos {
            block: block.index(),
            sm,
        });
    }

    fn connect_pin(&self, block: PioBlock, pin: u8) {
        self.record(Event::ConnectPin {
            block: block.index(),
            pin,
        });
    }

    fn tx_fifo(&self, block: PioBlock, sm: u8) -> *mut u32 {
        let mut state = self.state.borrow_mut();
        &mut state.fifos[block.index()][sm as usize] as *mut u32
    }

    fn rx_fifo(&self, block: PioBlock, sm: u8) -> *const u32 {
        let state = self.state.borrow();
        &state.fifos[block.index()][STATE_MACHINES_PER_BLOCK + sm as usize] as *const u32
    }

    fn system_clock_hz(&self) -> u32 {
        self.system_clock_hz
    }
}

impl DmaBackend for MockHardware {
    fn configure(&self, channel: u8, ctrl: u32, read: *const u32, write: *mut u32, count: u32) {
        {
            let mut state = self.state.borrow_mut();
            let ch = &mut state.dma[channel as usize];
            ch.ctrl = ctrl;
            ch.read = read as usize;
            ch.write = write as usize;
            ch.count = count;
        }
        self.record(Event::ConfigureDma(channel));
    }

    fn arm_read(&self, channel: u8, read: *const u32, count: u32) {
        {
            let mut state = self.state.borrow_mut();
            let ch = &mut state.dma[channel as usize];
            ch.read = read as usize;
            ch.count = count;
            ch.busy = true;
            ch.arms += 1;
        }
        self.record(Event::ArmRead(channel));
    }

    fn arm_write(&self, channel: u8, write: *mut u32, count: u32) {
        {
            let mut state = self.state.borrow_mut();
            let ch = &mut state.dma[channel as usize];
            ch.write = write as usize;
            ch.count = count;
            ch.busy = true;
            ch.arms += 1;
        }
        self.record(Event::ArmWrite(channel));
    }

    fn abort(&self, channel: u8) {
        {
            let mut state = self.state.borrow_mut();
            let raise = self.abort_raises_flag;
            let ch = &mut state.dma[channel as usize];
            if ch.busy && raise {
                ch.raw = true;
            }
            ch.busy = false;
            ch.aborts += 1;
        }
        self.record(Event::Abort(channel));
    }

    fn set_irq_enabled(&self, channel: u8, enabled: bool) {
        self.state.borrow_mut().dma[channel as usize].irq_enabled = enabled;
        self.record(Event::IrqEnable(channel, enabled));
        if !enabled {
            if let Some(hook) = self.on_irq_mask.get() {
                hook(self, channel);
            }
        }
    }

    fn irq_pending(&self, channel: u8) -> bool {
        let ch = self.state.borrow().dma[channel as usize];
        ch.raw && ch.irq_enabled
    }

    fn raw_complete(&self, channel: u8) -> bool {
        self.state.borrow().dma[channel as usize].raw
    }

    fn acknowledge(&self, channel: u8) {
        {
            let mut state = self.state.borrow_mut();
            let ch = &mut state.dma[channel as usize];
            ch.raw = false;
            ch.acks += 1;
        }
        self.record(Event::Ack(channel));
    }
}
