//! PIO and DMA register bitfield definitions.
//!
//! Offsets and field positions follow the RP2040 datasheet (sections 2.5 and
//! 3.7). Only the fields this crate writes are listed.

// ── PIO instruction encoding ───────────────────────────────────────────────

/// Opcode field, bits 15:13.
pub const INSTR_OPCODE_SHIFT: u32 = 13;
pub const OPCODE_JMP: u16 = 0b000;
pub const OPCODE_IN: u16 = 0b010;
pub const OPCODE_OUT: u16 = 0b011;
pub const OPCODE_SET: u16 = 0b111;

/// Delay / side-set field, bits 12:8 (5 bits shared between the two).
pub const INSTR_DELAY_SIDESET_SHIFT: u32 = 8;
pub const INSTR_DELAY_SIDESET_BITS: u32 = 5;

/// Instruction-specific "arg1" field (condition, source, destination), bits 7:5.
pub const INSTR_ARG1_SHIFT: u32 = 5;

/// Instruction-specific "arg2" field (address, bit count, data), bits 4:0.
pub const INSTR_ARG2_MASK: u16 = 0x1f;

// ── PIO state machine registers ────────────────────────────────────────────

/// SMx_CLKDIV
/// - Bits 31:16 : INT
/// - Bits 15:8  : FRAC
pub const CLKDIV_INT_SHIFT: u32 = 16;
pub const CLKDIV_FRAC_SHIFT: u32 = 8;

/// SMx_EXECCTRL
/// - Bits 16:12 : WRAP_TOP
/// - Bits 11:7  : WRAP_BOTTOM
pub const EXECCTRL_WRAP_TOP_SHIFT: u32 = 12;
pub const EXECCTRL_WRAP_BOTTOM_SHIFT: u32 = 7;

/// SMx_SHIFTCTRL
/// - Bit 31     : FJOIN_RX
/// - Bit 30     : FJOIN_TX
/// - Bits 29:25 : PULL_THRESH (0 means 32)
/// - Bits 24:20 : PUSH_THRESH (0 means 32)
/// - Bit 19     : OUT_SHIFTDIR (1 = right)
/// - Bit 18     : IN_SHIFTDIR (1 = right)
/// - Bit 17     : AUTOPULL
/// - Bit 16     : AUTOPUSH
pub const SHIFTCTRL_FJOIN_RX: u32 = 1 << 31;
pub const SHIFTCTRL_FJOIN_TX: u32 = 1 << 30;
pub const SHIFTCTRL_PULL_THRESH_SHIFT: u32 = 25;
pub const SHIFTCTRL_PUSH_THRESH_SHIFT: u32 = 20;
pub const SHIFTCTRL_OUT_SHIFTDIR_RIGHT: u32 = 1 << 19;
pub const SHIFTCTRL_IN_SHIFTDIR_RIGHT: u32 = 1 << 18;
pub const SHIFTCTRL_AUTOPULL: u32 = 1 << 17;
pub const SHIFTCTRL_AUTOPUSH: u32 = 1 << 16;

/// SMx_PINCTRL
/// - Bits 31:29 : SIDESET_COUNT
/// - Bits 28:26 : SET_COUNT
/// - Bits 25:20 : OUT_COUNT
/// - Bits 19:15 : IN_BASE
/// - Bits 14:10 : SIDESET_BASE
/// - Bits 9:5   : SET_BASE
/// - Bits 4:0   : OUT_BASE
pub const PINCTRL_SIDESET_COUNT_SHIFT: u32 = 29;
pub const PINCTRL_SET_COUNT_SHIFT: u32 = 26;
pub const PINCTRL_OUT_COUNT_SHIFT: u32 = 20;
pub const PINCTRL_IN_BASE_SHIFT: u32 = 15;
pub const PINCTRL_SIDESET_BASE_SHIFT: u32 = 10;
pub const PINCTRL_SET_BASE_SHIFT: u32 = 5;
pub const PINCTRL_OUT_BASE_SHIFT: u32 = 0;

/// CTRL
/// - Bits 11:8 : CLKDIV_RESTART
/// - Bits 7:4  : SM_RESTART
/// - Bits 3:0  : SM_ENABLE
pub const CTRL_CLKDIV_RESTART_SHIFT: u32 = 8;
pub const CTRL_SM_RESTART_SHIFT: u32 = 4;
pub const CTRL_SM_ENABLE_SHIFT: u32 = 0;

// ── DMA channel control (CHx_CTRL_TRIG) ────────────────────────────────────

/// - Bit 0      : EN
/// - Bits 3:2   : DATA_SIZE (0 = byte, 1 = halfword, 2 = word)
/// - Bit 4      : INCR_READ
/// - Bit 5      : INCR_WRITE
/// - Bits 14:11 : CHAIN_TO (own index disables chaining)
/// - Bits 20:15 : TREQ_SEL
pub const DMA_CTRL_EN: u32 = 1 << 0;
pub const DMA_CTRL_DATA_SIZE_SHIFT: u32 = 2;
pub const DMA_CTRL_INCR_READ: u32 = 1 << 4;
pub const DMA_CTRL_INCR_WRITE: u32 = 1 << 5;
pub const DMA_CTRL_CHAIN_TO_SHIFT: u32 = 11;
pub const DMA_CTRL_TREQ_SEL_SHIFT: u32 = 15;

/// DREQ numbering: PIO0 TX0..3 = 0..3, PIO0 RX0..3 = 4..7, PIO1 TX0..3 = 8..11,
/// PIO1 RX0..3 = 12..15.
pub const DREQ_PIO_BLOCK_STRIDE: u8 = 8;
pub const DREQ_PIO_RX_OFFSET: u8 = 4;

// ── IO bank function select ────────────────────────────────────────────────

/// GPIOx_CTRL.FUNCSEL value routing a pin to PIO0 (PIO1 is `+ 1`).
pub const GPIO_FUNC_PIO0: u8 = 6;

// ── Pads ───────────────────────────────────────────────────────────────────

/// PADS_BANK0 GPIOx
/// - Bit 7 : OD (output disable)
/// - Bit 6 : IE (input enable)
pub const PADS_OD: u32 = 1 << 7;
pub const PADS_IE: u32 = 1 << 6;
