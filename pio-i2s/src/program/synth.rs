//! I2S program synthesis.
//!
//! Every program drives BCLK on side-set bit 0 and LRCK on side-set bit 1.
//! One frame half (left, then right) is `N` bit periods: a counter loop
//! shifts `N - 1` bits and the instruction pair at the frame boundary shifts
//! the last bit while flipping LRCK, one bit ahead of the next MSB as I2S
//! requires, and reloads the counter with `N - 2`.
//!
//! ```text
//!  transmit / receive (8)            transceive (12)
//!  0: shift      side L0 B0          0: out        side L0 B0 [1]
//!  1: jmp x-- 0  side L0 B1          1: in         side L0 B1
//!  2: shift      side L1 B0          2: jmp x-- 0  side L0 B1
//!  3: set x,N-2  side L1 B1          3: out        side L1 B0 [1]
//!  4: shift      side L1 B0          4: in         side L1 B1
//!  5: jmp x-- 4  side L1 B1          5: set x,N-2  side L1 B1
//!  6: shift      side L0 B0          6..11: same with LRCK inverted
//!  7: set x,N-2  side L0 B1
//! ```
//!
//! `shift` is `out pins, 1` for transmit and `in pins, 1` for receive.

use crate::constants::{MAX_BIT_DEPTH, MIN_BIT_DEPTH};
use crate::error::{Error, Result};

use super::instruction::{Instruction, SetDestination, SideSet};

/// Longest program the synthesizer emits.
pub const MAX_PROGRAM_LENGTH: usize = 12;

const BCLK: u8 = 0b01;
const LRCK: u8 = 0b10;

/// Data direction of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Data out only.
    Transmit,
    /// Data in only.
    Receive,
    /// Simultaneous data out and data in on one clock.
    Transceive,
}

impl Mode {
    /// State machine cycles per serial bit.
    pub const fn cycles_per_bit(&self) -> u32 {
        match self {
            Mode::Transmit | Mode::Receive => 2,
            Mode::Transceive => 4,
        }
    }

    /// Number of clock pins driven by side-set.
    pub const fn clock_pins(&self) -> u8 {
        match self {
            Mode::Transmit | Mode::Receive => 2,
            Mode::Transceive => 3,
        }
    }

    /// Whether the program shifts data out.
    pub const fn transmits(&self) -> bool {
        matches!(self, Mode::Transmit | Mode::Transceive)
    }

    /// Whether the program shifts data in.
    pub const fn receives(&self) -> bool {
        matches!(self, Mode::Receive | Mode::Transceive)
    }
}

/// How a freshly configured state machine is pointed at its program.
///
/// The stream force-executes `set x, counter` (when present) followed by
/// `jmp target`, both program-relative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub counter: Option<u8>,
    pub target: u8,
}

/// A synthesized, not yet loaded, I2S program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Program {
    mode: Mode,
    bit_depth: u8,
    instructions: [Instruction; MAX_PROGRAM_LENGTH],
    len: u8,
    side_set: SideSet,
    entry: Entry,
}

impl Program {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Program instructions with program-relative jump targets.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn side_set(&self) -> SideSet {
        self.side_set
    }

    /// Program-relative `(bottom, top)` wrap range. The last instruction
    /// always wraps to the first.
    pub fn wrap(&self) -> (u8, u8) {
        (0, self.len - 1)
    }

    pub fn entry(&self) -> Entry {
        self.entry
    }

    /// Encoded words as they would appear when loaded at `offset`.
    pub fn encoded(&self, offset: u8) -> impl Iterator<Item = u16> + '_ {
        let side_set = self.side_set;
        self.instructions()
            .iter()
            .map(move |instr| instr.relocate(offset).encode(side_set))
    }
}

/// Check a bit depth against the supported range.
pub fn validate_bit_depth(bit_depth: u8) -> Result<()> {
    if (MIN_BIT_DEPTH..=MAX_BIT_DEPTH).contains(&bit_depth) {
        Ok(())
    } else {
        Err(Error::InvalidBitDepth(bit_depth))
    }
}

/// Build the program for `mode` at `bit_depth` bits per sample.
pub fn synthesize(mode: Mode, bit_depth: u8) -> Result<Program> {
    validate_bit_depth(bit_depth)?;
    let reload = Instruction::set(SetDestination::X, bit_depth - 2);

    let mut instructions = [Instruction::jmp(0); MAX_PROGRAM_LENGTH];
    let (len, entry) = match mode {
        Mode::Transmit | Mode::Receive => {
            let shift = if mode == Mode::Transmit {
                Instruction::out_pins(1)
            } else {
                Instruction::in_pins(1)
            };
            let code = [
                shift.side(0),
                Instruction::jmp_x_dec(0).side(BCLK),
                shift.side(LRCK),
                reload.side(LRCK | BCLK),
                shift.side(LRCK),
                Instruction::jmp_x_dec(4).side(LRCK | BCLK),
                shift.side(0),
                reload.side(BCLK),
            ];
            instructions[..code.len()].copy_from_slice(&code);

            // A receiver's first completed word must end on the bit sampled
            // right after an LRCK edge, so it starts one bit into the left
            // half with the counter preloaded. A transmitter starts on the
            // counter reload ahead of the left MSB.
            let entry = if mode == Mode::Transmit {
                Entry {
                    counter: None,
                    target: 7,
                }
            } else {
                Entry {
                    counter: Some(bit_depth - 2),
                    target: 1,
                }
            };
            (code.len(), entry)
        }
        Mode::Transceive => {
            let out = Instruction::out_pins(1).delay(1);
            let input = Instruction::in_pins(1);
            let code = [
                out.side(0),
                input.side(BCLK),
                Instruction::jmp_x_dec(0).side(BCLK),
                out.side(LRCK),
                input.side(LRCK | BCLK),
                reload.side(LRCK | BCLK),
                out.side(LRCK),
                input.side(LRCK | BCLK),
                Instruction::jmp_x_dec(6).side(LRCK | BCLK),
                out.side(0),
                input.side(BCLK),
                reload.side(BCLK),
            ];
            instructions.copy_from_slice(&code);
            (
                code.len(),
                Entry {
                    counter: None,
                    target: 11,
                },
            )
        }
    };

    Ok(Program {
        mode,
        bit_depth,
        instructions,
        len: len as u8,
        side_set: SideSet::new(mode.clock_pins()),
        entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::instruction::{JmpCondition, Operation};

    #[test]
    fn program_lengths_for_every_bit_depth() {
        for n in MIN_BIT_DEPTH..=MAX_BIT_DEPTH {
            assert_eq!(synthesize(Mode::Transmit, n).unwrap().len(), 8);
            assert_eq!(synthesize(Mode::Receive, n).unwrap().len(), 8);
            assert_eq!(synthesize(Mode::Transceive, n).unwrap().len(), 12);
        }
    }

    #[test]
    fn rejects_out_of_range_bit_depth() {
        assert_eq!(
            synthesize(Mode::Transmit, 1).unwrap_err(),
            Error::InvalidBitDepth(1)
        );
        assert_eq!(
            synthesize(Mode::Receive, 33).unwrap_err(),
            Error::InvalidBitDepth(33)
        );
        assert_eq!(
            synthesize(Mode::Transceive, 0).unwrap_err(),
            Error::InvalidBitDepth(0)
        );
    }

    #[test]
    fn transmit_words_for_32_bits() {
        let program = synthesize(Mode::Transmit, 32).unwrap();
        let mut words = [0u16; 8];
        for (slot, word) in words.iter_mut().zip(program.encoded(0)) {
            *slot = word;
        }
        assert_eq!(
            words,
            [0x6001, 0x0840, 0x7001, 0xf83e, 0x7001, 0x1844, 0x6001, 0xe83e]
        );
    }

    #[test]
    fn counter_reload_is_bit_depth_minus_two() {
        for n in [2u8, 3, 16, 24, 32] {
            let program = synthesize(Mode::Transceive, n).unwrap();
            let reloads = program
                .instructions()
                .iter()
                .filter(|i| {
                    i.operation
                        == Operation::Set {
                            destination: SetDestination::X,
                            data: n - 2,
                        }
                })
                .count();
            assert_eq!(reloads, 2, "bit depth {n}");
        }
    }

    #[test]
    fn last_instruction_wraps_to_first() {
        for mode in [Mode::Transmit, Mode::Receive, Mode::Transceive] {
            let program = synthesize(mode, 16).unwrap();
            assert_eq!(program.wrap(), (0, program.len() as u8 - 1));
        }
    }

    #[test]
    fn jumps_stay_inside_program() {
        for mode in [Mode::Transmit, Mode::Receive, Mode::Transceive] {
            let program = synthesize(mode, 32).unwrap();
            for instr in program.instructions() {
                if let Operation::Jmp { address, .. } = instr.operation {
                    assert!((address as usize) < program.len());
                }
            }
            assert!((program.entry().target as usize) < program.len());
        }
    }

    #[test]
    fn encoded_relocates_jumps() {
        let program = synthesize(Mode::Transmit, 32).unwrap();
        let second = program.encoded(20).nth(1).unwrap();
        assert_eq!(second & 0x1f, 20);
        assert_eq!(
            program.instructions()[1].operation,
            Operation::Jmp {
                condition: JmpCondition::XPostDecrement,
                address: 0
            }
        );
    }

    #[test]
    fn transceive_uses_three_side_set_pins() {
        let program = synthesize(Mode::Transceive, 32).unwrap();
        assert_eq!(program.side_set().count(), 3);
        assert!(program.instructions().iter().all(|i| i.side < 0b100));
    }

    #[test]
    fn receive_entry_preloads_counter() {
        let program = synthesize(Mode::Receive, 24).unwrap();
        assert_eq!(
            program.entry(),
            Entry {
                counter: Some(22),
                target: 1
            }
        );
    }
}
