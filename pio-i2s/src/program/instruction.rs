//! Typed PIO instructions.
//!
//! Only the handful of operations the I2S programs need are modelled. Each
//! [`Instruction`] keeps its fields structured until [`Instruction::encode`]
//! packs it into the 16-bit word the state machine executes; all bit packing
//! lives here.

use crate::hw::registers as reg;

/// JMP condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JmpCondition {
    /// Unconditional.
    Always = 0b000,
    /// Jump while X is non-zero, decrementing X either way.
    XPostDecrement = 0b010,
}

/// IN source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InSource {
    /// Pins starting at the IN base.
    Pins = 0b000,
    /// All zeroes.
    Null = 0b011,
}

/// OUT destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutDestination {
    /// Pins starting at the OUT base.
    Pins = 0b000,
}

/// SET destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetDestination {
    /// Pin levels starting at the SET base.
    Pins = 0b000,
    /// Scratch register X (the bit counter).
    X = 0b001,
    /// Pin directions starting at the SET base.
    PinDirs = 0b100,
}

/// Operation part of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Branch to a program-relative address.
    Jmp { condition: JmpCondition, address: u8 },
    /// Shift `bit_count` bits into the input shift register.
    In { source: InSource, bit_count: u8 },
    /// Shift `bit_count` bits out of the output shift register.
    Out { destination: OutDestination, bit_count: u8 },
    /// Load a 5-bit immediate.
    Set { destination: SetDestination, data: u8 },
}

/// Number of side-set pins a program drives on every instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideSet {
    count: u8,
}

impl SideSet {
    /// Side-set on `count` pins (no optional bit, values only).
    pub const fn new(count: u8) -> Self {
        debug_assert!(count <= 5);
        SideSet { count }
    }

    /// Number of side-set pins.
    pub const fn count(&self) -> u8 {
        self.count
    }

    /// Largest delay that still fits next to the side-set bits.
    pub const fn max_delay(&self) -> u8 {
        (1 << (reg::INSTR_DELAY_SIDESET_BITS as u8 - self.count)) - 1
    }
}

/// One PIO instruction with its side-set value and delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub operation: Operation,
    pub side: u8,
    pub delay: u8,
}

impl Instruction {
    const fn new(operation: Operation) -> Self {
        Instruction {
            operation,
            side: 0,
            delay: 0,
        }
    }

    /// `out pins, <bit_count>`
    pub const fn out_pins(bit_count: u8) -> Self {
        Self::new(Operation::Out {
            destination: OutDestination::Pins,
            bit_count,
        })
    }

    /// `in pins, <bit_count>`
    pub const fn in_pins(bit_count: u8) -> Self {
        Self::new(Operation::In {
            source: InSource::Pins,
            bit_count,
        })
    }

    /// `in null, <bit_count>`
    pub const fn in_null(bit_count: u8) -> Self {
        Self::new(Operation::In {
            source: InSource::Null,
            bit_count,
        })
    }

    /// `set <destination>, <data>`
    pub const fn set(destination: SetDestination, data: u8) -> Self {
        Self::new(Operation::Set { destination, data })
    }

    /// `jmp <address>`
    pub const fn jmp(address: u8) -> Self {
        Self::new(Operation::Jmp {
            condition: JmpCondition::Always,
            address,
        })
    }

    /// `jmp x--, <address>`
    pub const fn jmp_x_dec(address: u8) -> Self {
        Self::new(Operation::Jmp {
            condition: JmpCondition::XPostDecrement,
            address,
        })
    }

    /// Attach a side-set value.
    pub const fn side(mut self, side: u8) -> Self {
        self.side = side;
        self
    }

    /// Attach extra delay cycles.
    pub const fn delay(mut self, delay: u8) -> Self {
        self.delay = delay;
        self
    }

    /// Shift a JMP target by the load offset. Other operations are unchanged.
    pub fn relocate(self, offset: u8) -> Self {
        match self.operation {
            Operation::Jmp { condition, address } => Instruction {
                operation: Operation::Jmp {
                    condition,
                    address: address + offset,
                },
                ..self
            },
            _ => self,
        }
    }

    /// Pack into the 16-bit instruction word.
    pub fn encode(&self, side_set: SideSet) -> u16 {
        debug_assert!(self.delay <= side_set.max_delay(), "delay too long");
        debug_assert!(
            (self.side as u16) < (1 << side_set.count()),
            "side-set value wider than side-set pins"
        );

        let (opcode, arg1, arg2) = match self.operation {
            Operation::Jmp { condition, address } => {
                (reg::OPCODE_JMP, condition as u16, address as u16)
            }
            Operation::In { source, bit_count } => {
                (reg::OPCODE_IN, source as u16, encode_bit_count(bit_count))
            }
            Operation::Out {
                destination,
                bit_count,
            } => (
                reg::OPCODE_OUT,
                destination as u16,
                encode_bit_count(bit_count),
            ),
            Operation::Set { destination, data } => {
                (reg::OPCODE_SET, destination as u16, data as u16)
            }
        };

        let delay_bits = reg::INSTR_DELAY_SIDESET_BITS as u16 - side_set.count() as u16;
        let delay_side = ((self.side as u16) << delay_bits) | self.delay as u16;

        (opcode << reg::INSTR_OPCODE_SHIFT)
            | (delay_side << reg::INSTR_DELAY_SIDESET_SHIFT)
            | (arg1 << reg::INSTR_ARG1_SHIFT)
            | (arg2 & reg::INSTR_ARG2_MASK)
    }
}

/// Bit counts 1..=32; 32 is encoded as 0.
fn encode_bit_count(bit_count: u8) -> u16 {
    debug_assert!((1..=32).contains(&bit_count));
    (bit_count as u16) & reg::INSTR_ARG2_MASK
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PINS: SideSet = SideSet::new(2);

    #[test]
    fn encodes_known_words() {
        // Reference words for a 2-pin side-set I2S transmitter.
        assert_eq!(Instruction::out_pins(1).side(2).encode(TWO_PINS), 0x7001);
        assert_eq!(Instruction::out_pins(1).encode(TWO_PINS), 0x6001);
        assert_eq!(Instruction::jmp_x_dec(0).side(3).encode(TWO_PINS), 0x1840);
        assert_eq!(Instruction::jmp_x_dec(4).side(1).encode(TWO_PINS), 0x0844);
        assert_eq!(
            Instruction::set(SetDestination::X, 30).side(1).encode(TWO_PINS),
            0xe820 | 30
        );
        assert_eq!(
            Instruction::set(SetDestination::X, 30).side(3).encode(TWO_PINS),
            0xf820 | 30
        );
    }

    #[test]
    fn in_pins_and_null() {
        assert_eq!(Instruction::in_pins(1).encode(TWO_PINS), 0x4001);
        assert_eq!(Instruction::in_null(31).encode(TWO_PINS), 0x407f);
    }

    #[test]
    fn thirty_two_bits_encode_as_zero() {
        assert_eq!(Instruction::out_pins(32).encode(TWO_PINS), 0x6000);
    }

    #[test]
    fn delay_shares_field_with_side_set() {
        let three = SideSet::new(3);
        assert_eq!(three.max_delay(), 3);
        assert_eq!(TWO_PINS.max_delay(), 7);
        // side 0b010 in the top three bits, delay 1 in the bottom two
        let word = Instruction::out_pins(1).side(2).delay(1).encode(three);
        assert_eq!((word >> 8) & 0x1f, 0b01001);
    }

    #[test]
    fn set_pindirs_encoding() {
        let word = Instruction::set(SetDestination::PinDirs, 1).encode(TWO_PINS);
        assert_eq!(word, 0xe081);
    }

    #[test]
    fn relocate_only_moves_jumps() {
        let jmp = Instruction::jmp_x_dec(4).side(1).relocate(10);
        assert_eq!(
            jmp.operation,
            Operation::Jmp {
                condition: JmpCondition::XPostDecrement,
                address: 14
            }
        );
        assert_eq!(jmp.side, 1);

        let out = Instruction::out_pins(1).relocate(10);
        assert_eq!(out, Instruction::out_pins(1));
    }
}
