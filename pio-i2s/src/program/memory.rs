//! Placement of programs in PIO instruction memory.

use crate::claims::HardwareClaims;
use crate::constants::INSTRUCTION_MEMORY_SLOTS;
use crate::error::{Error, Result};
use crate::hw::{PioBackend, PioBlock};

use super::synth::Program;

/// A program resident in instruction memory. Its slots are freed on drop.
#[derive(Debug)]
pub struct LoadedProgram {
    block: PioBlock,
    offset: u8,
    len: u8,
    claims: &'static HardwareClaims,
}

impl LoadedProgram {
    /// Reserve a contiguous run for `program` in `block` and write it there.
    ///
    /// Offsets are tried from the top of memory down, so programs loaded by
    /// other code at offset 0 are left undisturbed.
    pub fn load<P: PioBackend>(
        pio: &P,
        claims: &'static HardwareClaims,
        block: PioBlock,
        program: &Program,
    ) -> Result<Self> {
        let len = program.len();
        if len == 0 || len > INSTRUCTION_MEMORY_SLOTS {
            return Err(Error::InstructionMemoryFull);
        }
        let run = run_mask(len);

        let offset = (0..=(INSTRUCTION_MEMORY_SLOTS - len))
            .rev()
            .find(|&offset| claims.reserve_instructions(block, run << offset))
            .ok_or(Error::InstructionMemoryFull)? as u8;

        for (i, word) in program.encoded(offset).enumerate() {
            pio.write_instruction(block, offset + i as u8, word);
        }
        debug!(
            "loaded {} instructions at PIO{} offset {}",
            len,
            block.index(),
            offset
        );

        Ok(LoadedProgram {
            block,
            offset,
            len: len as u8,
            claims,
        })
    }

    pub fn block(&self) -> PioBlock {
        self.block
    }

    /// Absolute address of program instruction 0.
    pub fn offset(&self) -> u8 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute address of a program-relative instruction.
    pub fn address(&self, relative: u8) -> u8 {
        self.offset + relative
    }
}

impl Drop for LoadedProgram {
    fn drop(&mut self) {
        self.claims
            .free_instructions(self.block, run_mask(self.len as usize) << self.offset);
    }
}

fn run_mask(len: usize) -> u32 {
    if len >= 32 {
        u32::MAX
    } else {
        (1u32 << len) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::mock::MockHardware;
    use crate::program::synth::{synthesize, Mode};

    #[test]
    fn loads_at_top_of_memory() {
        static CLAIMS: HardwareClaims = HardwareClaims::new();
        let hw = MockHardware::new(125_000_000);
        let program = synthesize(Mode::Transmit, 32).unwrap();
        let loaded = LoadedProgram::load(&hw, &CLAIMS, PioBlock::Pio0, &program).unwrap();
        assert_eq!(loaded.offset(), 24);
        assert_eq!(CLAIMS.instruction_mask(PioBlock::Pio0), 0xff00_0000);
        // jmp x-- 0 relocated to 24
        assert_eq!(hw.instruction(PioBlock::Pio0, 25), 0x0840 | 24);
        assert_eq!(hw.instruction(PioBlock::Pio0, 24), 0x6001);
    }

    #[test]
    fn programs_share_a_block_without_overlap() {
        static CLAIMS: HardwareClaims = HardwareClaims::new();
        let hw = MockHardware::new(125_000_000);
        let trx = synthesize(Mode::Transceive, 16).unwrap();
        let tx = synthesize(Mode::Transmit, 16).unwrap();
        let a = LoadedProgram::load(&hw, &CLAIMS, PioBlock::Pio1, &trx).unwrap();
        let b = LoadedProgram::load(&hw, &CLAIMS, PioBlock::Pio1, &tx).unwrap();
        assert_eq!(a.offset(), 20);
        assert_eq!(b.offset(), 12);
        assert_eq!(CLAIMS.instruction_mask(PioBlock::Pio1), 0xffff_f000);
        drop(a);
        assert_eq!(CLAIMS.instruction_mask(PioBlock::Pio1), 0x000f_f000);
    }

    #[test]
    fn full_memory_is_reported() {
        static CLAIMS: HardwareClaims = HardwareClaims::new();
        let hw = MockHardware::new(125_000_000);
        let program = synthesize(Mode::Transmit, 32).unwrap();
        assert!(CLAIMS.reserve_instructions(PioBlock::Pio0, 0xffff_fff0));
        // only slots 0..4 remain
        assert_eq!(
            LoadedProgram::load(&hw, &CLAIMS, PioBlock::Pio0, &program).unwrap_err(),
            Error::InstructionMemoryFull
        );
        assert_eq!(hw.events(), 0);
    }

    #[test]
    fn fills_gap_between_programs() {
        static CLAIMS: HardwareClaims = HardwareClaims::new();
        let hw = MockHardware::new(125_000_000);
        assert!(CLAIMS.reserve_instructions(PioBlock::Pio0, 0xf000_00ff));
        let program = synthesize(Mode::Receive, 24).unwrap();
        let loaded = LoadedProgram::load(&hw, &CLAIMS, PioBlock::Pio0, &program).unwrap();
        assert_eq!(loaded.offset(), 20);
        assert_eq!(loaded.address(7), 27);
    }
}
