//! PIO program synthesis and loading.
//!
//! - [`instruction`]: PIO instruction model and binary encoding
//! - [`synth`]: I2S program generation for a mode and bit depth
//! - [`memory`]: placement in instruction memory

pub mod instruction;
pub mod memory;
pub mod synth;


pub use instruction::{Instruction, SideSet};
pub use memory::LoadedProgram;
pub use synth::{synthesize, validate_bit_depth, Entry, Mode, Program, MAX_PROGRAM_LENGTH};
