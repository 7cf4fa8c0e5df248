/// Number of physical DMA channels (and channel registry slots).
pub const DMA_CHANNELS: usize = 12;

/// Number of PIO blocks.
pub const PIO_BLOCKS: usize = 2;

/// State machines per PIO block.
pub const STATE_MACHINES_PER_BLOCK: usize = 4;

/// Instruction memory slots per PIO block, shared by every loaded program.
pub const INSTRUCTION_MEMORY_SLOTS: usize = 32;

/// Number of GPIO pins a PIO block can reach.
pub const GPIO_PINS: u8 = 30;

/// Smallest supported bits per sample.
pub const MIN_BIT_DEPTH: u8 = 2;

/// Largest supported bits per sample.
pub const MAX_BIT_DEPTH: u8 = 32;

/// Default bits per sample.
pub const DEFAULT_BIT_DEPTH: u8 = 32;

/// Default clock divider in 1/256 units: 9.765625, which gives 96 kHz at
/// 32 bits from a 120 MHz system clock.
pub const DEFAULT_CLOCK_DIVIDER: u32 = 2500;
