//! Error type shared by every configuration path.
//!
//! Runtime anomalies seen by the interrupt dispatcher are never reported
//! through [`Error`]; they are counted in the registry statistics instead.

use core::fmt;

/// Configuration and lifecycle errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bit depth outside `2..=32`.
    InvalidBitDepth(u8),
    /// GPIO number the PIO block cannot reach.
    InvalidPin(u8),
    /// The same GPIO is assigned to two roles.
    PinConflict(u8),
    /// DMA channel id outside `0..12`.
    InvalidDmaChannel(u8),
    /// PIO block or state machine id out of range.
    InvalidStateMachine,
    /// DMA channel already claimed.
    DmaChannelInUse(u8),
    /// Every DMA channel is claimed.
    NoFreeDmaChannel,
    /// State machine already claimed.
    StateMachineInUse,
    /// No contiguous run of instruction memory is large enough.
    InstructionMemoryFull,
    /// The registry slot for this channel already has an owner.
    SlotOccupied(u8),
    /// Clock divider below 1.0 or above the 16-bit integer range.
    InvalidDivider,
    /// Buffer empty or not a whole number of frames.
    InvalidBuffer,
    /// Another context is editing the same buffer.
    Busy,
    /// `start()` on a running stream.
    AlreadyRunning,
    /// Operation requires a running stream.
    NotRunning,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidBitDepth(n) => write!(f, "bit depth {n} outside 2..=32"),
            Error::InvalidPin(p) => write!(f, "GPIO {p} is not reachable from PIO"),
            Error::PinConflict(p) => write!(f, "GPIO {p} assigned twice"),
            Error::InvalidDmaChannel(c) => write!(f, "DMA channel {c} does not exist"),
            Error::InvalidStateMachine => f.write_str("state machine id out of range"),
            Error::DmaChannelInUse(c) => write!(f, "DMA channel {c} already claimed"),
            Error::NoFreeDmaChannel => f.write_str("no free DMA channel"),
            Error::StateMachineInUse => f.write_str("state machine already claimed"),
            Error::InstructionMemoryFull => f.write_str("PIO instruction memory exhausted"),
            Error::SlotOccupied(c) => write!(f, "registry slot {c} already active"),
            Error::InvalidDivider => f.write_str("clock divider out of range"),
            Error::InvalidBuffer => f.write_str("buffer is empty or not whole frames"),
            Error::Busy => f.write_str("buffer is being edited elsewhere"),
            Error::AlreadyRunning => f.write_str("stream is already running"),
            Error::NotRunning => f.write_str("stream is not running"),
        }
    }
}

/// Crate result alias.
pub type Result<T> = core::result::Result<T, Error>;
