//! Control words for PIO-paced DMA channels.
//!
//! A transmit channel reads a caller buffer with auto-increment and writes
//! the fixed TX FIFO address. A receive channel reads the fixed RX FIFO
//! address and writes a capture block with auto-increment. Both move 32-bit
//! words, paced by the state machine's DREQ, and chain to themselves so no
//! other channel is triggered on completion.

use crate::constants::{DMA_CHANNELS, STATE_MACHINES_PER_BLOCK};
use crate::error::{Error, Result};
use crate::hw::registers::{
    DMA_CTRL_CHAIN_TO_SHIFT, DMA_CTRL_DATA_SIZE_SHIFT, DMA_CTRL_EN, DMA_CTRL_INCR_READ,
    DMA_CTRL_INCR_WRITE, DMA_CTRL_TREQ_SEL_SHIFT, DREQ_PIO_BLOCK_STRIDE, DREQ_PIO_RX_OFFSET,
};
use crate::hw::PioBlock;

/// DATA_SIZE value for 32-bit transfers.
const DATA_SIZE_WORD: u32 = 2;

/// Which FIFO a channel services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Memory to TX FIFO.
    Transmit,
    /// RX FIFO to memory.
    Receive,
}

/// DREQ number of a state machine FIFO.
pub const fn dreq(block: PioBlock, sm: u8, direction: Direction) -> u8 {
    let base = block as u8 * DREQ_PIO_BLOCK_STRIDE + sm;
    match direction {
        Direction::Transmit => base,
        Direction::Receive => base + DREQ_PIO_RX_OFFSET,
    }
}

/// Configuration of one DMA channel bound to one state machine FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    channel: u8,
    direction: Direction,
    dreq: u8,
}

impl ChannelConfig {
    /// Memory to the TX FIFO of `sm`.
    pub fn transmit(channel: u8, block: PioBlock, sm: u8) -> Result<Self> {
        Self::new(channel, block, sm, Direction::Transmit)
    }

    /// RX FIFO of `sm` to memory.
    pub fn receive(channel: u8, block: PioBlock, sm: u8) -> Result<Self> {
        Self::new(channel, block, sm, Direction::Receive)
    }

    fn new(channel: u8, block: PioBlock, sm: u8, direction: Direction) -> Result<Self> {
        if channel as usize >= DMA_CHANNELS {
            return Err(Error::InvalidDmaChannel(channel));
        }
        if sm as usize >= STATE_MACHINES_PER_BLOCK {
            return Err(Error::InvalidStateMachine);
        }
        Ok(ChannelConfig {
            channel,
            direction,
            dreq: dreq(block, sm, direction),
        })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn dreq(&self) -> u8 {
        self.dreq
    }

    /// Packed CTRL word. Writing it with EN set does not start a transfer;
    /// that only happens on a write to a trigger alias.
    pub fn to_register(&self) -> u32 {
        let incr = match self.direction {
            Direction::Transmit => DMA_CTRL_INCR_READ,
            Direction::Receive => DMA_CTRL_INCR_WRITE,
        };
        DMA_CTRL_EN
            | (DATA_SIZE_WORD << DMA_CTRL_DATA_SIZE_SHIFT)
            | incr
            | ((self.channel as u32) << DMA_CTRL_CHAIN_TO_SHIFT)
            | ((self.dreq as u32) << DMA_CTRL_TREQ_SEL_SHIFT)
    }
}
