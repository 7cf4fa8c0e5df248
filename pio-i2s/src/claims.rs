//! Ownership of shared RP2040 resources.
//!
//! DMA channels, state machines and instruction memory are claimed from a
//! [`HardwareClaims`] bitmap and handed out as owned handles. Dropping a
//! handle returns the resource, so a stream that is dropped can never leave
//! a channel or state machine marked busy.

use portable_atomic::{AtomicU32, AtomicU8, Ordering};

use crate::constants::{DMA_CHANNELS, PIO_BLOCKS, STATE_MACHINES_PER_BLOCK};
use crate::error::{Error, Result};
use crate::hw::PioBlock;

/// Lock-free claim bitmaps for every shared resource.
pub struct HardwareClaims {
    /// Bit N = 1 means DMA channel N is claimed.
    dma: AtomicU32,
    /// Bit `4 * block + sm` = 1 means the state machine is claimed.
    state_machines: AtomicU8,
    /// Per block, bit N = 1 means instruction slot N is in use.
    instruction_memory: [AtomicU32; PIO_BLOCKS],
}

impl HardwareClaims {
    /// Nothing claimed.
    pub const fn new() -> Self {
        HardwareClaims {
            dma: AtomicU32::new(0),
            state_machines: AtomicU8::new(0),
            instruction_memory: [AtomicU32::new(0), AtomicU32::new(0)],
        }
    }

    /// Claim a specific DMA channel.
    pub fn claim_dma_channel(&'static self, channel: u8) -> Result<DmaChannel> {
        if channel as usize >= DMA_CHANNELS {
            return Err(Error::InvalidDmaChannel(channel));
        }
        let bit = 1u32 << channel;
        let old = self.dma.fetch_or(bit, Ordering::AcqRel);
        if old & bit != 0 {
            return Err(Error::DmaChannelInUse(channel));
        }
        debug!("claimed DMA channel {}", channel);
        Ok(DmaChannel {
            id: channel,
            claims: self,
        })
    }

    /// Claim the lowest numbered free DMA channel.
    pub fn claim_free_dma_channel(&'static self) -> Result<DmaChannel> {
        let all = (1u32 << DMA_CHANNELS) - 1;
        loop {
            let claimed = self.dma.load(Ordering::Acquire);
            let free = !claimed & all;
            if free == 0 {
                return Err(Error::NoFreeDmaChannel);
            }
            let channel = free.trailing_zeros();
            let bit = 1u32 << channel;
            if self
                .dma
                .compare_exchange_weak(claimed, claimed | bit, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                debug!("claimed DMA channel {}", channel);
                return Ok(DmaChannel {
                    id: channel as u8,
                    claims: self,
                });
            }
        }
    }

    /// Claim state machine `sm` of `block`.
    pub fn claim_state_machine(&'static self, block: PioBlock, sm: u8) -> Result<StateMachine> {
        if sm as usize >= STATE_MACHINES_PER_BLOCK {
            return Err(Error::InvalidStateMachine);
        }
        let bit = 1u8 << (block.index() * STATE_MACHINES_PER_BLOCK + sm as usize);
        let old = self.state_machines.fetch_or(bit, Ordering::AcqRel);
        if old & bit != 0 {
            return Err(Error::StateMachineInUse);
        }
        debug!("claimed PIO{} SM{}", block.index(), sm);
        Ok(StateMachine {
            block,
            id: sm,
            claims: self,
        })
    }

    /// Atomically mark `mask` in use in `block`'s instruction memory.
    /// Fails without side effects if any of those slots are taken.
    pub(crate) fn reserve_instructions(&self, block: PioBlock, mask: u32) -> bool {
        let memory = &self.instruction_memory[block.index()];
        let mut used = memory.load(Ordering::Acquire);
        loop {
            if used & mask != 0 {
                return false;
            }
            match memory.compare_exchange_weak(
                used,
                used | mask,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(now) => used = now,
            }
        }
    }

    pub(crate) fn free_instructions(&self, block: PioBlock, mask: u32) {
        self.instruction_memory[block.index()].fetch_and(!mask, Ordering::Release);
    }

    /// Bitmap of claimed DMA channels.
    pub fn dma_mask(&self) -> u32 {
        self.dma.load(Ordering::Acquire)
    }

    /// Bitmap of claimed state machines, bit `4 * block + sm`.
    pub fn state_machine_mask(&self) -> u8 {
        self.state_machines.load(Ordering::Acquire)
    }

    /// Bitmap of used instruction slots in `block`.
    pub fn instruction_mask(&self, block: PioBlock) -> u32 {
        self.instruction_memory[block.index()].load(Ordering::Acquire)
    }
}

impl Default for HardwareClaims {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide claims used by [`I2sStream::new`](crate::I2sStream::new).
pub static CLAIMS: HardwareClaims = HardwareClaims::new();

/// An exclusively owned DMA channel.
#[derive(Debug)]
pub struct DmaChannel {
    id: u8,
    claims: &'static HardwareClaims,
}

impl DmaChannel {
    pub fn id(&self) -> u8 {
        self.id
    }
}

impl Drop for DmaChannel {
    fn drop(&mut self) {
        self.claims.dma.fetch_and(!(1u32 << self.id), Ordering::Release);
        debug!("released DMA channel {}", self.id);
    }
}

/// An exclusively owned PIO state machine.
#[derive(Debug)]
pub struct StateMachine {
    block: PioBlock,
    id: u8,
    claims: &'static HardwareClaims,
}

impl StateMachine {
    pub fn block(&self) -> PioBlock {
        self.block
    }

    pub fn id(&self) -> u8 {
        self.id
    }
}

impl Drop for StateMachine {
    fn drop(&mut self) {
        let bit = 1u8 << (self.block.index() * STATE_MACHINES_PER_BLOCK + self.id as usize);
        self.claims.state_machines.fetch_and(!bit, Ordering::Release);
    }
}

impl core::fmt::Debug for HardwareClaims {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HardwareClaims")
            .field("dma", &self.dma_mask())
            .field("state_machines", &self.state_machine_mask())
            .finish()
    }
}
