//! Channel registry and the shared DMA interrupt dispatcher.
//!
//! One slot per physical DMA channel. A slot moves through
//!
//! ```text
//!   VACANT ──reserve()──► RESERVED ──activate()──► ACTIVE
//!      ▲                      │  ▲                    │
//!      └──────── drop ────────┘  └──── deactivate() ──┘
//! ```
//!
//! The binding (source or sink) is written only while the slot is
//! `RESERVED`, by the stream that reserved it. The dispatcher reads the
//! binding only after observing `ACTIVE`, so the single atomic state store is
//! the only synchronization point with interrupt context.

use core::cell::UnsafeCell;

use portable_atomic::{AtomicU32, AtomicU8, Ordering};

use crate::constants::DMA_CHANNELS;
use crate::error::{Error, Result};
use crate::hw::DmaBackend;

use super::endpoint::{BufferSource, CaptureSink};

const VACANT: u8 = 0;
const RESERVED: u8 = 1;
const ACTIVE: u8 = 2;

/// What a slot does on completion.
#[derive(Clone, Copy)]
pub enum Binding {
    /// Re-arm from the next source buffer.
    Transmit(&'static dyn BufferSource),
    /// Swap capture blocks and re-arm into the new target.
    Receive(&'static dyn CaptureSink),
}

impl Binding {
    pub fn role(&self) -> Role {
        match self {
            Binding::Transmit(_) => Role::Transmit,
            Binding::Receive(_) => Role::Receive,
        }
    }
}

/// Direction of a registered channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Transmit = 1,
    Receive = 2,
}

struct Slot {
    state: AtomicU8,
    role: AtomicU8,
    binding: UnsafeCell<Option<Binding>>,
    completions: AtomicU32,
}

impl Slot {
    const fn new() -> Self {
        Slot {
            state: AtomicU8::new(VACANT),
            role: AtomicU8::new(0),
            binding: UnsafeCell::new(None),
            completions: AtomicU32::new(0),
        }
    }
}

/// Result of one dispatcher pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DispatchReport {
    /// Bit N set: channel N was acknowledged and re-armed.
    pub serviced: u16,
    /// Bit N set: channel N was pending but has no active slot. Its flag is
    /// left for whoever owns it.
    pub foreign: u16,
    /// Bit N set: acknowledged, but the source returned an unusable buffer
    /// and the channel was not re-armed.
    pub starved: u16,
}

impl DispatchReport {
    /// Nothing of ours was pending.
    pub fn is_spurious(&self) -> bool {
        self.serviced == 0 && self.starved == 0
    }
}

/// Dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistryStats {
    /// Dispatcher invocations.
    pub dispatches: u32,
    /// Invocations that found no active channel pending.
    pub spurious: u32,
    /// Pending completions on channels without an active slot.
    pub foreign: u32,
    /// Completions whose source returned an invalid buffer.
    pub invalid_buffers: u32,
}

/// Process-wide table mapping DMA channel ids to stream endpoints.
pub struct ChannelRegistry {
    slots: [Slot; DMA_CHANNELS],
    dispatches: AtomicU32,
    spurious: AtomicU32,
    foreign: AtomicU32,
    invalid_buffers: AtomicU32,
}

// SAFETY: slot bindings are only written by the holder of the slot's
// `RESERVED` state and only read by the dispatcher once `ACTIVE` has been
// published with release ordering. All other fields are atomics.
unsafe impl Sync for ChannelRegistry {}

impl ChannelRegistry {
    /// All slots vacant.
    #[allow(clippy::declare_interior_mut_const)]
    pub const fn new() -> Self {
        const EMPTY: Slot = Slot::new();
        ChannelRegistry {
            slots: [EMPTY; DMA_CHANNELS],
            dispatches: AtomicU32::new(0),
            spurious: AtomicU32::new(0),
            foreign: AtomicU32::new(0),
            invalid_buffers: AtomicU32::new(0),
        }
    }

    /// Take ownership of the slot for `channel` and bind it. The slot stays
    /// invisible to the dispatcher until [`SlotGuard::activate`].
    pub fn reserve(&'static self, channel: u8, binding: Binding) -> Result<SlotGuard> {
        let slot = self
            .slots
            .get(channel as usize)
            .ok_or(Error::InvalidDmaChannel(channel))?;
        slot.state
            .compare_exchange(VACANT, RESERVED, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SlotOccupied(channel))?;

        // SAFETY: we moved the slot out of VACANT, so nobody else writes the
        // binding and the dispatcher ignores non-ACTIVE slots.
        unsafe { *slot.binding.get() = Some(binding) };
        slot.role.store(binding.role() as u8, Ordering::Release);
        slot.completions.store(0, Ordering::Relaxed);

        Ok(SlotGuard {
            registry: self,
            channel,
        })
    }

    pub fn is_active(&self, channel: u8) -> bool {
        self.slots
            .get(channel as usize)
            .is_some_and(|slot| slot.state.load(Ordering::Acquire) == ACTIVE)
    }

    /// Number of slots currently visible to the dispatcher.
    pub fn active_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state.load(Ordering::Acquire) == ACTIVE)
            .count()
    }

    /// Role of a reserved or active slot.
    pub fn role(&self, channel: u8) -> Option<Role> {
        let slot = self.slots.get(channel as usize)?;
        if slot.state.load(Ordering::Acquire) == VACANT {
            return None;
        }
        match slot.role.load(Ordering::Acquire) {
            1 => Some(Role::Transmit),
            2 => Some(Role::Receive),
            _ => None,
        }
    }

    /// Completions serviced on `channel` since it was reserved.
    pub fn completions(&self, channel: u8) -> u32 {
        self.slots
            .get(channel as usize)
            .map_or(0, |slot| slot.completions.load(Ordering::Relaxed))
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            spurious: self.spurious.load(Ordering::Relaxed),
            foreign: self.foreign.load(Ordering::Relaxed),
            invalid_buffers: self.invalid_buffers.load(Ordering::Relaxed),
        }
    }

    /// Service every pending active channel, lowest id first.
    ///
    /// Each serviced channel is acknowledged exactly once and immediately
    /// re-armed. Never blocks, never allocates.
    pub fn dispatch<D: DmaBackend>(&self, dma: &D) -> DispatchReport {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
        let mut report = DispatchReport::default();

        for (channel, slot) in self.slots.iter().enumerate() {
            let channel = channel as u8;
            if !dma.irq_pending(channel) {
                continue;
            }
            let bit = 1u16 << channel;
            if slot.state.load(Ordering::Acquire) != ACTIVE {
                report.foreign |= bit;
                self.foreign.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            dma.acknowledge(channel);

            // SAFETY: ACTIVE was observed with acquire ordering; the binding
            // is not written again until the slot leaves ACTIVE.
            let binding = unsafe { *slot.binding.get() };
            let rearmed = match binding {
                Some(Binding::Transmit(source)) => {
                    let buffer = source.next_buffer();
                    if buffer.is_valid() {
                        dma.arm_read(channel, buffer.ptr as *const u32, buffer.words);
                        true
                    } else {
                        false
                    }
                }
                Some(Binding::Receive(sink)) => {
                    let buffer = sink.swap();
                    if buffer.is_valid() {
                        dma.arm_write(channel, buffer.ptr as *mut u32, buffer.words);
                        true
                    } else {
                        false
                    }
                }
                None => false,
            };

            if rearmed {
                slot.completions.fetch_add(1, Ordering::Relaxed);
                report.serviced |= bit;
            } else {
                self.invalid_buffers.fetch_add(1, Ordering::Relaxed);
                report.starved |= bit;
                warn!("DMA channel {} not re-armed: invalid buffer", channel);
            }
        }

        if report.is_spurious() {
            self.spurious.fetch_add(1, Ordering::Relaxed);
            trace!("spurious DMA interrupt, foreign mask {}", report.foreign);
        }
        report
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The registry [`dma_irq_handler`] dispatches through.
pub static REGISTRY: ChannelRegistry = ChannelRegistry::new();

/// Entry point for the shared DMA completion interrupt.
///
/// ```ignore
/// #[task(binds = DMA_IRQ_0, shared = [hw])]
/// fn dma_irq(mut cx: dma_irq::Context) {
///     cx.shared.hw.lock(|hw| pio_i2s::dma_irq_handler(hw));
/// }
/// ```
pub fn dma_irq_handler<D: DmaBackend>(dma: &D) -> DispatchReport {
    REGISTRY.dispatch(dma)
}

/// Exclusive ownership of one registry slot. Vacates the slot on drop.
pub struct SlotGuard {
    registry: &'static ChannelRegistry,
    channel: u8,
}

impl SlotGuard {
    pub fn channel(&self) -> u8 {
        self.channel
    }

    fn slot(&self) -> &Slot {
        &self.registry.slots[self.channel as usize]
    }

    /// Make the slot visible to the dispatcher.
    pub fn activate(&self) {
        self.slot().state.store(ACTIVE, Ordering::Release);
    }

    /// Hide the slot from the dispatcher without giving it up.
    pub fn deactivate(&self) {
        self.slot().state.store(RESERVED, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.slot().state.load(Ordering::Acquire) == ACTIVE
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let slot = self.slot();
        slot.state.store(RESERVED, Ordering::Release);
        // SAFETY: the slot is no longer ACTIVE and we still hold it.
        unsafe { *slot.binding.get() = None };
        slot.role.store(0, Ordering::Relaxed);
        slot.state.store(VACANT, Ordering::Release);
    }
}

impl core::fmt::Debug for SlotGuard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SlotGuard")
            .field("channel", &self.channel)
            .field("active", &self.is_active())
            .finish()
    }
}
