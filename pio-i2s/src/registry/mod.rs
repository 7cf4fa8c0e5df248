//! Channel registry, interrupt dispatcher and buffer endpoints.
//!
//! | Item | Context |
//! |------|---------|
//! | [`ChannelRegistry::reserve`], [`SlotGuard`] | stream construction and drop |
//! | [`ChannelRegistry::dispatch`], [`dma_irq_handler`] | DMA completion interrupt |
//! | [`BufferSource::next_buffer`], [`CaptureSink::swap`] | called by the dispatcher |
//! | [`CaptureSink::copy_latest`] | application code |

pub mod endpoint;
pub mod slots;


pub use endpoint::{BufferSource, CaptureBuffers, CaptureSink, RxBuffer, StaticBuffer, TxBuffer};
pub use slots::{
    dma_irq_handler, Binding, ChannelRegistry, DispatchReport, RegistryStats, Role, SlotGuard,
    REGISTRY,
};
