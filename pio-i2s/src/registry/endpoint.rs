//! Buffer handoff between streams and the code producing or consuming audio.
//!
//! A buffer handed to DMA is owned by the hardware for one transfer. The
//! transmit side asks a [`BufferSource`] for the next buffer on every
//! completion; the receive side flips between the two blocks of a
//! [`CaptureSink`], so the block software reads is never the block DMA
//! writes.

use core::cell::UnsafeCell;

use portable_atomic::{compiler_fence, AtomicU32, AtomicU8, Ordering};

/// A buffer DMA reads from: interleaved `L R L R ...` words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxBuffer {
    pub ptr: *const i32,
    pub words: u32,
}

impl TxBuffer {
    pub const fn new(ptr: *const i32, words: u32) -> Self {
        TxBuffer { ptr, words }
    }

    /// Non-null and a positive whole number of stereo frames.
    pub fn is_valid(&self) -> bool {
        !self.ptr.is_null() && self.words > 0 && self.words % 2 == 0
    }
}

/// A buffer DMA writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxBuffer {
    pub ptr: *mut i32,
    pub words: u32,
}

impl RxBuffer {
    pub fn is_valid(&self) -> bool {
        !self.ptr.is_null() && self.words > 0 && self.words % 2 == 0
    }
}

/// Supplies transmit buffers.
///
/// `next_buffer` is called once per completed transfer from the DMA
/// interrupt. The returned buffer must stay valid and unmodified until the
/// following call. Content may change between calls but a buffer that DMA
/// is reading must not be rewritten.
pub trait BufferSource: Sync {
    fn next_buffer(&self) -> TxBuffer;
}

/// Receives capture blocks.
pub trait CaptureSink: Sync {
    /// Block DMA should write next. Used when a stream starts.
    fn current(&self) -> RxBuffer;

    /// The current block has been filled: make it readable and return the
    /// other block as the new DMA target. Interrupt context only.
    fn swap(&self) -> RxBuffer;

    /// Copy the most recently completed block into `out`.
    ///
    /// Returns the capture sequence number, or `None` if nothing has been
    /// captured yet or a swap happened during the copy.
    fn copy_latest(&self, out: &mut [i32]) -> Option<u32>;
}

/// A fixed buffer sent over and over.
pub struct StaticBuffer {
    data: &'static [i32],
}

impl StaticBuffer {
    pub const fn new(data: &'static [i32]) -> Self {
        StaticBuffer { data }
    }
}

impl BufferSource for StaticBuffer {
    fn next_buffer(&self) -> TxBuffer {
        TxBuffer::new(self.data.as_ptr(), self.data.len() as u32)
    }
}

/// Two alternating blocks of `FRAMES` stereo frames.
///
/// ```text
///            swap()                swap()
/// DMA  ──► block 0 ──────────► block 1 ──────────► block 0 ...
/// CPU       (none)              block 0             block 1
/// ```
#[repr(C, align(4))]
pub struct CaptureBuffers<const FRAMES: usize> {
    blocks: UnsafeCell<[[[i32; 2]; FRAMES]; 2]>,
    /// Index of the block DMA writes.
    target: AtomicU8,
    /// Number of completed captures.
    sequence: AtomicU32,
}

// SAFETY: DMA only writes the `target` block and software only reads the
// other one. `target` and `sequence` are written by the interrupt alone,
// and readers detect a concurrent swap through `sequence`.
unsafe impl<const FRAMES: usize> Sync for CaptureBuffers<FRAMES> {}

impl<const FRAMES: usize> CaptureBuffers<FRAMES> {
    pub const fn new() -> Self {
        assert!(FRAMES > 0, "capture blocks must hold at least one frame");
        CaptureBuffers {
            blocks: UnsafeCell::new([[[0; 2]; FRAMES]; 2]),
            target: AtomicU8::new(0),
            sequence: AtomicU32::new(0),
        }
    }

    /// Words per block.
    pub const fn words(&self) -> usize {
        FRAMES * 2
    }

    /// Completed captures so far.
    pub fn sequence(&self) -> u32 {
        self.sequence.load(Ordering::Acquire)
    }

    fn block(&self, index: u8) -> RxBuffer {
        let words = FRAMES * 2;
        // SAFETY: `index` is 0 or 1, so the offset stays inside `blocks`.
        let ptr = unsafe { (self.blocks.get() as *mut i32).add(index as usize * words) };
        RxBuffer {
            ptr,
            words: (FRAMES * 2) as u32,
        }
    }
}

impl<const FRAMES: usize> Default for CaptureBuffers<FRAMES> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const FRAMES: usize> CaptureSink for CaptureBuffers<FRAMES> {
    fn current(&self) -> RxBuffer {
        self.block(self.target.load(Ordering::Acquire))
    }

    fn swap(&self) -> RxBuffer {
        let next = self.target.load(Ordering::Relaxed) ^ 1;
        self.target.store(next, Ordering::Release);
        let seq = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(seq.wrapping_add(1), Ordering::Release);
        self.block(next)
    }

    fn copy_latest(&self, out: &mut [i32]) -> Option<u32> {
        let before = self.sequence.load(Ordering::Acquire);
        if before == 0 {
            return None;
        }
        let done = self.block(self.target.load(Ordering::Acquire) ^ 1);
        compiler_fence(Ordering::Acquire);
        for (i, slot) in out.iter_mut().take(done.words as usize).enumerate() {
            // SAFETY: `i` is inside the block; volatile because DMA writes
            // behind the compiler's back.
            *slot = unsafe { done.ptr.add(i).read_volatile() };
        }
        compiler_fence(Ordering::Acquire);
        if self.sequence.load(Ordering::Acquire) == before {
            Some(before)
        } else {
            None
        }
    }
}
