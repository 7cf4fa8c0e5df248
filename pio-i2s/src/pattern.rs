//! Test-signal generator implementing [`BufferSource`].
//!
//! Generates `pattern_length` stereo frames (left = right) of a constant,
//! sine, triangle or square wave. The buffer is double-buffered: edits are
//! rendered into the half DMA is not reading and handed out from the next
//! [`next_buffer`](BufferSource::next_buffer) call on, so a transfer never
//! sees a half-written pattern.
//!
//! ```ignore
//! static TONE: PatternBuffer<256> = PatternBuffer::new();
//!
//! TONE.configure(PatternSettings {
//!     pattern: Pattern::Sine,
//!     offset: 0,
//!     amplitude: 1 << 30,
//!     length: 100, // 960 Hz at 96 kHz
//! })?;
//! ```

use core::cell::{Cell, UnsafeCell};

use critical_section::Mutex;
use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::error::{Error, Result};
use crate::registry::{BufferSource, TxBuffer};

/// Waveform shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pattern {
    /// Every sample is `offset`.
    Constant,
    /// One sine period of peak `amplitude` around `offset`.
    Sine,
    /// Ramp from `offset` up to `offset + amplitude` and back.
    Triangle,
    /// `offset` for the first half period, `offset + amplitude` for the second.
    Square,
}

/// Everything that determines the generated samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PatternSettings {
    pub pattern: Pattern,
    pub offset: i32,
    pub amplitude: i32,
    /// Frames per period.
    pub length: usize,
}

/// Double-buffered pattern of up to `FRAMES` stereo frames.
#[repr(C, align(4))]
pub struct PatternBuffer<const FRAMES: usize> {
    halves: UnsafeCell<[[[i32; 2]; FRAMES]; 2]>,
    /// Frames rendered into each half.
    lengths: [AtomicU32; 2],
    /// Half handed out by the next `next_buffer()`.
    published: AtomicU8,
    /// Half DMA is reading.
    in_flight: AtomicU8,
    editing: AtomicBool,
    settings: Mutex<Cell<PatternSettings>>,
}

// SAFETY: the interrupt only reads the published half. An edit renders into
// the other half while holding `editing`, after pinning `published` to the
// in-flight half inside a critical section.
unsafe impl<const FRAMES: usize> Sync for PatternBuffer<FRAMES> {}

impl<const FRAMES: usize> PatternBuffer<FRAMES> {
    /// A constant zero pattern, `FRAMES` frames long.
    pub const fn new() -> Self {
        assert!(FRAMES > 0, "pattern buffer must hold at least one frame");
        PatternBuffer {
            halves: UnsafeCell::new([[[0; 2]; FRAMES]; 2]),
            lengths: [AtomicU32::new(FRAMES as u32), AtomicU32::new(FRAMES as u32)],
            published: AtomicU8::new(0),
            in_flight: AtomicU8::new(0),
            editing: AtomicBool::new(false),
            settings: Mutex::new(Cell::new(PatternSettings {
                pattern: Pattern::Constant,
                offset: 0,
                amplitude: 0,
                length: FRAMES,
            })),
        }
    }

    /// Largest pattern length.
    pub const fn capacity(&self) -> usize {
        FRAMES
    }

    pub fn settings(&self) -> PatternSettings {
        critical_section::with(|cs| self.settings.borrow(cs).get())
    }

    /// Replace all settings at once. Returns the length actually used,
    /// clipped to `1..=FRAMES`.
    pub fn configure(&self, settings: PatternSettings) -> Result<usize> {
        self.edit(|s| *s = settings)
    }

    pub fn set_pattern(&self, pattern: Pattern) -> Result<usize> {
        self.edit(|s| s.pattern = pattern)
    }

    pub fn set_offset(&self, offset: i32) -> Result<usize> {
        self.edit(|s| s.offset = offset)
    }

    pub fn set_amplitude(&self, amplitude: i32) -> Result<usize> {
        self.edit(|s| s.amplitude = amplitude)
    }

    /// Returns the clipped length.
    pub fn set_pattern_length(&self, length: usize) -> Result<usize> {
        self.edit(|s| s.length = length)
    }

    fn edit(&self, change: impl FnOnce(&mut PatternSettings)) -> Result<usize> {
        if self.editing.swap(true, Ordering::Acquire) {
            return Err(Error::Busy);
        }

        let mut settings = self.settings();
        change(&mut settings);
        settings.length = settings.length.clamp(1, FRAMES);

        // Keep handing out the in-flight half while the other one is
        // rewritten.
        let target = critical_section::with(|_| {
            let current = self.in_flight.load(Ordering::Relaxed);
            self.published.store(current, Ordering::Relaxed);
            current ^ 1
        });

        // SAFETY: `target` is neither in flight nor published, and only the
        // holder of `editing` writes a half.
        let half = unsafe {
            &mut *(self.halves.get() as *mut [[i32; 2]; FRAMES]).add(target as usize)
        };
        render(&settings, &mut half[..settings.length]);
        self.lengths[target as usize].store(settings.length as u32, Ordering::Relaxed);

        critical_section::with(|cs| {
            self.settings.borrow(cs).set(settings);
            self.published.store(target, Ordering::Release);
        });
        self.editing.store(false, Ordering::Release);

        debug!(
            "pattern {:?}: offset {}, amplitude {}, {} frames",
            settings.pattern,
            settings.offset,
            settings.amplitude,
            settings.length
        );
        Ok(settings.length)
    }
}

impl<const FRAMES: usize> Default for PatternBuffer<FRAMES> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const FRAMES: usize> BufferSource for PatternBuffer<FRAMES> {
    fn next_buffer(&self) -> TxBuffer {
        let half = critical_section::with(|_| {
            let half = self.published.load(Ordering::Acquire);
            self.in_flight.store(half, Ordering::Relaxed);
            half
        });
        let frames = self.lengths[half as usize].load(Ordering::Relaxed);
        // SAFETY: `half` is 0 or 1; only the address is taken.
        let ptr = unsafe { (self.halves.get() as *const i32).add(half as usize * FRAMES * 2) };
        TxBuffer::new(ptr, frames * 2)
    }
}

/// Fill `frames` with one period of `settings.pattern`.
fn render(settings: &PatternSettings, frames: &mut [[i32; 2]]) {
    let len = frames.len();
    let offset = settings.offset;
    let amplitude = settings.amplitude as f32;
    for (i, frame) in frames.iter_mut().enumerate() {
        let value = match settings.pattern {
            Pattern::Constant => offset,
            Pattern::Sine => {
                let phase = 2.0 * core::f32::consts::PI * i as f32 / len as f32;
                ((libm::sinf(phase) * amplitude) as i32).wrapping_add(offset)
            }
            Pattern::Triangle => {
                let step = if i < len / 2 { i } else { len - i - 1 };
                ((amplitude * (step * 2) as f32 / len as f32) as i32).wrapping_add(offset)
            }
            Pattern::Square => {
                if i >= len / 2 {
                    settings.amplitude.wrapping_add(offset)
                } else {
                    offset
                }
            }
        };
        *frame = [value, value];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pattern: Pattern, offset: i32, amplitude: i32, length: usize) -> PatternSettings {
        PatternSettings {
            pattern,
            offset,
            amplitude,
            length,
        }
    }

    fn read(buf: TxBuffer) -> &'static [i32] {
        unsafe { core::slice::from_raw_parts(buf.ptr, buf.words as usize) }
    }

    #[test]
    fn starts_as_full_length_silence() {
        static TONE: PatternBuffer<16> = PatternBuffer::new();
        let buf = TONE.next_buffer();
        assert_eq!(buf.words, 32);
        assert!(read(buf).iter().all(|&s| s == 0));
        assert_eq!(TONE.settings().length, 16);
    }

    #[test]
    fn constant_fills_both_channels() {
        static TONE: PatternBuffer<8> = PatternBuffer::new();
        assert_eq!(TONE.configure(settings(Pattern::Constant, -7, 0, 4)), Ok(4));
        let buf = TONE.next_buffer();
        assert_eq!(read(buf), &[-7; 8]);
    }

    #[test]
    fn square_is_low_then_high() {
        static TONE: PatternBuffer<8> = PatternBuffer::new();
        TONE.configure(settings(Pattern::Square, 1, 100, 4)).unwrap();
        assert_eq!(read(TONE.next_buffer()), &[1, 1, 1, 1, 101, 101, 101, 101]);
    }

    #[test]
    fn triangle_ramps_up_and_down() {
        let mut frames = [[0i32; 2]; 8];
        render(&settings(Pattern::Triangle, 0, 800, 8), &mut frames);
        let left: [i32; 8] = core::array::from_fn(|i| frames[i][0]);
        assert_eq!(left, [0, 200, 400, 600, 600, 400, 200, 0]);
        assert!(frames.iter().all(|f| f[0] == f[1]));
    }

    #[test]
    fn sine_has_one_period() {
        let mut frames = [[0i32; 2]; 4];
        render(&settings(Pattern::Sine, 10, 1000, 4), &mut frames);
        assert_eq!(frames[0][0], 10);
        assert_eq!(frames[1][0], 1010);
        assert!((frames[2][0] - 10).abs() <= 1);
        assert_eq!(frames[3][0], -990);
    }

    #[test]
    fn length_is_clipped_and_applied() {
        static TONE: PatternBuffer<8> = PatternBuffer::new();
        assert_eq!(TONE.set_pattern_length(100), Ok(8));
        assert_eq!(TONE.set_pattern_length(0), Ok(1));
        assert_eq!(TONE.next_buffer().words, 2);
        assert_eq!(TONE.set_pattern_length(3), Ok(3));
        assert_eq!(TONE.next_buffer().words, 6);
    }

    #[test]
    fn single_field_edits_keep_other_settings() {
        static TONE: PatternBuffer<8> = PatternBuffer::new();
        TONE.configure(settings(Pattern::Square, 0, 50, 4)).unwrap();
        TONE.set_offset(5).unwrap();
        TONE.set_amplitude(10).unwrap();
        TONE.set_pattern(Pattern::Constant).unwrap();
        assert_eq!(TONE.settings(), settings(Pattern::Constant, 5, 10, 4));
    }

    #[test]
    fn edit_never_touches_buffer_in_flight() {
        static TONE: PatternBuffer<4> = PatternBuffer::new();
        TONE.configure(settings(Pattern::Constant, 1, 0, 4)).unwrap();
        let first = TONE.next_buffer();

        TONE.set_offset(2).unwrap();
        assert!(read(first).iter().all(|&s| s == 1));

        let second = TONE.next_buffer();
        assert_ne!(first.ptr, second.ptr);
        assert!(read(second).iter().all(|&s| s == 2));

        // two edits between completions still leave the in-flight half alone
        TONE.set_offset(3).unwrap();
        TONE.set_offset(4).unwrap();
        assert!(read(second).iter().all(|&s| s == 2));
        assert!(read(TONE.next_buffer()).iter().all(|&s| s == 4));
    }

    #[test]
    fn concurrent_edit_is_rejected() {
        static TONE: PatternBuffer<4> = PatternBuffer::new();
        TONE.editing.store(true, Ordering::Relaxed);
        assert_eq!(TONE.set_offset(1), Err(Error::Busy));
        TONE.editing.store(false, Ordering::Relaxed);
        assert_eq!(TONE.set_offset(1), Ok(4));
    }

    #[test]
    fn buffers_are_whole_frames() {
        static TONE: PatternBuffer<5> = PatternBuffer::new();
        for len in 1..=5 {
            TONE.set_pattern_length(len).unwrap();
            assert!(TONE.next_buffer().is_valid());
        }
    }
}
