//! Fractional clock divider and the sample-rate model.
//!
//! ```text
//! rate = sys_clk / divider / (cycles_per_bit * 2 * bit_depth)
//! ```
//!
//! `cycles_per_bit` is 2 for transmit and receive and 4 for transceive, so a
//! transceive stream runs at half the rate of the others for the same
//! divider and bit depth.

use crate::constants::DEFAULT_CLOCK_DIVIDER;
use crate::error::{Error, Result};
use crate::hw::registers::{CLKDIV_FRAC_SHIFT, CLKDIV_INT_SHIFT};
use crate::program::{validate_bit_depth, Mode};

const MIN_RAW: u32 = 1 << 8;
const MAX_RAW: u32 = (u16::MAX as u32) << 8 | 0xff;

/// State machine clock divider in 1/256 steps, `1.0 ..= 65535.996`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockDivider(u32);

impl ClockDivider {
    /// 9.765625: 96 kHz at 32 bits from 120 MHz.
    pub const DEFAULT: ClockDivider = ClockDivider(DEFAULT_CLOCK_DIVIDER);

    /// From a value in 1/256 units (`2500` is `9 + 196/256`).
    pub const fn from_raw(raw: u32) -> Result<Self> {
        if raw < MIN_RAW || raw > MAX_RAW {
            return Err(Error::InvalidDivider);
        }
        Ok(ClockDivider(raw))
    }

    pub const fn from_int_frac(integer: u16, fraction: u8) -> Result<Self> {
        Self::from_raw((integer as u32) << 8 | fraction as u32)
    }

    /// Nearest representable divider.
    pub fn from_f32(divider: f32) -> Result<Self> {
        if !divider.is_finite() {
            return Err(Error::InvalidDivider);
        }
        let raw = libm::round(divider as f64 * 256.0);
        if raw < MIN_RAW as f64 || raw > MAX_RAW as f64 {
            return Err(Error::InvalidDivider);
        }
        Ok(ClockDivider(raw as u32))
    }

    /// Divider closest to `sample_rate` for the given clock, bit depth and
    /// mode.
    pub fn for_sample_rate(
        system_clock_hz: u32,
        sample_rate: u32,
        bit_depth: u8,
        mode: Mode,
    ) -> Result<Self> {
        validate_bit_depth(bit_depth)?;
        if sample_rate == 0 {
            return Err(Error::InvalidDivider);
        }
        let cycles = cycles_per_frame(bit_depth, mode) as f64 * sample_rate as f64;
        let raw = libm::round(system_clock_hz as f64 * 256.0 / cycles);
        if raw < MIN_RAW as f64 || raw > MAX_RAW as f64 {
            return Err(Error::InvalidDivider);
        }
        Ok(ClockDivider(raw as u32))
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    pub const fn integer(&self) -> u16 {
        (self.0 >> 8) as u16
    }

    pub const fn fraction(&self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub fn as_f32(&self) -> f32 {
        self.0 as f32 / 256.0
    }

    /// SMx_CLKDIV word.
    pub const fn to_register(&self) -> u32 {
        (self.integer() as u32) << CLKDIV_INT_SHIFT
            | (self.fraction() as u32) << CLKDIV_FRAC_SHIFT
    }

    /// Stereo frames per second.
    pub fn sample_rate(&self, system_clock_hz: u32, bit_depth: u8, mode: Mode) -> f32 {
        let cycles = cycles_per_frame(bit_depth, mode) as f64 * self.0 as f64;
        (system_clock_hz as f64 * 256.0 / cycles) as f32
    }
}

impl Default for ClockDivider {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// State machine cycles per stereo frame.
fn cycles_per_frame(bit_depth: u8, mode: Mode) -> u32 {
    mode.cycles_per_bit() * 2 * bit_depth as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_divider_encodes_nine_and_196() {
        let div = ClockDivider::DEFAULT;
        assert_eq!(div.integer(), 9);
        assert_eq!(div.fraction(), 196);
        assert_eq!(div, ClockDivider::from_int_frac(9, 196).unwrap());
        assert_eq!(div.to_register(), 9 << 16 | 196 << 8);
    }

    #[test]
    fn default_divider_gives_96k_at_120mhz() {
        let rate = ClockDivider::DEFAULT.sample_rate(120_000_000, 32, Mode::Transmit);
        assert!((rate - 96_000.0).abs() < 0.01, "{rate}");
    }

    #[test]
    fn transceive_runs_at_half_rate() {
        let div = ClockDivider::from_raw(3000).unwrap();
        for n in [8u8, 16, 24, 32] {
            let tx = div.sample_rate(125_000_000, n, Mode::Transmit);
            let rx = div.sample_rate(125_000_000, n, Mode::Receive);
            let trx = div.sample_rate(125_000_000, n, Mode::Transceive);
            assert_eq!(tx, rx);
            assert!((tx / 2.0 - trx).abs() <= tx * 1e-6);
        }
    }

    #[test]
    fn rate_decreases_with_depth_and_divider() {
        let mut last = f32::MAX;
        for n in 2..=32u8 {
            let rate = ClockDivider::DEFAULT.sample_rate(125_000_000, n, Mode::Transmit);
            assert!(rate < last);
            last = rate;
        }
        let mut last = f32::MAX;
        for raw in (256..=65536).step_by(997) {
            let rate = ClockDivider::from_raw(raw)
                .unwrap()
                .sample_rate(125_000_000, 16, Mode::Receive);
            assert!(rate < last);
            last = rate;
        }
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(ClockDivider::from_raw(255), Err(Error::InvalidDivider));
        assert_eq!(ClockDivider::from_int_frac(0, 255), Err(Error::InvalidDivider));
        assert_eq!(ClockDivider::from_f32(0.5), Err(Error::InvalidDivider));
        assert_eq!(ClockDivider::from_f32(70_000.0), Err(Error::InvalidDivider));
        assert_eq!(ClockDivider::from_f32(f32::NAN), Err(Error::InvalidDivider));
        assert!(ClockDivider::from_int_frac(u16::MAX, 255).is_ok());
    }

    #[test]
    fn from_f32_rounds_to_nearest_step() {
        assert_eq!(ClockDivider::from_f32(9.765625).unwrap().raw(), 2500);
        assert_eq!(ClockDivider::from_f32(1.0).unwrap().raw(), 256);
        assert_eq!(ClockDivider::from_f32(2.0039).unwrap().raw(), 2 * 256 + 1);
    }

    #[test]
    fn divider_for_sample_rate() {
        let div = ClockDivider::for_sample_rate(120_000_000, 96_000, 32, Mode::Transmit).unwrap();
        assert_eq!(div.raw(), 2500);
        let div = ClockDivider::for_sample_rate(120_000_000, 48_000, 32, Mode::Transceive).unwrap();
        assert_eq!(div.raw(), 2500);
        assert_eq!(
            ClockDivider::for_sample_rate(120_000_000, 10_000_000, 32, Mode::Transmit),
            Err(Error::InvalidDivider)
        );
        assert_eq!(
            ClockDivider::for_sample_rate(120_000_000, 48_000, 40, Mode::Transmit),
            Err(Error::InvalidBitDepth(40))
        );
    }
}
