//! Line-in level meter: a receive-only stream.
//!
//! Captures 24-bit stereo from an I2S ADC (PCM1808 or similar) and logs
//! the peak level of each channel twice a second.
//!
//! ```text
//!   ADC ──► PIO0 SM1 ──► DMA ch2 ──► CaptureBuffers ──► idle: peak meter
//! ```
//!
//! Pins:
//!   GP6:  DOUT   GP7: BCK    GP8: LRCK
//!
//! The ADC must run as a clock slave. Samples are left-justified in each
//! 32-bit word, so the low 8 bits are always zero at 24 bits.

#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_probe as _;

#[rtic::app(device = rp_pico::hal::pac, peripherals = true)]
mod app {
    use embedded_hal::digital::StatefulOutputPin;
    use rp_pico::hal::{self, clocks::init_clocks_and_plls, Clock};

    use pio_i2s::{CaptureBuffers, I2sStream, PioBlock, Rp2040Hardware, StreamConfig};

    const SAMPLE_RATE: u32 = 48_000;
    const FRAMES: usize = 256;

    type Led = hal::gpio::Pin<hal::gpio::bank0::Gpio25, hal::gpio::FunctionSioOutput, hal::gpio::PullDown>;

    static CAPTURE: CaptureBuffers<FRAMES> = CaptureBuffers::new();

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        hw: Rp2040Hardware,
        led: Led,
        stream: I2sStream<Rp2040Hardware>,
        sys_hz: u32,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        let mut device = cx.device;
        let mut watchdog = hal::Watchdog::new(device.WATCHDOG);
        let clocks = init_clocks_and_plls(
            rp_pico::XOSC_CRYSTAL_FREQ,
            device.XOSC,
            device.CLOCKS,
            device.PLL_SYS,
            device.PLL_USB,
            &mut device.RESETS,
            &mut watchdog,
        )
        .ok()
        .unwrap();
        let sys_hz = clocks.system_clock.freq().to_Hz();

        let sio = hal::Sio::new(device.SIO);
        let pins = rp_pico::Pins::new(
            device.IO_BANK0,
            device.PADS_BANK0,
            sio.gpio_bank0,
            &mut device.RESETS,
        );
        let led = pins.led.into_push_pull_output();

        let hw = Rp2040Hardware::new(
            device.PIO0,
            device.PIO1,
            device.DMA,
            &mut device.RESETS,
            sys_hz,
        );
        let config = StreamConfig::receive(6, 7, &CAPTURE)
            .with_bit_depth(24)
            .with_state_machine(PioBlock::Pio0, 1)
            .with_dma_channel(2);
        let mut stream = I2sStream::new(hw, config).unwrap();
        let actual = stream.set_sample_rate(SAMPLE_RATE).unwrap();
        defmt::info!("capturing {} words per block at {} Hz", CAPTURE.words(), actual);
        stream.start().unwrap();

        (Shared {}, Local { hw, led, stream, sys_hz })
    }

    // ── Idle: peak meter ─────────────────────────────────────────────

    #[idle(local = [stream, sys_hz, block: [i32; FRAMES * 2] = [0; FRAMES * 2]])]
    fn idle(cx: idle::Context) -> ! {
        let half_second = *cx.local.sys_hz / 2;
        loop {
            cortex_m::asm::delay(half_second);
            let Some(sequence) = cx.local.stream.copy_latest_capture(cx.local.block) else {
                defmt::warn!("no complete capture yet");
                continue;
            };

            let (mut left, mut right) = (0u32, 0u32);
            for frame in cx.local.block.chunks_exact(2) {
                left = left.max(frame[0].unsigned_abs());
                right = right.max(frame[1].unsigned_abs());
            }
            defmt::info!("block {}: peak L {:#x} R {:#x}", sequence, left, right);
        }
    }

    #[task(binds = DMA_IRQ_0, local = [hw, led, blocks: u32 = 0], priority = 2)]
    fn dma_irq(cx: dma_irq::Context) {
        let report = pio_i2s::dma_irq_handler(cx.local.hw);
        if report.is_spurious() {
            return;
        }

        *cx.local.blocks = cx.local.blocks.wrapping_add(1);
        if *cx.local.blocks % 94 == 0 {
            let _ = cx.local.led.toggle();
        }
    }
}
