//! Transceive loopback self-test.
//!
//! Sends a triangle pattern and receives it on the same clock. With GP9
//! jumpered to GP10, every captured block must contain the pattern; the
//! test logs a pass or the first mismatching word once a second.
//!
//! ```text
//!   PatternBuffer ──► DMA ch4 ──► PIO1 SM0 ──► GP9 ─┐
//!                                                    │ jumper
//!   CaptureBuffers ◄── DMA ch5 ◄── PIO1 SM0 ◄── GP10 ┘
//! ```
//!
//! Pins:
//!   GP9: data out   GP10: data in   GP11: BCLK   GP12: LRCK   GP13: reserved
//!
//! The pattern length equals the capture block, so a block captured
//! after the first holds the whole pattern, rotated by however many words
//! the receive side lags.

#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_probe as _;

#[rtic::app(device = rp_pico::hal::pac, peripherals = true)]
mod app {
    use embedded_hal::digital::OutputPin;
    use rp_pico::hal::{self, clocks::init_clocks_and_plls, Clock};

    use pio_i2s::{
        CaptureBuffers, I2sStream, Pattern, PatternBuffer, PatternSettings, PioBlock,
        Rp2040Hardware, StreamConfig,
    };

    const FRAMES: usize = 64;

    type Led = hal::gpio::Pin<hal::gpio::bank0::Gpio25, hal::gpio::FunctionSioOutput, hal::gpio::PullDown>;

    static PATTERN: PatternBuffer<FRAMES> = PatternBuffer::new();
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

        PATTERN
            .configure(PatternSettings {
                pattern: Pattern::Triangle,
                offset: -(1 << 24),
                amplitude: 1 << 25,
                length: FRAMES,
            })
            .unwrap();

        let hw = Rp2040Hardware::new(
            device.PIO0,
            device.PIO1,
            device.DMA,
            &mut device.RESETS,
            sys_hz,
        );
        let config = StreamConfig::transceive(9, 11, &PATTERN, &CAPTURE)
            .with_state_machine(PioBlock::Pio1, 0)
            .with_dma_channel(4);
        let mut stream = I2sStream::new(hw, config).unwrap();
        defmt::info!(
            "loopback on {:?} at {} Hz",
            stream.dma_channels(),
            stream.sample_rate()
        );
        stream.start().unwrap();

        (Shared {}, Local { hw, led, stream, sys_hz })
    }

    // ── Idle: compare captured blocks with the pattern ───────────────

    #[idle(local = [stream, sys_hz, led, block: [i32; FRAMES * 2] = [0; FRAMES * 2]])]
    fn idle(cx: idle::Context) -> ! {
        let expected = reference();
        loop {
            cortex_m::asm::delay(*cx.local.sys_hz);
            let Some(sequence) = cx.local.stream.copy_latest_capture(cx.local.block) else {
                continue;
            };
            if sequence < 2 {
                continue;
            }

            match rotation(&expected, cx.local.block) {
                Some(lag) => {
                    defmt::info!("block {}: pass, lag {} words", sequence, lag);
                    let _ = cx.local.led.set_high();
                }
                None => {
                    defmt::error!("block {}: captured data does not match", sequence);
                    let _ = cx.local.led.set_low();
                }
            }
        }
    }

    #[task(binds = DMA_IRQ_0, local = [hw], priority = 2)]
    fn dma_irq(cx: dma_irq::Context) {
        let report = pio_i2s::dma_irq_handler(cx.local.hw);
        if report.starved != 0 {
            defmt::warn!("starved channels {:#x}", report.starved);
        }
    }

    /// The words the pattern buffer transmits, one block long.
    fn reference() -> [i32; FRAMES * 2] {
        let mut words = [0; FRAMES * 2];
        for (i, frame) in words.chunks_exact_mut(2).enumerate() {
            let step = if i < FRAMES / 2 { i } else { FRAMES - i - 1 };
            let value = ((1 << 25) as f32 * (step * 2) as f32 / FRAMES as f32) as i32 - (1 << 24);
            frame[0] = value;
            frame[1] = value;
        }
        words
    }

    /// Word offset at which `captured` equals `expected` rotated, if any.
    fn rotation(expected: &[i32], captured: &[i32]) -> Option<usize> {
        let len = expected.len();
        (0..len).find(|&lag| (0..len).all(|i| captured[(i + lag) % len] == expected[i]))
    }
}
