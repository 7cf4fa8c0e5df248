//! Sine tone output: the simplest transmit stream.
//!
//! Plays a 1 kHz sine on both channels of an I2S DAC (PCM5102A or similar)
//! at 48 kHz, 32 bits per sample.
//!
//! ```text
//!   PatternBuffer ──► DMA ch0 ──► PIO0 SM0 ──► DAC
//! ```
//!
//! Pins:
//!   GP9:  DIN    GP10: BCK    GP11: LRCK
//!
//! The onboard LED toggles every 48 buffers.

#![no_std]
#![no_main]

use defmt_rtt as _;
use panic_probe as _;

#[rtic::app(device = rp_pico::hal::pac, peripherals = true)]
mod app {
    use embedded_hal::digital::StatefulOutputPin;
    use rp_pico::hal::{self, clocks::init_clocks_and_plls, Clock};

    use pio_i2s::{
        I2sStream, Pattern, PatternBuffer, PatternSettings, Rp2040Hardware, StreamConfig,
    };

    const SAMPLE_RATE: u32 = 48_000;
    const TONE_FRAMES: usize = 48;

    type Led = hal::gpio::Pin<hal::gpio::bank0::Gpio25, hal::gpio::FunctionSioOutput, hal::gpio::PullDown>;

    static TONE: PatternBuffer<TONE_FRAMES> = PatternBuffer::new();

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        hw: Rp2040Hardware,
        led: Led,
        stream: I2sStream<Rp2040Hardware>,
    }

    // ── Init ─────────────────────────────────────────────────────────

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
        defmt::info!("system clock {} Hz", sys_hz);

        let sio = hal::Sio::new(device.SIO);
        let pins = rp_pico::Pins::new(
            device.IO_BANK0,
            device.PADS_BANK0,
            sio.gpio_bank0,
            &mut device.RESETS,
        );
        let led = pins.led.into_push_pull_output();

        // ── Pattern ─────────────────────────────────────────────────
        let frames = TONE
            .configure(PatternSettings {
                pattern: Pattern::Sine,
                offset: 0,
                amplitude: 1 << 28,
                length: TONE_FRAMES,
            })
            .unwrap();
        defmt::info!("tone pattern: {} frames", frames);

        // ── Stream ──────────────────────────────────────────────────
        let hw = Rp2040Hardware::new(
            device.PIO0,
            device.PIO1,
            device.DMA,
            &mut device.RESETS,
            sys_hz,
        );
        let mut stream = I2sStream::new(hw, StreamConfig::transmit(9, 10, &TONE)).unwrap();
        let actual = stream.set_sample_rate(SAMPLE_RATE).unwrap();
        defmt::info!("sample rate {} Hz", actual);
        stream.start().unwrap();

        (Shared {}, Local { hw, led, stream })
    }

    #[idle(local = [stream])]
    fn idle(cx: idle::Context) -> ! {
        defmt::info!("streaming: {}", cx.local.stream.state());
        loop {
            cortex_m::asm::wfi();
        }
    }

    // ── DMA ISR: re-arm finished channels ────────────────────────────

    #[task(binds = DMA_IRQ_0, local = [hw, led, buffers: u32 = 0], priority = 2)]
    fn dma_irq(cx: dma_irq::Context) {
        let report = pio_i2s::dma_irq_handler(cx.local.hw);
        if report.starved != 0 {
            defmt::warn!("starved channels {:#x}", report.starved);
        }

        *cx.local.buffers = cx.local.buffers.wrapping_add(report.serviced.count_ones());
        if *cx.local.buffers % 48 == 0 {
            let _ = cx.local.led.toggle();
        }
    }
}
