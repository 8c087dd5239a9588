//! Board support for the STM32H743 frame controller.
//!
//! Clock tree, the reset-based sleep scheduler, and the analog inputs used
//! for the battery reading and the shuffle seed.
//!
//! # Pin map
//!
//! | Signal        | Pin  | Notes                         |
//! |---------------|------|-------------------------------|
//! | Panel SCK     | PA5  | SPI1                          |
//! | Panel MOSI    | PA7  | SPI1                          |
//! | Panel CS      | PB1  | active low                    |
//! | Panel DC      | PB0  |                               |
//! | Panel RST     | PB2  | active low                    |
//! | Panel BUSY    | PE3  | low while the controller works|
//! | SD SCK/MISO/MOSI | PB13/PB14/PB15 | SPI2            |
//! | SD CS         | PB12 |                               |
//! | Battery sense | PC0  | ADC1, 1:2 divider             |
//! | Noise         | PC3  | ADC2, left floating           |

use cortex_m::peripheral::SCB;
use embassy_stm32::adc::{Adc, AdcPin, Instance, Resolution};
use embassy_stm32::pac;
use embassy_time::{Duration, Timer};
use platform::power::{EntropySource, PowerMonitor, SleepScheduler, WakeSource};
use platform::{debug, info};

/// Build the embassy_stm32 clock configuration.
///
/// PLL1 from HSI: 64 MHz / 4 × 50 = 800 MHz VCO, P = 400 MHz system clock,
/// Q = 200 MHz SPI kernel clock. Buses run at half the AHB clock.
pub fn build_embassy_config() -> embassy_stm32::Config {
    use embassy_stm32::rcc::{
        AHBPrescaler, APBPrescaler, HSIPrescaler, Pll, PllDiv, PllMul, PllPreDiv, PllSource, Sysclk,
        VoltageScale,
    };

    let mut config = embassy_stm32::Config::default();
    config.rcc.hsi = Some(HSIPrescaler::DIV1);
    config.rcc.csi = true;
    config.rcc.pll1 = Some(Pll {
        source: PllSource::HSI,
        prediv: PllPreDiv::DIV4,
        mul: PllMul::MUL50,
        divp: Some(PllDiv::DIV2),
        divq: Some(PllDiv::DIV4),
        divr: None,
    });
    config.rcc.sys = Sysclk::PLL1_P;
    config.rcc.ahb_pre = AHBPrescaler::DIV2;
    config.rcc.apb1_pre = APBPrescaler::DIV2;
    config.rcc.apb2_pre = APBPrescaler::DIV2;
    config.rcc.apb3_pre = APBPrescaler::DIV2;
    config.rcc.apb4_pre = APBPrescaler::DIV2;
    config.rcc.voltage_scale = VoltageScale::Scale1;
    config
}

// ---------------------------------------------------------------------------
// Sleep
// ---------------------------------------------------------------------------

/// Waits on the embassy timer, then resets so every wake starts from
/// scratch. The reset flags tell the next boot why it is running.
pub struct ResetSleep {
    wake: WakeSource,
}

impl ResetSleep {
    /// Read and clear the reset flags. Call once, early in `main`.
    pub fn take() -> Self {
        let rsr = pac::RCC.rsr().read();
        let wake = if rsr.porrstf() || rsr.borrstf() {
            WakeSource::Cold
        } else if rsr.sftrstf() {
            WakeSource::Timer
        } else if rsr.pinrstf() {
            WakeSource::External
        } else {
            WakeSource::Cold
        };
        pac::RCC.rsr().modify(|w| w.set_rmvf(true));
        Self { wake }
    }
}

impl SleepScheduler for ResetSleep {
    fn wake_reason(&mut self) -> WakeSource {
        self.wake
    }

    async fn deep_sleep(&mut self, duration_us: u64) {
        info!("Sleeping for {} s", duration_us / 1_000_000);
        Timer::after(Duration::from_micros(duration_us)).await;
        SCB::sys_reset();
    }
}

// ---------------------------------------------------------------------------
// Analog inputs
// ---------------------------------------------------------------------------

/// ADC reference in millivolts.
const VREF_MV: u32 = 3_300;
/// Full-scale count at 16-bit resolution.
const FULL_SCALE: u32 = 65_535;
/// The sense pin sits behind a 1:2 divider.
const DIVIDER: u32 = 2;

/// Battery voltage through an ADC channel.
pub struct AdcBattery<'d, T: Instance, P: AdcPin<T>> {
    adc: Adc<'d, T>,
    pin: P,
}

impl<'d, T: Instance, P: AdcPin<T>> AdcBattery<'d, T, P> {
    /// Use `adc` to sample `pin`.
    pub fn new(mut adc: Adc<'d, T>, pin: P) -> Self {
        adc.set_resolution(Resolution::SixteenBit);
        Self { adc, pin }
    }
}

impl<T: Instance, P: AdcPin<T>> PowerMonitor for AdcBattery<'_, T, P> {
    fn battery_voltage_mv(&mut self) -> Option<u16> {
        let raw = u32::from(self.adc.read(&mut self.pin));
        let mv = raw.checked_mul(VREF_MV)?.checked_mul(DIVIDER)? / FULL_SCALE;
        debug!("Battery ADC {} -> {} mV", raw, mv);
        u16::try_from(mv).ok()
    }
}

/// Seed source built from the least significant bits of a floating pin.
pub struct AdcNoise<'d, T: Instance, P: AdcPin<T>> {
    adc: Adc<'d, T>,
    pin: P,
}

impl<'d, T: Instance, P: AdcPin<T>> AdcNoise<'d, T, P> {
    /// Use `adc` to sample the unconnected `pin`.
    pub fn new(mut adc: Adc<'d, T>, pin: P) -> Self {
        adc.set_resolution(Resolution::SixteenBit);
        Self { adc, pin }
    }
}

impl<T: Instance, P: AdcPin<T>> EntropySource for AdcNoise<'_, T, P> {
    fn sample(&mut self) -> u32 {
        (0..32).fold(0u32, |acc, _| acc.rotate_left(1) ^ u32::from(self.adc.read(&mut self.pin) & 1))
    }
}
