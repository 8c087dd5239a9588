//! E-paper photo frame - main entry point
//!
//! Hardware-only entry point for STM32H743ZI. Every boot is one wake cycle:
//! show the next photo, then sleep until the timer resets the MCU.

#![no_std]
#![no_main]

use core::ptr::addr_of_mut;

use embassy_executor::Spawner;
use embassy_stm32::adc::Adc;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz;
use embassy_time::Delay;
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::{SdCard, VolumeManager};
use platform::power::SleepScheduler;
use platform::spi_sram::{SpiSram, CAPACITY_64MBIT};
use platform::storage_sdmmc::{FixedTimeSource, SdmmcStorage};
use playlist::FullPlaylist;
use static_cell::StaticCell;

use firmware::board::{self, AdcBattery, AdcNoise, ResetSleep};
use firmware::{FrameBuffer, FrameConfig, FrameMemory, FrameStore, RefreshSequencer, WakeCycle, FRAME_BYTES};

use defmt_rtt as _;
use panic_probe as _;

static CONFIG: StaticCell<FrameConfig> = StaticCell::new();
static PLAYLIST: StaticCell<FullPlaylist> = StaticCell::new();

static mut FRAME: [u8; FRAME_BYTES] = [0; FRAME_BYTES];

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    defmt::info!("{=str} v{=str}", platform::config::APP_NAME, platform::config::APP_VERSION);

    // Reset flags must be read before anything else can reset the MCU.
    let mut sleep = ResetSleep::take();
    let p = embassy_stm32::init(board::build_embassy_config());

    let config: &'static FrameConfig = CONFIG.init_with(FrameConfig::default);
    let playlist = PLAYLIST.init_with(|| FullPlaylist::new(config.playlist.clone()));

    // SAFETY: `main` runs once per boot and this is the only reference.
    let frame: &'static mut [u8; FRAME_BYTES] = unsafe { &mut *addr_of_mut!(FRAME) };

    // Panel on SPI1 (PA5 SCK, PA7 MOSI), DMA driven.
    let mut panel_config = SpiConfig::default();
    panel_config.frequency = Hertz(4_000_000);
    let panel_spi = Spi::new(p.SPI1, p.PA5, p.PA7, p.PA6, p.DMA1_CH0, p.DMA1_CH1, panel_config);
    let dc = Output::new(p.PB0, Level::Low, Speed::VeryHigh);
    let cs = Output::new(p.PB1, Level::High, Speed::VeryHigh);
    let rst = Output::new(p.PB2, Level::High, Speed::VeryHigh);
    let busy = Input::new(p.PE3, Pull::None);
    let Ok(panel_device) = ExclusiveDevice::new(panel_spi, cs, Delay) else {
        defmt::error!("Panel chip select unusable");
        sleep.deep_sleep(config.sleep_interval_us).await;
        return;
    };
    let panel = firmware::display::SpiPanelBus::new(panel_device, dc, rst, busy, Delay);

    // Memory card on SPI2 (PB13 SCK, PB15 MOSI, PB14 MISO), 400 kHz for init.
    let mut sd_config = SpiConfig::default();
    sd_config.frequency = Hertz(400_000);
    let sd_spi = Spi::new_blocking(p.SPI2, p.PB13, p.PB15, p.PB14, sd_config);
    let sd_cs = Output::new(p.PB12, Level::High, Speed::VeryHigh);
    let Ok(sd_device) = ExclusiveDevice::new(sd_spi, sd_cs, Delay) else {
        defmt::error!("SD chip select unusable");
        sleep.deep_sleep(config.sleep_interval_us).await;
        return;
    };
    let volumes = VolumeManager::new(SdCard::new(sd_device, Delay), FixedTimeSource);

    // Optional PSRAM on SPI3 (PC10 SCK, PC12 MOSI, PC11 MISO), only wired
    // up when the frame is configured to live there.
    let ram = match config.frame_store {
        FrameStore::Local => None,
        FrameStore::External => {
            let mut ram_config = SpiConfig::default();
            ram_config.frequency = Hertz(20_000_000);
            let ram_spi = Spi::new_blocking(p.SPI3, p.PC10, p.PC12, p.PC11, ram_config);
            let ram_cs = Output::new(p.PA15, Level::High, Speed::VeryHigh);
            ExclusiveDevice::new(ram_spi, ram_cs, Delay).ok().map(|dev| SpiSram::new(dev, CAPACITY_64MBIT))
        }
    };
    let memory = FrameMemory::select(config.frame_store, frame, ram, FRAME_BYTES);
    defmt::info!("Frame memory: {}", memory.store());

    let display = RefreshSequencer::new(panel, Delay, config.refresh_timing())
        .power_down_after_refresh(config.power_down_after_refresh);

    let mut cycle = WakeCycle {
        config,
        playlist,
        storage: SdmmcStorage::new(&volumes),
        frame: FrameBuffer::new(memory),
        display,
        sleep,
        power: AdcBattery::new(Adc::new(p.ADC1, &mut Delay), p.PC0),
        entropy: AdcNoise::new(Adc::new(p.ADC2, &mut Delay), p.PC3),
    };

    // Does not return: the sleep request ends in a reset.
    let report = cycle.run().await;
    defmt::warn!("Woke without reset: {}", report.wake);
}
