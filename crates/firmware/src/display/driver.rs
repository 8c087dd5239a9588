//! ACeP controller constants and the SPI panel transport
//!
//! # Wiring (STM32H743ZI example)
//!
//! | Signal | STM32 pin | Direction |
//! |--------|-----------|-----------|
//! | SCK    | PA5 (SPI1_SCK)  | Host → Display |
//! | MOSI   | PA7 (SPI1_MOSI) | Host → Display |
//! | MISO   | PA6 (SPI1_MISO) | PSRAM → Host |
//! | DC     | PB0 (GPIO)      | Host → Display |
//! | CS     | Managed by `SpiDevice` | Host → Display |
//! | RST    | PB2 (GPIO)      | Host → Display |
//! | BUSY   | PE3 (GPIO), optional | Display → Host |
//!
//! BUSY on this controller is active LOW: the line reads HIGH when the
//! controller is idle, except after POWER_OFF, where completion is signalled
//! by the line dropping LOW.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal_async::{delay::DelayNs, spi::SpiDevice};

use platform::panel::{PanelBus, PanelError};

// ---------------------------------------------------------------------------
// Command set
// ---------------------------------------------------------------------------

/// ACeP controller command codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Command {
    /// Panel setting - 2 data bytes.
    PanelSetting = 0x00,
    /// Power setting - 4 data bytes.
    PowerSetting = 0x01,
    /// Power off - 0 data bytes; BUSY drops LOW when done.
    PowerOff = 0x02,
    /// Power off sequence - 1 data byte.
    PowerOffSequence = 0x03,
    /// Power on - 0 data bytes; BUSY returns HIGH when done.
    PowerOn = 0x04,
    /// Booster soft start - 3 data bytes.
    BoosterSoftStart = 0x06,
    /// Deep sleep - 1 data byte (0xA5 check code).
    DeepSleep = 0x07,
    /// Data start transmission - packed 4bpp frame follows.
    DataStartTransmission = 0x10,
    /// Display refresh - 0 data bytes; BUSY returns HIGH when done.
    DisplayRefresh = 0x12,
    /// PLL control - 1 data byte.
    Pll = 0x30,
    /// Temperature sensor enable - 1 data byte.
    TemperatureSensor = 0x41,
    /// VCOM and data interval - 1 data byte.
    VcomDataInterval = 0x50,
    /// TCON setting - 1 data byte.
    Tcon = 0x60,
    /// Resolution - 4 data bytes (width, height as big-endian u16).
    Resolution = 0x61,
    /// Power saving - 1 data byte.
    PowerSaving = 0xE3,
}

impl Command {
    /// Wire value.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Init-table marker: the next byte is a delay in milliseconds.
pub const TABLE_DELAY: u8 = 0xFF;

/// Init-table marker: end of table.
pub const TABLE_END: u8 = 0xFE;

/// Default power-up register table for the 600×448 panel.
///
/// Entries are `command, n, data[n]`, with [`TABLE_DELAY`] and
/// [`TABLE_END`] markers.
#[rustfmt::skip]
pub const DEFAULT_INIT: &[u8] = &[
    TABLE_DELAY, 10,
    0x00, 2, 0xEF, 0x08,             // panel setting: LUT from OTP
    0x01, 4, 0x37, 0x00, 0x23, 0x23, // power setting
    0x03, 1, 0x00,                   // power off sequence
    0x06, 3, 0xC7, 0xC7, 0x1D,       // booster soft start
    0x30, 1, 0x3C,                   // PLL
    0x41, 1, 0x00,                   // temperature sensor
    0x50, 1, 0x37,                   // VCOM and data interval
    0x60, 1, 0x22,                   // TCON
    0x61, 4, 0x02, 0x58, 0x01, 0xC0, // resolution 600×448
    0xE3, 1, 0xAA,                   // power saving
    TABLE_DELAY, 100,
    0x50, 1, 0x37,
    TABLE_END,
];

/// Resolution payload: 600 (0x0258) × 448 (0x01C0).
pub const RESOLUTION: [u8; 4] = [0x02, 0x58, 0x01, 0xC0];

/// Byte written across the whole panel by the de-ghost pass.
pub const DEGHOST_FILL: u8 = 0x77;

/// Check code for [`Command::DeepSleep`].
pub const DEEP_SLEEP_CHECK: u8 = 0xA5;

// ---------------------------------------------------------------------------
// SPI transport
// ---------------------------------------------------------------------------

/// Placeholder for boards without a BUSY line.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBusyPin;

impl ErrorType for NoBusyPin {
    type Error = Infallible;
}

impl InputPin for NoBusyPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }
}

/// [`PanelBus`] over a 4-wire SPI interface.
///
/// Generic over:
/// - `SPI` - an async [`SpiDevice`] (manages CS).
/// - `DC`  - Data/Command [`OutputPin`].
/// - `RST` - Reset [`OutputPin`].
/// - `BUSY`- optional Busy [`InputPin`].
/// - `DELAY` - [`DelayNs`] for the reset pulse.
pub struct SpiPanelBus<SPI, DC, RST, BUSY, DELAY> {
    spi: SPI,
    dc: DC,
    rst: RST,
    busy: Option<BUSY>,
    delay: DELAY,
}

impl<SPI, DC, RST, BUSY, DELAY> SpiPanelBus<SPI, DC, RST, BUSY, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
{
    /// Transport with a wired BUSY line.
    pub fn new(spi: SPI, dc: DC, rst: RST, busy: BUSY, delay: DELAY) -> Self {
        Self { spi, dc, rst, busy: Some(busy), delay }
    }

    /// Release the bus and pins.
    pub fn release(self) -> (SPI, DC, RST, Option<BUSY>, DELAY) {
        (self.spi, self.dc, self.rst, self.busy, self.delay)
    }
}

impl<SPI, DC, RST, DELAY> SpiPanelBus<SPI, DC, RST, NoBusyPin, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    /// Transport for a board without a BUSY line; waits fall back to delays.
    pub fn without_busy(spi: SPI, dc: DC, rst: RST, delay: DELAY) -> Self {
        Self { spi, dc, rst, busy: None, delay }
    }
}

impl<SPI, DC, RST, BUSY, DELAY> PanelBus for SpiPanelBus<SPI, DC, RST, BUSY, DELAY>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
    BUSY: InputPin,
    DELAY: DelayNs,
{
    async fn command(&mut self, cmd: u8) -> Result<(), PanelError> {
        self.dc.set_low().map_err(|_| PanelError::Gpio)?;
        self.spi.write(&[cmd]).await.map_err(|_| PanelError::Communication)
    }

    async fn data(&mut self, data: &[u8]) -> Result<(), PanelError> {
        if data.is_empty() {
            return Ok(());
        }
        self.dc.set_high().map_err(|_| PanelError::Gpio)?;
        self.spi.write(data).await.map_err(|_| PanelError::Communication)
    }

    /// RST HIGH 10 ms → LOW 10 ms → HIGH 10 ms.
    async fn reset(&mut self) -> Result<(), PanelError> {
        self.rst.set_high().map_err(|_| PanelError::Gpio)?;
        self.delay.delay_ms(10).await;
        self.rst.set_low().map_err(|_| PanelError::Gpio)?;
        self.delay.delay_ms(10).await;
        self.rst.set_high().map_err(|_| PanelError::Gpio)?;
        self.delay.delay_ms(10).await;
        Ok(())
    }

    fn busy_level(&mut self) -> Result<Option<bool>, PanelError> {
        match self.busy.as_mut() {
            Some(pin) => pin.is_high().map(Some).map_err(|_| PanelError::Gpio),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_terminated() {
        assert_eq!(DEFAULT_INIT.last(), Some(&TABLE_END));
        assert_eq!(Command::Resolution.code(), 0x61);
        assert_eq!(Command::DataStartTransmission.code(), 0x10);
    }
}
