//! On-screen status text
//!
//! The frame has no other output, so fatal conditions and the low-battery
//! warning are drawn into the frame buffer before the refresh.

use core::fmt::Write as _;

use embedded_graphics::mono_font::{ascii::FONT_10X20, MonoTextStyleBuilder};
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use heapless::String;

use crate::display::AcepColor;

/// Height of one text line in pixels.
pub const LINE_HEIGHT: i32 = 22;

/// Distance of the battery line from the bottom edge.
pub const BATTERY_LINE_OFFSET: i32 = 26;

/// Fatal conditions shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusMessage {
    /// The card could not be mounted.
    SdInit,
    /// The photo directory is missing or unreadable.
    PhotoFolder,
    /// The playlist record could not be opened or written.
    RecordFile,
    /// The photo under the cursor could not be opened.
    PictureFile,
    /// The photo directory holds no photos.
    NoPhotos,
    /// The playlist could not be saved after advancing.
    SaveFailed,
}

impl StatusMessage {
    /// Text drawn on the panel.
    pub const fn text(self) -> &'static str {
        match self {
            Self::SdInit => "SD initialization error!",
            Self::PhotoFolder => "Could not open 'photos' folder.",
            Self::RecordFile => "Could not open '/config.bin'.",
            Self::PictureFile => "Could not open picture file.",
            Self::NoPhotos => "No photos found.",
            Self::SaveFailed => "Could not save playlist.",
        }
    }
}

/// Line-by-line text writer from the top-left corner, black on white.
#[derive(Debug, Default)]
pub struct StatusConsole {
    line: i32,
}

impl StatusConsole {
    /// Console starting at the first line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw `text` on the next line.
    pub fn print<D>(&mut self, target: &mut D, text: &str) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = AcepColor>,
    {
        let style = MonoTextStyleBuilder::new()
            .font(&FONT_10X20)
            .text_color(AcepColor::Black)
            .background_color(AcepColor::White)
            .build();
        let y = self.line.saturating_mul(LINE_HEIGHT);
        Text::with_baseline(text, Point::new(0, y), style, Baseline::Top).draw(target)?;
        self.line = self.line.saturating_add(1);
        Ok(())
    }

    /// Draw a [`StatusMessage`] on the next line.
    pub fn show<D>(&mut self, target: &mut D, message: StatusMessage) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = AcepColor>,
    {
        self.print(target, message.text())
    }

    /// Lines printed so far.
    pub fn lines(&self) -> i32 {
        self.line
    }
}

/// `Battery level low! (V.VV)` for a reading in millivolts.
pub fn battery_text(millivolts: u16) -> String<32> {
    // Rounded to centivolts; u16 millivolts cannot overflow u32 here.
    #[allow(clippy::arithmetic_side_effects)]
    let centi = (u32::from(millivolts) + 5) / 10;
    let mut text = String::new();
    let _ = write!(text, "Battery level low! ({}.{:02})", centi / 100, centi % 100);
    text
}

/// Draw the battery warning, white on black, near the bottom edge.
pub fn draw_battery_warning<D>(target: &mut D, millivolts: u16) -> Result<(), D::Error>
where
    D: DrawTarget<Color = AcepColor> + OriginDimensions,
{
    let style = MonoTextStyleBuilder::new()
        .font(&FONT_10X20)
        .text_color(AcepColor::White)
        .background_color(AcepColor::Black)
        .build();
    let height = i32::try_from(target.size().height).unwrap_or(i32::MAX);
    let y = height.saturating_sub(BATTERY_LINE_OFFSET);
    Text::with_baseline(&battery_text(millivolts), Point::new(0, y), style, Baseline::Top).draw(target)?;
    Ok(())
}
