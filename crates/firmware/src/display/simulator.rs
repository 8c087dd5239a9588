//! Simulated ACeP controller
//!
//! Interprets the command stream sent by the refresh sequencer the way the
//! panel does: data after DATA_START_TRANSMISSION fills controller RAM, and
//! DISPLAY_REFRESH copies that RAM to the visible image. The visible image
//! can be exported as PNG.

use std::path::Path;
use std::vec::Vec;

use image::{Rgb, RgbImage};
use platform::panel::{PanelBus, PanelError};

use super::color::AcepColor;
use super::driver::Command;
use super::{FRAME_BYTES, HEIGHT, WIDTH};

/// Host-side [`PanelBus`] that keeps what a real panel would show.
pub struct SimulatedPanel {
    ram: Vec<u8>,
    visible: Vec<u8>,
    last_command: Option<u8>,
    refreshes: u32,
    sleeping: bool,
}

impl SimulatedPanel {
    /// Blank (white) panel.
    pub fn new() -> Self {
        Self {
            ram: Vec::with_capacity(FRAME_BYTES),
            visible: vec![0x11; FRAME_BYTES],
            last_command: None,
            refreshes: 0,
            sleeping: false,
        }
    }

    /// Packed bytes currently visible.
    pub fn visible(&self) -> &[u8] {
        &self.visible
    }

    /// Number of DISPLAY_REFRESH commands seen.
    pub fn refreshes(&self) -> u32 {
        self.refreshes
    }

    /// Whether the controller was put into deep sleep.
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Visible image as RGB.
    pub fn to_image(&self) -> RgbImage {
        let row_bytes = WIDTH as usize / 2;
        RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
            let byte = self
                .visible
                .get(y as usize * row_bytes + x as usize / 2)
                .copied()
                .unwrap_or(0x11);
            let nibble = if x % 2 == 0 { byte >> 4 } else { byte & 0x0F };
            Rgb(AcepColor::from_nibble(nibble).unwrap_or(AcepColor::Clean).rgb())
        })
    }

    /// Write the visible image to `path` as PNG.
    pub fn save_png(&self, path: &Path) -> image::ImageResult<()> {
        self.to_image().save(path)
    }
}

impl Default for SimulatedPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelBus for SimulatedPanel {
    async fn command(&mut self, cmd: u8) -> Result<(), PanelError> {
        tracing::trace!(cmd = format_args!("{cmd:#04x}"), "panel command");
        self.last_command = Some(cmd);
        if cmd == Command::DataStartTransmission.code() {
            self.ram.clear();
        } else if cmd == Command::DisplayRefresh.code() {
            let n = self.ram.len().min(FRAME_BYTES);
            if let (Some(dst), Some(src)) = (self.visible.get_mut(..n), self.ram.get(..n)) {
                dst.copy_from_slice(src);
            }
            self.refreshes = self.refreshes.saturating_add(1);
            tracing::debug!(refreshes = self.refreshes, bytes = n, "panel refreshed");
        } else if cmd == Command::DeepSleep.code() {
            self.sleeping = true;
        }
        Ok(())
    }

    async fn data(&mut self, data: &[u8]) -> Result<(), PanelError> {
        if self.last_command == Some(Command::DataStartTransmission.code()) {
            self.ram.extend_from_slice(data);
        }
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), PanelError> {
        self.sleeping = false;
        Ok(())
    }

    fn busy_level(&mut self) -> Result<Option<bool>, PanelError> {
        Ok(Some(self.last_command != Some(Command::PowerOff.code())))
    }
}
