//! Packed 4bpp frame buffer with rotation
//!
//! Two pixels per byte, row-major in panel order: the even x of a pair is
//! the high nibble, the odd x the low nibble. Drawing happens in logical
//! coordinates; [`FrameBuffer::address`] is the single place where a logical
//! coordinate becomes a byte address, so rotation is handled there and
//! nowhere else.

use embedded_graphics::prelude::*;

use super::backing::BackingStore;
use super::color::AcepColor;
use super::{CLEAR_BYTE, FRAME_BYTES, HEIGHT, WIDTH};

/// Panel height rounded up to a whole number of 8-row bands.
const HEIGHT_ALIGNED: u32 = HEIGHT.div_ceil(8) * 8;

/// Orientation of the logical canvas relative to the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum Rotation {
    /// Landscape, connector at the bottom.
    #[default]
    Deg0,
    /// Portrait.
    Deg90,
    /// Landscape, upside down.
    Deg180,
    /// Portrait, upside down.
    Deg270,
}

impl Rotation {
    /// Logical canvas size (width, height).
    pub const fn logical_size(self) -> (u32, u32) {
        match self {
            Self::Deg0 | Self::Deg180 => (WIDTH, HEIGHT),
            Self::Deg90 | Self::Deg270 => (HEIGHT, WIDTH),
        }
    }

    /// Map an in-bounds logical coordinate to panel coordinates.
    ///
    /// Callers check bounds against [`logical_size`](Self::logical_size)
    /// first; the subtractions below cannot underflow after that.
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn to_panel(self, x: u32, y: u32) -> (u32, u32) {
        match self {
            Self::Deg0 => (x, y),
            Self::Deg90 => (WIDTH - 1 - y, x),
            Self::Deg180 => (WIDTH - 1 - x, HEIGHT_ALIGNED - 1 - y),
            Self::Deg270 => (y, HEIGHT_ALIGNED - 1 - x),
        }
    }

    /// Inverse of [`to_panel`](Self::to_panel) for in-bounds panel coordinates.
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn to_logical(self, px: u32, py: u32) -> (u32, u32) {
        match self {
            Self::Deg0 => (px, py),
            Self::Deg90 => (py, WIDTH - 1 - px),
            Self::Deg180 => (WIDTH - 1 - px, HEIGHT_ALIGNED - 1 - py),
            Self::Deg270 => (HEIGHT_ALIGNED - 1 - py, px),
        }
    }
}

/// Where one pixel lives in the packed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NibbleAddress {
    /// Byte offset.
    pub byte: usize,
    /// `true` for the low nibble (odd panel x).
    pub low: bool,
}

impl NibbleAddress {
    /// `byte` with this nibble replaced by `value` and the other one kept.
    pub const fn merge(self, byte: u8, value: u8) -> u8 {
        let value = value & 0x0F;
        if self.low {
            (byte & 0xF0) | value
        } else {
            (byte & 0x0F) | (value << 4)
        }
    }

    /// This nibble of `byte`.
    pub const fn extract(self, byte: u8) -> u8 {
        if self.low {
            byte & 0x0F
        } else {
            byte >> 4
        }
    }
}

/// Packed frame over a [`BackingStore`].
pub struct FrameBuffer<B> {
    store: B,
    rotation: Rotation,
}

impl<B: BackingStore> FrameBuffer<B> {
    /// Frame over `store`, unrotated.
    pub fn new(store: B) -> Self {
        Self { store, rotation: Rotation::Deg0 }
    }

    /// Current rotation.
    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Change the rotation used by later draws. Existing pixels stay put.
    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    /// The backing store.
    pub fn store(&self) -> &B {
        &self.store
    }

    /// The backing store, mutably; used to stream the frame out.
    pub fn store_mut(&mut self) -> &mut B {
        &mut self.store
    }

    /// Give the backing store back.
    pub fn into_store(self) -> B {
        self.store
    }

    /// Fill the whole frame with white.
    pub fn blank(&mut self) -> Result<(), B::Error> {
        self.fill_bytes(CLEAR_BYTE)
    }

    /// Fill the whole frame with `value` in every byte.
    pub fn fill_bytes(&mut self, value: u8) -> Result<(), B::Error> {
        let len = FRAME_BYTES.min(self.store.len());
        self.store.erase(0, len, value)
    }

    /// Byte address of logical `(x, y)`, or `None` when it is off-canvas.
    pub fn address(&self, x: i32, y: i32) -> Option<NibbleAddress> {
        let x = u32::try_from(x).ok()?;
        let y = u32::try_from(y).ok()?;
        let (w, h) = self.rotation.logical_size();
        if x >= w || y >= h {
            return None;
        }
        let (px, py) = self.rotation.to_panel(x, y);
        let linear = py.checked_mul(WIDTH)?.checked_add(px)?;
        let byte = usize::try_from(linear / 2).ok()?;
        if byte >= self.store.len() {
            return None;
        }
        Some(NibbleAddress { byte, low: px % 2 == 1 })
    }

    /// Write one 4-bit sample at logical `(x, y)`.
    ///
    /// Off-canvas writes do nothing and succeed. The other nibble of the
    /// byte is preserved.
    pub fn set_nibble(&mut self, x: i32, y: i32, value: u8) -> Result<(), B::Error> {
        let Some(at) = self.address(x, y) else {
            return Ok(());
        };
        let old = self.store.read_byte(at.byte)?;
        self.store.write_byte(at.byte, at.merge(old, value))
    }

    /// The 4-bit sample at logical `(x, y)`, or `None` off-canvas.
    pub fn nibble(&mut self, x: i32, y: i32) -> Result<Option<u8>, B::Error> {
        let Some(at) = self.address(x, y) else {
            return Ok(None);
        };
        Ok(Some(at.extract(self.store.read_byte(at.byte)?)))
    }
}

impl<B: BackingStore> OriginDimensions for FrameBuffer<B> {
    fn size(&self) -> Size {
        let (w, h) = self.rotation.logical_size();
        Size::new(w, h)
    }
}

impl<B: BackingStore> DrawTarget for FrameBuffer<B> {
    type Color = AcepColor;
    type Error = B::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_nibble(point.x, point.y, color.nibble())?;
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let n = color.nibble();
        self.fill_bytes((n << 4) | n)
    }
}
