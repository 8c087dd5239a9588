//! ACeP palette.

use embedded_graphics::pixelcolor::raw::RawU4;
use embedded_graphics::pixelcolor::PixelColor;

/// One of the seven inks of the ACeP panel, plus the controller's
/// "clean" code. The discriminant is the nibble written to panel RAM.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcepColor {
    /// 0x0
    Black = 0,
    /// 0x1
    #[default]
    White = 1,
    /// 0x2
    Green = 2,
    /// 0x3
    Blue = 3,
    /// 0x4
    Red = 4,
    /// 0x5
    Yellow = 5,
    /// 0x6
    Orange = 6,
    /// 0x7, drives every particle to neutral.
    Clean = 7,
}

impl AcepColor {
    /// Nibble value sent to the panel.
    pub const fn nibble(self) -> u8 {
        self as u8
    }

    /// Colour for a nibble; codes above 7 are not inks and yield `None`.
    pub const fn from_nibble(n: u8) -> Option<Self> {
        Some(match n {
            0 => Self::Black,
            1 => Self::White,
            2 => Self::Green,
            3 => Self::Blue,
            4 => Self::Red,
            5 => Self::Yellow,
            6 => Self::Orange,
            7 => Self::Clean,
            _ => return None,
        })
    }

    /// Approximate sRGB appearance, for the simulator and tools.
    pub const fn rgb(self) -> [u8; 3] {
        match self {
            Self::Black => [0x00, 0x00, 0x00],
            Self::White => [0xFF, 0xFF, 0xFF],
            Self::Green => [0x00, 0x80, 0x00],
            Self::Blue => [0x00, 0x00, 0xFF],
            Self::Red => [0xFF, 0x00, 0x00],
            Self::Yellow => [0xFF, 0xFF, 0x00],
            Self::Orange => [0xFF, 0x80, 0x00],
            Self::Clean => [0xC0, 0xC0, 0xC0],
        }
    }
}

impl PixelColor for AcepColor {
    type Raw = RawU4;
}
