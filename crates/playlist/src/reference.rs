//! Photo locators.
//!
//! A photo is remembered by the directory locator(s) the filesystem handed
//! out while scanning, never by its path, so an entry costs two or four
//! bytes on the card instead of up to [`platform::storage::PATH_MAX`].

/// How photos are laid out below the photo directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum Layout {
    /// Photos sit directly in the photo directory.
    #[default]
    Flat,
    /// Photos sit one level down, in sub-directories of the photo directory.
    Nested,
}

impl Layout {
    /// Encoded size of one [`PhotoReference`] in this layout.
    pub const fn entry_size(self) -> usize {
        match self {
            Self::Flat => 2,
            Self::Nested => 4,
        }
    }
}

/// Opaque handle that reopens one photo without storing its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhotoReference {
    /// Locator of a file in the photo directory.
    Flat(u16),
    /// Locator of a sub-directory and of a file inside it.
    Nested {
        /// Sub-directory locator within the photo directory.
        dir: u16,
        /// File locator within that sub-directory.
        file: u16,
    },
}

impl PhotoReference {
    /// The layout this reference belongs to.
    pub const fn layout(self) -> Layout {
        match self {
            Self::Flat(_) => Layout::Flat,
            Self::Nested { .. } => Layout::Nested,
        }
    }

    /// Little-endian encoding; only the first [`Layout::entry_size`] bytes
    /// are meaningful.
    pub fn to_bytes(self) -> [u8; 4] {
        match self {
            Self::Flat(loc) => {
                let [a, b] = loc.to_le_bytes();
                [a, b, 0, 0]
            }
            Self::Nested { dir, file } => {
                let [a, b] = dir.to_le_bytes();
                let [c, d] = file.to_le_bytes();
                [a, b, c, d]
            }
        }
    }

    /// Decode from the first [`Layout::entry_size`] bytes of `bytes`.
    pub fn from_bytes(layout: Layout, bytes: [u8; 4]) -> Self {
        let [a, b, c, d] = bytes;
        match layout {
            Layout::Flat => Self::Flat(u16::from_le_bytes([a, b])),
            Layout::Nested => Self::Nested {
                dir: u16::from_le_bytes([a, b]),
                file: u16::from_le_bytes([c, d]),
            },
        }
    }
}
