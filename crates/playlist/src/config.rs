//! Playlist configuration.

use platform::storage::StoragePath;

use crate::reference::Layout;

/// When [`advance`](crate::PlaylistStore::advance) rebuilds instead of
/// moving the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum RebuildBoundary {
    /// Rebuild once the cursor reaches `count - 2`.
    ///
    /// The last photo of a pass is never shown; this is how deployed frames
    /// behave and stays the default.
    #[default]
    SecondToLast,
    /// Rebuild once the cursor reaches `count - 1`, after every photo was shown.
    Last,
}

impl RebuildBoundary {
    /// Whether advancing from `cursor` in a list of `count` must rebuild.
    pub fn must_rebuild(self, cursor: u16, count: u16) -> bool {
        let ahead: u32 = match self {
            Self::SecondToLast => 2,
            Self::Last => 1,
        };
        u32::from(cursor).saturating_add(ahead) >= u32::from(count)
    }
}

/// Where the playlist lives on the card and how it behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct PlaylistConfig {
    /// Directory scanned for photos.
    pub photo_dir: StoragePath,
    /// Canonical record file.
    pub record_path: StoragePath,
    /// Scratch file written before being renamed over the record.
    pub temp_path: StoragePath,
    /// Flat or one-level nested photo directory.
    pub layout: Layout,
    /// Rebuild policy at the end of a pass.
    pub boundary: RebuildBoundary,
}

fn path(s: &str) -> StoragePath {
    let mut p = StoragePath::new();
    // Literals below are far shorter than PATH_MAX.
    let _ = p.push_str(s);
    p
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            photo_dir: path("/photos"),
            record_path: path("/config.bin"),
            temp_path: path("/config.tmp"),
            layout: Layout::Flat,
            boundary: RebuildBoundary::SecondToLast,
        }
    }
}
