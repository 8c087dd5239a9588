//! Wake-cycle failures.

use crate::status::StatusMessage;

/// Why a wake cycle could not show the next photo.
///
/// Every variant maps to the message drawn on the panel and to what
/// happens to the stored playlist before the frame sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleError {
    /// The card did not mount.
    #[error("card did not mount after {attempts} attempts")]
    StorageInit {
        /// Mount attempts made.
        attempts: u8,
    },
    /// The photo directory is missing or could not be listed.
    #[error("photo directory unavailable")]
    PhotoDirectory,
    /// The playlist record could not be read or created.
    #[error("playlist record unavailable: {0}")]
    RecordOpen(&'static str),
    /// The photo directory holds nothing to show.
    #[error("no photos")]
    NoPhotos,
    /// The photo under the cursor is gone or unreadable.
    #[error("photo unavailable: {0}")]
    PhotoOpen(&'static str),
    /// The advanced playlist could not be saved.
    #[error("playlist not saved: {0}")]
    Persist(&'static str),
    /// The frame buffer's backing store failed.
    #[error("frame buffer failure")]
    Frame,
    /// The panel refresh failed.
    #[error("display refresh failed: {0}")]
    Display(&'static str),
}

impl CycleError {
    /// Message drawn before the refresh, if the panel can still show one.
    pub const fn message(self) -> Option<StatusMessage> {
        match self {
            Self::StorageInit { .. } => Some(StatusMessage::SdInit),
            Self::PhotoDirectory => Some(StatusMessage::PhotoFolder),
            Self::RecordOpen(_) => Some(StatusMessage::RecordFile),
            Self::NoPhotos => Some(StatusMessage::NoPhotos),
            Self::PhotoOpen(_) => Some(StatusMessage::PictureFile),
            Self::Persist(_) => Some(StatusMessage::SaveFailed),
            Self::Frame | Self::Display(_) => None,
        }
    }

    /// Whether the stored playlist is invalidated so the next wake rebuilds.
    pub const fn invalidates_playlist(self) -> bool {
        matches!(self, Self::PhotoDirectory | Self::NoPhotos | Self::PhotoOpen(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_photo_side_failures_invalidate() {
        assert!(!CycleError::StorageInit { attempts: 5 }.invalidates_playlist());
        assert!(CycleError::PhotoDirectory.invalidates_playlist());
        assert!(!CycleError::RecordOpen("storage").invalidates_playlist());
        assert!(CycleError::PhotoOpen("stale reference").invalidates_playlist());
        assert!(!CycleError::Persist("rename").invalidates_playlist());
    }
}
