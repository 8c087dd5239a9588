//! Scanner - walks the photo directory and fills a [`PlaylistRecord`].
//!
//! Flat layout: every visible file directly in the photo directory.
//! Nested layout: every visible file one level down; files at the top level
//! and directories at the second level are ignored.

use core::ops::ControlFlow;

use heapless::{String, Vec};
use platform::storage::{join_path, DirEntry, Storage, NAME_MAX};
use platform::{debug, info, warn};

use crate::record::PlaylistRecord;
use crate::reference::{Layout, PhotoReference};

/// Maximum number of sub-directories visited in the nested layout.
pub const MAX_SUBDIRS: usize = 256;

/// Progress is logged every this many indexed photos.
const PROGRESS_EVERY: u16 = 100;

/// Why a directory entry was left out of the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// Directory where a file was expected (or vice versa).
    WrongLevel,
    /// Hidden attribute set.
    Hidden,
}

/// Decide whether a `file`-level entry is indexed.
pub fn classify_file(entry: &DirEntry) -> Result<(), Skip> {
    if entry.is_dir {
        Err(Skip::WrongLevel)
    } else if entry.is_hidden {
        Err(Skip::Hidden)
    } else {
        Ok(())
    }
}

/// Rescan `photo_dir` into `record` and reset its cursor to 0.
///
/// Stops without error once the record is full. Returns the number of
/// photos indexed.
pub async fn build<S: Storage, const N: usize>(
    storage: &mut S,
    photo_dir: &str,
    layout: Layout,
    record: &mut PlaylistRecord<N>,
) -> Result<u16, S::Error> {
    info!("Rebuilding index...");
    record.reset(layout);
    match layout {
        Layout::Flat => scan_flat(storage, photo_dir, record).await?,
        Layout::Nested => scan_nested(storage, photo_dir, record).await?,
    }
    info!("Scanned {} photos", record.count());
    Ok(record.count())
}

/// Push one reference, logging progress. Breaks when the record is full.
fn index<const N: usize>(record: &mut PlaylistRecord<N>, reference: PhotoReference) -> ControlFlow<()> {
    let count = record.count();
    if count.checked_rem(PROGRESS_EVERY) == Some(0) {
        debug!("Scanning file {}", count);
    }
    if record.push(reference).is_err() || record.is_full() {
        info!("Max photo count of {} reached. Stopping scan.", N);
        return ControlFlow::Break(());
    }
    ControlFlow::Continue(())
}

async fn scan_flat<S: Storage, const N: usize>(
    storage: &mut S,
    photo_dir: &str,
    record: &mut PlaylistRecord<N>,
) -> Result<(), S::Error> {
    if record.is_full() {
        return Ok(());
    }
    storage
        .read_dir(photo_dir, |entry| match classify_file(entry) {
            Ok(()) => index(record, PhotoReference::Flat(entry.locator)),
            Err(skip) => {
                debug!("Skipping {}: {}", entry.name.as_str(), skip_label(skip));
                ControlFlow::Continue(())
            }
        })
        .await
}

async fn scan_nested<S: Storage, const N: usize>(
    storage: &mut S,
    photo_dir: &str,
    record: &mut PlaylistRecord<N>,
) -> Result<(), S::Error> {
    let mut subdirs: Vec<(u16, String<NAME_MAX>), MAX_SUBDIRS> = Vec::new();
    storage
        .read_dir(photo_dir, |entry| {
            if !entry.is_dir || entry.is_hidden {
                return ControlFlow::Continue(());
            }
            if subdirs.push((entry.locator, entry.name.clone())).is_err() {
                warn!("More than {} photo folders, ignoring the rest", MAX_SUBDIRS);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })
        .await?;

    for (dir_locator, name) in &subdirs {
        if record.is_full() {
            break;
        }
        let Some(path) = join_path(photo_dir, name) else {
            warn!("Folder path too long, skipping {}", name.as_str());
            continue;
        };
        let dir = *dir_locator;
        storage
            .read_dir(&path, |entry| match classify_file(entry) {
                Ok(()) => index(record, PhotoReference::Nested { dir, file: entry.locator }),
                Err(skip) => {
                    debug!("Skipping {}: {}", entry.name.as_str(), skip_label(skip));
                    ControlFlow::Continue(())
                }
            })
            .await?;
    }
    Ok(())
}

fn skip_label(skip: Skip) -> &'static str {
    match skip {
        Skip::WrongLevel => "directory",
        Skip::Hidden => "hidden",
    }
}
