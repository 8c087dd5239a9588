//! SD-card Storage on top of `embedded-sdmmc` (FAT16/FAT32).
//!
//! Paths are `/`-separated 8.3 names below the root of the first volume.
//! Directory locators are raw FAT directory slots: the 32-byte entry index
//! counted from the first block of the directory, deleted and long-name
//! slots included. Deleting a file empties its slot and leaves every other
//! locator as it was. A sub-directory always starts with its `.` entry, so
//! its first block is known; the root directory is measured from its first
//! live entry.
//!
//! FAT has no atomic rename, so [`Storage::rename`] copies and then deletes
//! the source. A power cut in between leaves both files; the playlist loader
//! promotes the complete temp copy when the canonical one is damaged.

use core::fmt::Write as _;
use core::ops::ControlFlow;

use embedded_sdmmc::{
    BlockDevice, Error as FsError, Mode, RawDirectory, RawFile, RawVolume, TimeSource, Timestamp,
    VolumeIdx, VolumeManager,
};
use heapless::String;

use crate::storage::{DirEntry, File, Storage, NAME_MAX};

/// Error type for SD-card storage operations.
pub type SdmmcError<D> = FsError<<D as BlockDevice>::Error>;

const COPY_CHUNK: usize = 512;

/// Directory entries per 512-byte block.
const SLOTS_PER_BLOCK: u32 = 16;

/// Size of one FAT directory entry.
const SLOT_BYTES: u32 = 32;

/// Slot index of an entry at `offset` within `block`, counted from `first`.
///
/// `None` for an entry stored before `first` (a directory whose clusters are
/// not in ascending order) or beyond the reach of a `u16`.
fn slot_index(first: u32, block: u32, offset: u32) -> Option<u16> {
    let blocks = block.checked_sub(first)?;
    let slot = blocks.checked_mul(SLOTS_PER_BLOCK)?.checked_add(offset.checked_div(SLOT_BYTES)?)?;
    u16::try_from(slot).ok()
}

/// The frame has no real-time clock; every file gets the same timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTimeSource;

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 54,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

/// An open file on the card. Closed on drop.
pub struct SdmmcFile<'a, D: BlockDevice, T: TimeSource> {
    volumes: &'a VolumeManager<D, T>,
    raw: RawFile,
}

impl<D: BlockDevice, T: TimeSource> Drop for SdmmcFile<'_, D, T> {
    fn drop(&mut self) {
        let _ = self.volumes.close_file(self.raw);
    }
}

impl<D: BlockDevice, T: TimeSource> File for SdmmcFile<'_, D, T> {
    type Error = SdmmcError<D>;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.volumes.read(self.raw, buf)
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        match self.volumes.write(self.raw, data) {
            Ok(()) => Ok(data.len()),
            Err(FsError::NotEnoughSpace) => Ok(0),
            Err(e) => Err(e),
        }
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.volumes.flush_file(self.raw)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        let offset = u32::try_from(pos).map_err(|_| FsError::InvalidOffset)?;
        self.volumes.file_seek_from_start(self.raw, offset)?;
        Ok(pos)
    }

    fn size(&self) -> u64 {
        self.volumes.file_length(self.raw).map(u64::from).unwrap_or(0)
    }
}

/// SD-card backed [`Storage`].
///
/// Borrow the [`VolumeManager`] from a `static` so that files can outlive
/// the call that opened them.
pub struct SdmmcStorage<'a, D: BlockDevice, T: TimeSource> {
    volumes: &'a VolumeManager<D, T>,
    volume: Option<RawVolume>,
}

impl<'a, D: BlockDevice, T: TimeSource> SdmmcStorage<'a, D, T> {
    /// Wrap a volume manager; nothing touches the card until [`Storage::mount`].
    pub fn new(volumes: &'a VolumeManager<D, T>) -> Self {
        Self { volumes, volume: None }
    }

    /// Run `f` on the opened directory `path`, closing every handle after.
    fn with_dir<R>(
        &self,
        path: &str,
        f: impl FnOnce(RawDirectory) -> Result<R, SdmmcError<D>>,
    ) -> Result<R, SdmmcError<D>> {
        let volume = self.volume.ok_or(FsError::NoSuchVolume)?;
        let mut dir = self.volumes.open_root_dir(volume)?;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            let next = self.volumes.open_dir(dir, part);
            let _ = self.volumes.close_dir(dir);
            dir = next?;
        }
        let result = f(dir);
        let _ = self.volumes.close_dir(dir);
        result
    }

    fn open(&self, path: &str, mode: Mode) -> Result<SdmmcFile<'a, D, T>, SdmmcError<D>> {
        let (parent, name) = split_parent(path);
        let raw = self.with_dir(parent, |dir| self.volumes.open_file_in_dir(dir, name, mode))?;
        Ok(SdmmcFile { volumes: self.volumes, raw })
    }

    /// Visit the listed entries of `path` with their locators.
    fn listing(
        &self,
        path: &str,
        mut visit: impl FnMut(DirEntry) -> ControlFlow<()>,
    ) -> Result<(), SdmmcError<D>> {
        self.with_dir(path, |dir| {
            let mut first_block: Option<u32> = None;
            let mut done = false;
            self.volumes.iterate_dir(dir, |raw| {
                let first = *first_block.get_or_insert(raw.entry_block.0);
                if done || raw.attributes.is_volume() || raw.attributes.is_lfn() {
                    return;
                }
                let base = raw.name.base_name();
                if base == b"." || base == b".." {
                    return;
                }
                let mut name: String<NAME_MAX> = String::new();
                let _ = write!(name, "{}", raw.name);
                let Some(locator) = slot_index(first, raw.entry_block.0, raw.entry_offset) else {
                    crate::warn!("No locator for {} in {}, skipping it", name.as_str(), path);
                    return;
                };
                let entry = DirEntry::new(
                    locator,
                    &name,
                    raw.attributes.is_directory(),
                    raw.attributes.is_hidden(),
                );
                done = visit(entry).is_break();
            })
        })
    }
}

/// Split `/a/b/c.raw` into (`/a/b`, `c.raw`).
fn split_parent(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", trimmed),
    }
}

impl<'a, D: BlockDevice, T: TimeSource> Storage for SdmmcStorage<'a, D, T> {
    type Error = SdmmcError<D>;
    type File = SdmmcFile<'a, D, T>;

    async fn mount(&mut self) -> Result<(), Self::Error> {
        if self.volume.is_none() {
            self.volume = Some(self.volumes.open_raw_volume(VolumeIdx(0))?);
        }
        Ok(())
    }

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        self.open(path, Mode::ReadOnly)
    }

    async fn create_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        self.open(path, Mode::ReadWriteCreateOrTruncate)
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        let (parent, name) = split_parent(path);
        if name.is_empty() {
            return Ok(true);
        }
        match self.with_dir(parent, |dir| self.volumes.find_directory_entry(dir, name)) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn remove(&mut self, path: &str) -> Result<(), Self::Error> {
        let (parent, name) = split_parent(path);
        self.with_dir(parent, |dir| self.volumes.delete_file_in_dir(dir, name))
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error> {
        if self.exists(to).await? {
            return Err(FsError::FileAlreadyExists);
        }
        {
            let source = self.open(from, Mode::ReadOnly)?;
            let target = self.open(to, Mode::ReadWriteCreate)?;
            let mut chunk = [0u8; COPY_CHUNK];
            loop {
                let n = self.volumes.read(source.raw, &mut chunk)?;
                if n == 0 {
                    break;
                }
                self.volumes.write(target.raw, chunk.get(..n).unwrap_or(&[]))?;
            }
            self.volumes.flush_file(target.raw)?;
        }
        self.remove(from).await
    }

    async fn read_dir<F>(&mut self, path: &str, mut visit: F) -> Result<(), Self::Error>
    where
        F: FnMut(&DirEntry) -> ControlFlow<()>,
    {
        self.listing(path, |entry| visit(&entry))
    }

    async fn entry_at(&mut self, dir: &str, locator: u16) -> Result<Option<DirEntry>, Self::Error> {
        let mut found = None;
        self.listing(dir, |entry| {
            if entry.locator == locator {
                found = Some(entry);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_index_counts_entries_from_the_first_block() {
        assert_eq!(slot_index(100, 100, 0), Some(0));
        assert_eq!(slot_index(100, 100, 64), Some(2));
        assert_eq!(slot_index(100, 102, 32), Some(33));
        assert_eq!(slot_index(100, 99, 0), None);
        assert_eq!(slot_index(0, 4096, 0), None);
    }

    #[test]
    fn split_parent_handles_root_and_nested() {
        assert_eq!(split_parent("/config.bin"), ("", "config.bin"));
        assert_eq!(split_parent("/photos/2023/a.raw"), ("/photos/2023", "a.raw"));
        assert_eq!(split_parent("/photos/"), ("", "photos"));
        assert_eq!(split_parent("/"), ("", ""));
    }
}
