//! Local filesystem Storage implementation for the simulator and tools.
//!
//! `LocalFileStorage` implements `platform::Storage` using `std::fs`.
//! Used when the `std` feature is enabled (host builds only).
//! All paths are resolved relative to the `card_root` provided at construction,
//! which stands in for the root of the memory card.
//!
//! Host filesystems have no directory slots, so each listed directory keeps
//! a hidden [`SLOT_TABLE`] file that plays the part of the FAT directory:
//! one name per line, a blank line for a free slot. New names take the
//! lowest free slot (in name order when several arrive at once) and a
//! vanished name leaves a blank, so locators behave like FAT directory
//! indices. Names starting with `.` count as hidden.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::storage::{DirEntry, File, Storage};

/// Name of the per-directory slot table. Never listed.
pub const SLOT_TABLE: &str = ".slots";

/// Error type for local filesystem operations.
#[derive(Debug, thiserror::Error)]
#[error("local storage error: {0}")]
pub struct LocalStorageError(#[from] pub std::io::Error);

/// An open file on the local filesystem.
pub struct LocalFile {
    inner: fs::File,
    size: u64,
}

impl File for LocalFile {
    type Error = LocalStorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(Read::read(&mut self.inner, buf)?)
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        let n = Write::write(&mut self.inner, data)?;
        let pos = self.inner.stream_position()?;
        self.size = self.size.max(pos);
        Ok(n)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.inner.flush()?;
        Ok(self.inner.sync_all()?)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        Ok(Seek::seek(&mut self.inner, SeekFrom::Start(pos))?)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// A `platform::Storage` implementation backed by `std::fs`.
///
/// # Example
/// ```no_run
/// # async fn example() {
/// use platform::storage_local::LocalFileStorage;
/// use platform::Storage;
/// let mut storage = LocalFileStorage::new("/media/card");
/// storage.mount().await.unwrap();
/// let file = storage.open_file("/config.bin").await.unwrap();
/// # }
/// ```
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Create a new storage rooted at `card_root`.
    #[must_use]
    pub fn new(card_root: impl AsRef<Path>) -> Self {
        Self { root: card_root.as_ref().to_path_buf() }
    }

    /// Create from the `CARD_PATH` environment variable.
    ///
    /// Returns `None` if `CARD_PATH` is not set or is not valid UTF-8.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var("CARD_PATH").ok().map(Self::new)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// Listing of `path` in slot order; the slot is the locator.
    fn listing(&self, path: &str) -> Result<Vec<DirEntry>, LocalStorageError> {
        let dir = self.resolve(path);
        let present: BTreeMap<String, bool> = fs::read_dir(&dir)?
            .map(|entry| {
                let entry = entry?;
                let is_dir = entry.file_type()?.is_dir();
                Ok((entry.file_name().to_string_lossy().into_owned(), is_dir))
            })
            .filter(|item| !matches!(item, Ok((name, _)) if name == SLOT_TABLE || name.contains('\n')))
            .collect::<Result<_, std::io::Error>>()?;

        let table_path = dir.join(SLOT_TABLE);
        let stored = match fs::read_to_string(&table_path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let slots = assign_slots(&stored, &present);
        let updated = render_slots(&slots);
        if updated != stored {
            if let Err(e) = fs::write(&table_path, &updated) {
                crate::warn!("Could not update slot table of {}: {}", path, e);
            }
        }

        Ok(slots
            .iter()
            .zip(0..=u16::MAX)
            .filter_map(|(slot, locator)| {
                let name = slot.as_deref()?;
                let is_dir = present.get(name).copied()?;
                Some(DirEntry::new(locator, name, is_dir, name.starts_with('.')))
            })
            .collect())
    }
}

/// Carry the slots of `stored` over to the names in `present`: vanished
/// names free their slot, new names take the lowest free one.
fn assign_slots(stored: &str, present: &BTreeMap<String, bool>) -> Vec<Option<String>> {
    let mut seen = BTreeSet::new();
    let mut slots: Vec<Option<String>> = stored
        .lines()
        .map(|line| {
            (present.contains_key(line) && seen.insert(line)).then(|| line.to_owned())
        })
        .collect();
    let mut free = 0;
    for name in present.keys().filter(|name| !seen.contains(name.as_str())) {
        while slots.get(free).is_some_and(Option::is_some) {
            free = free.saturating_add(1);
        }
        match slots.get_mut(free) {
            Some(slot) => *slot = Some(name.clone()),
            None => slots.push(Some(name.clone())),
        }
    }
    while matches!(slots.last(), Some(None)) {
        slots.pop();
    }
    slots
}

fn render_slots(slots: &[Option<String>]) -> String {
    let mut text = String::new();
    for slot in slots {
        text.push_str(slot.as_deref().unwrap_or(""));
        text.push('\n');
    }
    text
}

impl Storage for LocalFileStorage {
    type Error = LocalStorageError;
    type File = LocalFile;

    async fn mount(&mut self) -> Result<(), Self::Error> {
        if fs::metadata(&self.root)?.is_dir() {
            Ok(())
        } else {
            Err(std::io::Error::new(ErrorKind::NotADirectory, "card root is not a directory").into())
        }
    }

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        let file = fs::File::open(self.resolve(path))?;
        let meta = file.metadata()?;
        if meta.is_dir() {
            return Err(std::io::Error::new(ErrorKind::IsADirectory, path.to_owned()).into());
        }
        Ok(LocalFile { inner: file, size: meta.len() })
    }

    async fn create_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.resolve(path))?;
        Ok(LocalFile { inner: file, size: 0 })
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        Ok(self.resolve(path).exists())
    }

    async fn remove(&mut self, path: &str) -> Result<(), Self::Error> {
        Ok(fs::remove_file(self.resolve(path))?)
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error> {
        let to = self.resolve(to);
        if to.exists() {
            return Err(std::io::Error::new(ErrorKind::AlreadyExists, "rename target exists").into());
        }
        Ok(fs::rename(self.resolve(from), to)?)
    }

    async fn read_dir<F>(&mut self, path: &str, mut visit: F) -> Result<(), Self::Error>
    where
        F: FnMut(&DirEntry) -> ControlFlow<()>,
    {
        for entry in self.listing(path)? {
            if visit(&entry).is_break() {
                break;
            }
        }
        Ok(())
    }

    async fn entry_at(&mut self, dir: &str, locator: u16) -> Result<Option<DirEntry>, Self::Error> {
        Ok(self.listing(dir)?.into_iter().nth(usize::from(locator)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::storage::{read_full, write_all, File, Storage};
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn local_storage_read_full_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("test.bin"), b"hello world").unwrap();
        let mut storage = LocalFileStorage::new(tmp.path());
        let mut file = storage.open_file("/test.bin").await.unwrap();
        let mut buf = [0u8; 11];
        let n = read_full(&mut file, &mut buf).await.unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello world");
    }

    #[tokio::test]
    async fn local_storage_size_matches() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("size.bin"), [0u8; 64]).unwrap();
        let mut storage = LocalFileStorage::new(tmp.path());
        let file = storage.open_file("size.bin").await.unwrap();
        assert_eq!(file.size(), 64);
    }

    #[tokio::test]
    async fn local_storage_seek_and_read() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("seek.bin"), b"ABCDEFGH").unwrap();
        let mut storage = LocalFileStorage::new(tmp.path());
        let mut file = storage.open_file("seek.bin").await.unwrap();
        file.seek(4).await.unwrap();
        let mut buf = [0u8; 4];
        file.read(&mut buf).await.unwrap();
        assert_eq!(&buf, b"EFGH");
    }

    #[tokio::test]
    async fn create_truncates_existing_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("c.bin"), b"old contents").unwrap();
        let mut storage = LocalFileStorage::new(tmp.path());
        let mut file = storage.create_file("/c.bin").await.unwrap();
        assert!(write_all(&mut file, b"new").await.unwrap());
        file.flush().await.unwrap();
        assert_eq!(file.size(), 3);
        assert_eq!(fs::read(tmp.path().join("c.bin")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn rename_refuses_existing_target() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a"), b"a").unwrap();
        fs::write(tmp.path().join("b"), b"b").unwrap();
        let mut storage = LocalFileStorage::new(tmp.path());
        assert!(storage.rename("/a", "/b").await.is_err());
        storage.remove("/b").await.unwrap();
        storage.rename("/a", "/b").await.unwrap();
        assert_eq!(fs::read(tmp.path().join("b")).unwrap(), b"a");
        assert!(!storage.exists("/a").await.unwrap());
    }

    #[tokio::test]
    async fn fresh_directory_takes_slots_in_name_order() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("photos")).unwrap();
        fs::write(tmp.path().join("photos/b.raw"), b"b").unwrap();
        fs::write(tmp.path().join("photos/a.raw"), b"a").unwrap();
        fs::write(tmp.path().join("photos/.hidden"), b"h").unwrap();
        fs::create_dir(tmp.path().join("photos/sub")).unwrap();

        let mut storage = LocalFileStorage::new(tmp.path());
        let mut seen = Vec::new();
        storage
            .read_dir("/photos", |e| {
                seen.push(e.clone());
                ControlFlow::Continue(())
            })
            .await
            .unwrap();

        let names: Vec<_> = seen.iter().map(|e| e.name.as_str().to_owned()).collect();
        assert_eq!(names, [".hidden", "a.raw", "b.raw", "sub"]);
        assert!(seen[0].is_hidden);
        assert!(seen[3].is_dir);
        assert_eq!(seen[2].locator, 2);

        let e = storage.entry_at("/photos", 1).await.unwrap().unwrap();
        assert_eq!(e.name.as_str(), "a.raw");
        assert!(storage.entry_at("/photos", 9).await.unwrap().is_none());
    }

    async fn slots(storage: &mut LocalFileStorage, dir: &str) -> Vec<(u16, String)> {
        let mut out = Vec::new();
        storage
            .read_dir(dir, |e| {
                out.push((e.locator, e.name.as_str().to_owned()));
                ControlFlow::Continue(())
            })
            .await
            .unwrap();
        out
    }

    #[tokio::test]
    async fn deleted_file_leaves_a_gap_for_the_next_one() {
        let tmp = TempDir::new().unwrap();
        let photos = tmp.path().join("photos");
        fs::create_dir(&photos).unwrap();
        for name in ["a.raw", "b.raw", "c.raw"] {
            fs::write(photos.join(name), name).unwrap();
        }
        let mut storage = LocalFileStorage::new(tmp.path());
        assert_eq!(slots(&mut storage, "/photos").await.len(), 3);

        fs::remove_file(photos.join("a.raw")).unwrap();
        // A fresh instance sees the table left on the card.
        let mut storage = LocalFileStorage::new(tmp.path());
        assert_eq!(slots(&mut storage, "/photos").await, [(1, "b.raw".to_owned()), (2, "c.raw".to_owned())]);
        assert!(storage.entry_at("/photos", 0).await.unwrap().is_none());

        fs::write(photos.join("z.raw"), b"z").unwrap();
        let e = storage.entry_at("/photos", 0).await.unwrap().unwrap();
        assert_eq!(e.name.as_str(), "z.raw");
        assert_eq!(storage.entry_at("/photos", 2).await.unwrap().unwrap().name.as_str(), "c.raw");
    }

    #[test]
    fn slot_table_drops_vanished_names_and_duplicates() {
        let present: BTreeMap<String, bool> =
            [("b".to_owned(), false), ("d".to_owned(), false), ("new".to_owned(), true)].into();
        let slots = assign_slots("a\nb\nb\n\nd\ngone\n", &present);
        let name = |n: &str| Some(n.to_owned());
        assert_eq!(slots, [name("new"), name("b"), None, None, name("d")]);
        assert_eq!(render_slots(&slots), "new\nb\n\n\nd\n");
    }

    proptest! {
        #[test]
        fn removals_never_move_the_survivors(
            count in 1usize..40,
            removed in proptest::collection::vec(any::<bool>(), 40),
        ) {
            let names: Vec<String> = (0..count).map(|i| format!("{i:03}.raw")).collect();
            let all: BTreeMap<String, bool> = names.iter().map(|n| (n.clone(), false)).collect();
            let before = assign_slots("", &all);

            let kept: BTreeMap<String, bool> = names
                .iter()
                .zip(&removed)
                .filter(|(_, gone)| !**gone)
                .map(|(n, _)| (n.clone(), false))
                .collect();
            let after = assign_slots(&render_slots(&before), &kept);

            for (slot, name) in after.iter().enumerate() {
                if let Some(name) = name {
                    prop_assert_eq!(before[slot].as_deref(), Some(name.as_str()));
                }
            }
            prop_assert_eq!(after.iter().flatten().count(), kept.len());
        }
    }

    #[tokio::test]
    async fn read_dir_on_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let mut storage = LocalFileStorage::new(tmp.path());
        let res = storage.read_dir("/photos", |_| ControlFlow::Continue(())).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn mount_requires_directory_root() {
        let tmp = TempDir::new().unwrap();
        let mut ok = LocalFileStorage::new(tmp.path());
        ok.mount().await.unwrap();
        let mut missing = LocalFileStorage::new(tmp.path().join("nope"));
        assert!(missing.mount().await.is_err());
    }
}
