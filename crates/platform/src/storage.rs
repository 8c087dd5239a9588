//! Storage abstraction for the memory-card filesystem.
//!
//! The filesystem driver itself is platform-provided; this module describes
//! the narrow capability set the photo frame consumes: open, read, write,
//! truncate (via [`Storage::create_file`]), rename, remove, and directory
//! iteration. Every call reports success or failure on its own; partial
//! writes are visible only through the returned byte count.

use core::fmt::Write as _;
use core::ops::ControlFlow;

use heapless::String;

/// Maximum length of a path handled by the storage layer.
pub const PATH_MAX: usize = 128;

/// Maximum length of a single directory-entry name.
pub const NAME_MAX: usize = 64;

/// A bounded path string.
pub type StoragePath = String<PATH_MAX>;

/// Storage trait for file system access
pub trait Storage {
    /// Error type
    type Error: core::fmt::Debug;
    /// File type
    type File: File<Error = Self::Error>;

    /// Bring the card and filesystem up.
    ///
    /// Called before any other operation; may be retried by the caller.
    fn mount(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Open an existing file for reading.
    fn open_file(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<Self::File, Self::Error>>;

    /// Create `path` for writing, truncating it to zero length if it exists.
    fn create_file(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<Self::File, Self::Error>>;

    /// Check if path exists
    fn exists(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<bool, Self::Error>>;

    /// Remove a file.
    fn remove(&mut self, path: &str)
        -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Rename `from` to `to`. `to` must not exist.
    fn rename(
        &mut self,
        from: &str,
        to: &str,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Visit the entries of directory `path` in stable order.
    ///
    /// The visitor returns [`ControlFlow::Break`] to stop the iteration early.
    /// Fails if `path` does not exist or is not a directory.
    fn read_dir<F>(
        &mut self,
        path: &str,
        visit: F,
    ) -> impl core::future::Future<Output = Result<(), Self::Error>>
    where
        F: FnMut(&DirEntry) -> ControlFlow<()>;

    /// Look up the entry of directory `dir` whose locator is `locator`.
    ///
    /// Returns `Ok(None)` when that slot is empty, which is what a deleted
    /// file leaves behind.
    fn entry_at(
        &mut self,
        dir: &str,
        locator: u16,
    ) -> impl core::future::Future<Output = Result<Option<DirEntry>, Self::Error>>;
}

/// File trait for reading and writing files
pub trait File {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read from current position
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>>;

    /// Write at current position, returning the number of bytes accepted.
    fn write(
        &mut self,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>>;

    /// Force written data to durable storage.
    fn flush(&mut self) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Seek to position
    fn seek(&mut self, pos: u64) -> impl core::future::Future<Output = Result<u64, Self::Error>>;

    /// Get file size
    fn size(&self) -> u64;
}

/// One entry produced by [`Storage::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Directory slot of this entry (the FAT directory index on hardware).
    /// It reopens the entry without its full path and does not change when
    /// siblings are added or removed.
    pub locator: u16,
    /// Entry name, truncated to [`NAME_MAX`] bytes.
    pub name: String<NAME_MAX>,
    /// `true` for sub-directories.
    pub is_dir: bool,
    /// `true` when the filesystem marks the entry hidden.
    pub is_hidden: bool,
}

impl DirEntry {
    /// Build an entry, truncating `name` at a character boundary if needed.
    pub fn new(locator: u16, name: &str, is_dir: bool, is_hidden: bool) -> Self {
        let mut buf = String::new();
        for c in name.chars() {
            if buf.push(c).is_err() {
                break;
            }
        }
        Self { locator, name: buf, is_dir, is_hidden }
    }
}

/// Join `dir` and `name` with exactly one `/` between them.
///
/// Returns `None` if the result does not fit in [`PATH_MAX`].
pub fn join_path(dir: &str, name: &str) -> Option<StoragePath> {
    let mut path = StoragePath::new();
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    write!(path, "{dir}/{name}").ok()?;
    Some(path)
}

/// Read until `buf` is full or the file is exhausted.
///
/// Returns the number of bytes read; a value below `buf.len()` means EOF.
pub async fn read_full<F: File>(file: &mut F, buf: &mut [u8]) -> Result<usize, F::Error> {
    let mut filled = 0usize;
    while let Some(rest) = buf.get_mut(filled..) {
        if rest.is_empty() {
            break;
        }
        let n = file.read(rest).await?;
        if n == 0 {
            break;
        }
        filled = filled.saturating_add(n);
    }
    Ok(filled)
}

/// Write all of `data`, looping over short writes.
///
/// Returns `Ok(false)` if the file stops accepting bytes before `data` is
/// exhausted (card full).
pub async fn write_all<F: File>(file: &mut F, data: &[u8]) -> Result<bool, F::Error> {
    let mut written = 0usize;
    while let Some(rest) = data.get(written..) {
        if rest.is_empty() {
            return Ok(true);
        }
        let n = file.write(rest).await?;
        if n == 0 {
            return Ok(false);
        }
        written = written.saturating_add(n);
    }
    Ok(true)
}
