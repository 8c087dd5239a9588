//! Playlist store: load, rebuild, advance and crash-safe persistence.
//!
//! The canonical record is never edited in place. A new version is written
//! to `temp_path` and flushed. Then the old record is removed and the temp
//! file renamed over it. A power cut at any point leaves either the old
//! record or a complete temp record on the card, and [`PlaylistStore::load_or_rebuild`]
//! promotes the latter.

use platform::power::EntropySource;
use platform::storage::{join_path, write_all, File, Storage, StoragePath};
use platform::{debug, error, info, warn};

use crate::config::PlaylistConfig;
use crate::record::{PlaylistRecord, RecordDecoder, RecordError};
use crate::reference::PhotoReference;
use crate::scanner;
use crate::shuffle::shuffle;

/// Capacity of a full-size playlist; the largest count a `u16` trailer and
/// a signed 16-bit locator space can both express.
pub const MAX_PHOTOS: usize = 32767;

/// Playlist sized for the device. Large: keep it in a static.
pub type FullPlaylist = PlaylistStore<MAX_PHOTOS>;

/// Small playlist for tests and tools.
pub type SmallPlaylist = PlaylistStore<64>;

/// Bytes moved per read or write call while streaming the record.
const IO_CHUNK: usize = 512;

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// Stage of [`PlaylistStore::persist`] that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistStep {
    /// Creating (truncating) the temp record.
    Create,
    /// Writing the temp record.
    Write,
    /// Flushing the temp record.
    Flush,
    /// Removing the previous canonical record.
    Remove,
    /// Renaming the temp record to the canonical name.
    Rename,
    /// Reopening the canonical record.
    Reopen,
}

impl PersistStep {
    /// Short name for logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Write => "write",
            Self::Flush => "flush",
            Self::Remove => "remove",
            Self::Rename => "rename",
            Self::Reopen => "reopen",
        }
    }
}

/// Playlist store failure, generic over the storage error `E`.
#[derive(Debug, thiserror::Error)]
pub enum PlaylistError<E: core::fmt::Debug> {
    /// Opening or reading the record failed.
    #[error("storage error: {0:?}")]
    Storage(E),
    /// The photo directory could not be listed.
    #[error("cannot scan photo directory: {0:?}")]
    Scan(E),
    /// One step of the temp-then-rename write failed.
    #[error("persist failed at {step:?}: {cause:?}")]
    Persist {
        /// Step that failed.
        step: PersistStep,
        /// Underlying storage error.
        cause: E,
    },
    /// The card stopped accepting bytes.
    #[error("card full while writing the playlist")]
    StorageFull,
    /// A stored record was rejected.
    #[error("invalid record: {0}")]
    Invalid(RecordError),
    /// The reference under the cursor no longer names a file.
    #[error("photo reference no longer resolves")]
    StaleReference,
    /// Nothing to show.
    #[error("playlist is empty")]
    EmptyPlaylist,
    /// The resolved photo path exceeds the path limit.
    #[error("photo path too long")]
    PathTooLong,
}

impl<E: core::fmt::Debug> PlaylistError<E> {
    /// Short name for logs; usable with every log backend.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage",
            Self::Scan(_) => "scan",
            Self::Persist { step, .. } => step.label(),
            Self::StorageFull => "card full",
            Self::Invalid(_) => "invalid record",
            Self::StaleReference => "stale reference",
            Self::EmptyPlaylist => "empty playlist",
            Self::PathTooLong => "path too long",
        }
    }
}

fn failed_at<E: core::fmt::Debug>(step: PersistStep) -> impl FnOnce(E) -> PlaylistError<E> {
    move |cause| PlaylistError::Persist { step, cause }
}

/// How [`PlaylistStore::load_or_rebuild`] obtained the playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadOutcome {
    /// The canonical record was valid.
    Loaded,
    /// No usable record: the photo directory was rescanned and shuffled.
    Rebuilt,
    /// An interrupted persist was completed from the temp record.
    Recovered,
}

/// Result of [`PlaylistStore::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Advance {
    /// The cursor moved to this index.
    Next(u16),
    /// The pass ended; a fresh shuffle of this many photos starts at 0.
    Rebuilt(u16),
}

// ---------------------------------------------------------------------------
// PlaylistStore
// ---------------------------------------------------------------------------

/// Owned playlist context for one wake cycle.
pub struct PlaylistStore<const N: usize> {
    config: PlaylistConfig,
    record: PlaylistRecord<N>,
}

impl<const N: usize> PlaylistStore<N> {
    /// Empty store; call [`load_or_rebuild`](Self::load_or_rebuild) next.
    pub fn new(config: PlaylistConfig) -> Self {
        let record = PlaylistRecord::new(config.layout);
        Self { config, record }
    }

    /// Active configuration.
    pub fn config(&self) -> &PlaylistConfig {
        &self.config
    }

    /// In-memory record.
    pub fn record(&self) -> &PlaylistRecord<N> {
        &self.record
    }

    /// Load the canonical record, or recover or rebuild it.
    ///
    /// A missing or rejected record is not an error: the photo directory is
    /// rescanned, shuffled and persisted. Storage failures are returned.
    pub async fn load_or_rebuild<S: Storage, R: EntropySource>(
        &mut self,
        storage: &mut S,
        entropy: &mut R,
    ) -> Result<LoadOutcome, PlaylistError<S::Error>> {
        let layout = self.config.layout;
        let canonical = self.config.record_path.as_str();

        if storage.exists(canonical).await.map_err(PlaylistError::Storage)? {
            match read_record(storage, canonical, &mut self.record, layout).await {
                Ok(()) => {
                    info!(
                        "Loaded playlist: {} photos, next {}",
                        self.record.count(),
                        self.record.cursor()
                    );
                    return Ok(LoadOutcome::Loaded);
                }
                Err(PlaylistError::Invalid(e)) => warn!("Stored playlist rejected: {}", e),
                Err(e) => return Err(e),
            }
        } else {
            info!("No stored playlist at {}", canonical);
        }

        if self.recover(storage).await? {
            return Ok(LoadOutcome::Recovered);
        }
        self.rebuild(storage, entropy).await?;
        Ok(LoadOutcome::Rebuilt)
    }

    /// Promote a complete temp record left behind by an interrupted persist.
    async fn recover<S: Storage>(&mut self, storage: &mut S) -> Result<bool, PlaylistError<S::Error>> {
        let layout = self.config.layout;
        let temp = self.config.temp_path.as_str();
        let canonical = self.config.record_path.as_str();

        if !storage.exists(temp).await.map_err(PlaylistError::Storage)? {
            return Ok(false);
        }
        match read_record(storage, temp, &mut self.record, layout).await {
            Ok(()) => {}
            Err(PlaylistError::Invalid(e)) => {
                warn!("Leftover temp record rejected: {}", e);
                self.record.reset(layout);
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        if storage.exists(canonical).await.map_err(PlaylistError::Storage)? {
            storage.remove(canonical).await.map_err(failed_at(PersistStep::Remove))?;
        }
        storage.rename(temp, canonical).await.map_err(failed_at(PersistStep::Rename))?;
        info!("Recovered playlist from {}: {} photos", temp, self.record.count());
        Ok(true)
    }

    /// Rescan the photo directory, shuffle and persist. Cursor restarts at 0.
    pub async fn rebuild<S: Storage, R: EntropySource>(
        &mut self,
        storage: &mut S,
        entropy: &mut R,
    ) -> Result<u16, PlaylistError<S::Error>> {
        let count = scanner::build(
            storage,
            self.config.photo_dir.as_str(),
            self.config.layout,
            &mut self.record,
        )
        .await
        .map_err(PlaylistError::Scan)?;

        let seed = u64::from(entropy.sample());
        debug!("Shuffling {} photos", count);
        shuffle(self.record.entries_mut(), seed);
        self.persist(storage).await?;
        Ok(count)
    }

    /// Move to the next photo, or start a new shuffled pass at the boundary.
    ///
    /// The new state is persisted before returning.
    pub async fn advance<S: Storage, R: EntropySource>(
        &mut self,
        storage: &mut S,
        entropy: &mut R,
    ) -> Result<Advance, PlaylistError<S::Error>> {
        let cursor = self.record.cursor();
        let count = self.record.count();
        if self.config.boundary.must_rebuild(cursor, count) {
            info!("End of pass at {} of {}, reshuffling", cursor, count);
            let rebuilt = self.rebuild(storage, entropy).await?;
            return Ok(Advance::Rebuilt(rebuilt));
        }
        let next = cursor.saturating_add(1);
        if !self.record.set_cursor(next) {
            return Err(PlaylistError::Invalid(RecordError::Corrupt));
        }
        self.persist(storage).await?;
        debug!("Next photo index {}", next);
        Ok(Advance::Next(next))
    }

    /// Write the in-memory record with the temp-then-rename protocol.
    pub async fn persist<S: Storage>(&self, storage: &mut S) -> Result<(), PlaylistError<S::Error>> {
        let temp = self.config.temp_path.as_str();
        let canonical = self.config.record_path.as_str();

        {
            let mut file = storage.create_file(temp).await.map_err(failed_at(PersistStep::Create))?;
            let mut chunk = [0u8; IO_CHUNK];
            let mut offset = 0usize;
            loop {
                let n = self.record.encode_chunk(offset, &mut chunk);
                if n == 0 {
                    break;
                }
                let bytes = chunk.get(..n).unwrap_or(&[]);
                if !write_all(&mut file, bytes).await.map_err(failed_at(PersistStep::Write))? {
                    error!("Card full while writing {}", temp);
                    return Err(PlaylistError::StorageFull);
                }
                offset = offset.saturating_add(n);
            }
            file.flush().await.map_err(failed_at(PersistStep::Flush))?;
        }

        if storage.exists(canonical).await.map_err(PlaylistError::Storage)? {
            storage.remove(canonical).await.map_err(failed_at(PersistStep::Remove))?;
        }
        storage.rename(temp, canonical).await.map_err(failed_at(PersistStep::Rename))?;

        let file = storage.open_file(canonical).await.map_err(failed_at(PersistStep::Reopen))?;
        let expected = PlaylistRecord::<N>::encoded_len(self.record.layout());
        if file.size() != u64::try_from(expected).unwrap_or(u64::MAX) {
            return Err(PlaylistError::Invalid(RecordError::Truncated));
        }
        debug!("Playlist saved: {} photos, next {}", self.record.count(), self.record.cursor());
        Ok(())
    }

    /// Truncate the stored record so the next cycle rebuilds from scratch.
    ///
    /// Any temp record is removed afterwards so that it cannot be promoted.
    /// The canonical record is truncated even when that removal fails.
    pub async fn invalidate<S: Storage>(&mut self, storage: &mut S) -> Result<(), PlaylistError<S::Error>> {
        warn!("Invalidating stored playlist");
        self.record.reset(self.config.layout);
        {
            let mut file = storage
                .create_file(self.config.record_path.as_str())
                .await
                .map_err(PlaylistError::Storage)?;
            file.flush().await.map_err(PlaylistError::Storage)?;
        }
        let temp = self.config.temp_path.as_str();
        let removed = match storage.exists(temp).await {
            Ok(true) => storage.remove(temp).await,
            Ok(false) => Ok(()),
            Err(e) => Err(e),
        };
        removed.map_err(|e| {
            error!("Could not remove {}; it may be promoted on the next load", temp);
            PlaylistError::Storage(e)
        })
    }

    /// Full path of the photo under the cursor.
    pub async fn current_path<S: Storage>(
        &self,
        storage: &mut S,
    ) -> Result<StoragePath, PlaylistError<S::Error>> {
        let reference = self.record.current().ok_or(PlaylistError::EmptyPlaylist)?;
        let photo_dir = self.config.photo_dir.as_str();
        match reference {
            PhotoReference::Flat(locator) => resolve(storage, photo_dir, locator, false).await,
            PhotoReference::Nested { dir, file } => {
                let dir_path = resolve(storage, photo_dir, dir, true).await?;
                resolve(storage, &dir_path, file, false).await
            }
        }
    }

    /// Open the photo under the cursor for reading.
    pub async fn open_current<S: Storage>(&self, storage: &mut S) -> Result<S::File, PlaylistError<S::Error>> {
        let path = self.current_path(storage).await?;
        info!("Opening {}", path.as_str());
        storage.open_file(&path).await.map_err(PlaylistError::Storage)
    }
}

/// Path of entry `locator` in `dir`, which must be a directory iff `want_dir`.
async fn resolve<S: Storage>(
    storage: &mut S,
    dir: &str,
    locator: u16,
    want_dir: bool,
) -> Result<StoragePath, PlaylistError<S::Error>> {
    let entry = storage
        .entry_at(dir, locator)
        .await
        .map_err(PlaylistError::Storage)?
        .ok_or(PlaylistError::StaleReference)?;
    if entry.is_dir != want_dir {
        return Err(PlaylistError::StaleReference);
    }
    join_path(dir, &entry.name).ok_or(PlaylistError::PathTooLong)
}

/// Stream the record at `path` into `record`.
async fn read_record<S: Storage, const N: usize>(
    storage: &mut S,
    path: &str,
    record: &mut PlaylistRecord<N>,
    layout: crate::reference::Layout,
) -> Result<(), PlaylistError<S::Error>> {
    let mut file = storage.open_file(path).await.map_err(PlaylistError::Storage)?;
    let mut decoder = RecordDecoder::new(record, layout);
    let mut chunk = [0u8; IO_CHUNK];
    loop {
        let n = file.read(&mut chunk).await.map_err(PlaylistError::Storage)?;
        if n == 0 {
            break;
        }
        decoder
            .feed(chunk.get(..n).unwrap_or(&[]))
            .map_err(PlaylistError::Invalid)?;
    }
    decoder.finish().map_err(PlaylistError::Invalid)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::reference::Layout;
    use platform::mocks::{FixedEntropy, MemoryStorage, StorageOp};

    fn card(files: usize) -> MemoryStorage {
        let mut fs = MemoryStorage::new();
        fs.add_dir("/photos");
        for i in 0..files {
            fs.add_file(&std::format!("/photos/{i:03}.raw"), b"px");
        }
        fs
    }

    #[tokio::test]
    async fn cold_start_rebuilds_and_persists() {
        let mut fs = card(5);
        let mut store = SmallPlaylist::new(PlaylistConfig::default());
        let outcome = store.load_or_rebuild(&mut fs, &mut FixedEntropy(3)).await.unwrap();

        assert_eq!(outcome, LoadOutcome::Rebuilt);
        assert_eq!(store.record().count(), 5);
        assert_eq!(store.record().cursor(), 0);
        let bytes = fs.contents("/config.bin").unwrap();
        assert_eq!(bytes.len(), PlaylistRecord::<64>::encoded_len(Layout::Flat));
        assert!(!fs.contains("/config.tmp"));
    }

    #[tokio::test]
    async fn second_load_reads_the_record() {
        let mut fs = card(4);
        let mut first = SmallPlaylist::new(PlaylistConfig::default());
        first.load_or_rebuild(&mut fs, &mut FixedEntropy(9)).await.unwrap();
        first.advance(&mut fs, &mut FixedEntropy(9)).await.unwrap();

        let mut second = SmallPlaylist::new(PlaylistConfig::default());
        let outcome = second.load_or_rebuild(&mut fs, &mut FixedEntropy(1)).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(second.record(), first.record());
        assert_eq!(second.record().cursor(), 1);
    }

    #[tokio::test]
    async fn card_full_is_reported() {
        let mut fs = card(3);
        fs.limit_writes(10);
        let mut store = SmallPlaylist::new(PlaylistConfig::default());
        let err = store.load_or_rebuild(&mut fs, &mut FixedEntropy(0)).await.unwrap_err();
        assert!(matches!(err, PlaylistError::StorageFull));
        assert!(!fs.contains("/config.bin"));
    }

    #[tokio::test]
    async fn flush_failure_names_the_step() {
        let mut fs = card(3);
        fs.fail(StorageOp::Flush, 1);
        let mut store = SmallPlaylist::new(PlaylistConfig::default());
        let err = store.load_or_rebuild(&mut fs, &mut FixedEntropy(0)).await.unwrap_err();
        assert!(matches!(err, PlaylistError::Persist { step: PersistStep::Flush, .. }));
        assert_eq!(err.kind(), "flush");
    }

    #[tokio::test]
    async fn missing_photo_dir_is_a_scan_error() {
        let mut fs = MemoryStorage::new();
        let mut store = SmallPlaylist::new(PlaylistConfig::default());
        let err = store.load_or_rebuild(&mut fs, &mut FixedEntropy(0)).await.unwrap_err();
        assert!(matches!(err, PlaylistError::Scan(_)));
    }

    #[tokio::test]
    async fn invalidate_forces_rebuild_and_drops_temp() {
        let mut fs = card(3);
        let mut store = SmallPlaylist::new(PlaylistConfig::default());
        store.load_or_rebuild(&mut fs, &mut FixedEntropy(5)).await.unwrap();
        let stale = fs.contents("/config.bin").unwrap();
        fs.add_file("/config.tmp", &stale);

        store.invalidate(&mut fs).await.unwrap();
        assert!(store.record().is_empty());
        assert_eq!(fs.contents("/config.bin").unwrap(), std::vec::Vec::<u8>::new());
        assert!(!fs.contains("/config.tmp"));

        let mut next = SmallPlaylist::new(PlaylistConfig::default());
        let outcome = next.load_or_rebuild(&mut fs, &mut FixedEntropy(5)).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Rebuilt);
    }

    #[tokio::test]
    async fn current_path_resolves_flat_and_nested() {
        let mut fs = card(2);
        let mut store = SmallPlaylist::new(PlaylistConfig::default());
        store.load_or_rebuild(&mut fs, &mut FixedEntropy(2)).await.unwrap();
        let path = store.current_path(&mut fs).await.unwrap();
        assert!(path.as_str() == "/photos/000.raw" || path.as_str() == "/photos/001.raw");

        let mut fs = MemoryStorage::new();
        fs.add_file("/photos/trip/a.raw", b"");
        let config = PlaylistConfig { layout: Layout::Nested, ..PlaylistConfig::default() };
        let mut store = SmallPlaylist::new(config);
        store.load_or_rebuild(&mut fs, &mut FixedEntropy(2)).await.unwrap();
        assert_eq!(store.current_path(&mut fs).await.unwrap().as_str(), "/photos/trip/a.raw");
        assert!(store.open_current(&mut fs).await.is_ok());
    }

    #[tokio::test]
    async fn empty_playlist_has_no_current_photo() {
        let mut fs = card(0);
        let mut store = SmallPlaylist::new(PlaylistConfig::default());
        store.load_or_rebuild(&mut fs, &mut FixedEntropy(2)).await.unwrap();
        let err = store.current_path(&mut fs).await.unwrap_err();
        assert!(matches!(err, PlaylistError::EmptyPlaylist));
    }

    #[tokio::test]
    async fn invalidate_truncates_the_record_even_if_the_temp_survives() {
        let mut fs = card(3);
        let mut store = SmallPlaylist::new(PlaylistConfig::default());
        store.load_or_rebuild(&mut fs, &mut FixedEntropy(2)).await.unwrap();
        let saved = fs.contents("/config.bin").unwrap();
        fs.add_file("/config.tmp", &saved).fail(StorageOp::Remove, 1);

        assert!(store.invalidate(&mut fs).await.is_err());

        assert_eq!(fs.contents("/config.bin").unwrap(), std::vec::Vec::<u8>::new());
        assert!(store.record().is_empty());
    }

    #[tokio::test]
    async fn deleting_one_photo_leaves_the_other_references_alone() {
        let mut fs = MemoryStorage::new();
        fs.add_file("/photos/a.raw", b"a").add_file("/photos/b.raw", b"b").add_file("/photos/c.raw", b"c");
        let mut store = SmallPlaylist::new(PlaylistConfig::default());
        store.load_or_rebuild(&mut fs, &mut FixedEntropy(2)).await.unwrap();

        let mut before = std::vec::Vec::new();
        for i in 0..3u16 {
            assert!(store.record.set_cursor(i));
            before.push(store.current_path(&mut fs).await.unwrap());
        }
        fs.remove("/photos/a.raw").await.unwrap();

        for i in 0..3u16 {
            assert!(store.record.set_cursor(i));
            let now = store.current_path(&mut fs).await;
            if before[usize::from(i)].as_str() == "/photos/a.raw" {
                assert!(matches!(now, Err(PlaylistError::StaleReference)));
            } else {
                assert_eq!(now.unwrap(), before[usize::from(i)]);
            }
        }
    }

    #[tokio::test]
    async fn deleted_photo_is_stale() {
        let mut fs = MemoryStorage::new();
        fs.add_file("/photos/only.raw", b"");
        let mut store = SmallPlaylist::new(PlaylistConfig::default());
        store.load_or_rebuild(&mut fs, &mut FixedEntropy(2)).await.unwrap();
        fs.remove("/photos/only.raw").await.unwrap();
        let err = store.current_path(&mut fs).await.unwrap_err();
        assert!(matches!(err, PlaylistError::StaleReference));
    }
}
