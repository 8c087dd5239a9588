//! Playlist persistence: crash safety, round trips and pass boundaries.
//!
//! Crash points are simulated by injecting a storage failure at the step
//! where power would be lost, then loading from the same card with a fresh
//! store, the way the next wake cycle would.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use platform::mocks::{FixedEntropy, MemoryStorage, StorageOp};
use platform::storage_local::LocalFileStorage;
use playlist::record::MAGIC_FLAT;
use playlist::{
    Advance, Layout, LoadOutcome, PersistStep, PlaylistConfig, PlaylistError, PlaylistRecord,
    RebuildBoundary, SmallPlaylist,
};
use tempfile::TempDir;

fn card_with_photos(n: usize) -> MemoryStorage {
    let mut fs = MemoryStorage::new();
    fs.add_dir("/photos");
    for i in 0..n {
        fs.add_file(&format!("/photos/img{i:02}.raw"), &[0x11; 8]);
    }
    fs
}

async fn fresh_store(fs: &mut MemoryStorage, config: PlaylistConfig) -> SmallPlaylist {
    let mut store = SmallPlaylist::new(config);
    store.load_or_rebuild(fs, &mut FixedEntropy(0xC0FFEE)).await.expect("initial load");
    store
}

// ---------------------------------------------------------------------------
// Crash safety
// ---------------------------------------------------------------------------

#[tokio::test]
async fn crash_before_remove_keeps_previous_record() {
    let mut fs = card_with_photos(6);
    let mut store = fresh_store(&mut fs, PlaylistConfig::default()).await;
    let before = fs.contents("/config.bin").unwrap();

    fs.fail(StorageOp::Remove, 1);
    let err = store.advance(&mut fs, &mut FixedEntropy(1)).await.unwrap_err();
    assert!(matches!(err, PlaylistError::Persist { step: PersistStep::Remove, .. }));

    assert_eq!(fs.contents("/config.bin").unwrap(), before, "canonical record must be untouched");

    let mut next = SmallPlaylist::new(PlaylistConfig::default());
    let outcome = next.load_or_rebuild(&mut fs, &mut FixedEntropy(1)).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded);
    assert_eq!(next.record().cursor(), 0);
}

#[tokio::test]
async fn crash_between_remove_and_rename_is_recovered() {
    let mut fs = card_with_photos(6);
    let mut store = fresh_store(&mut fs, PlaylistConfig::default()).await;

    fs.fail(StorageOp::Rename, 1);
    let err = store.advance(&mut fs, &mut FixedEntropy(1)).await.unwrap_err();
    assert!(matches!(err, PlaylistError::Persist { step: PersistStep::Rename, .. }));
    assert!(!fs.contains("/config.bin"));
    assert!(fs.contains("/config.tmp"));

    let mut next = SmallPlaylist::new(PlaylistConfig::default());
    let outcome = next.load_or_rebuild(&mut fs, &mut FixedEntropy(1)).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Recovered);
    assert_eq!(next.record().cursor(), 1);
    assert_eq!(next.record().entries(), store.record().entries());
    assert!(fs.contains("/config.bin"));
    assert!(!fs.contains("/config.tmp"));
}

#[tokio::test]
async fn half_written_temp_is_ignored() {
    let mut fs = card_with_photos(4);
    let mut store = fresh_store(&mut fs, PlaylistConfig::default()).await;
    let order = store.record().entries().to_vec();

    fs.limit_writes(30);
    let err = store.advance(&mut fs, &mut FixedEntropy(1)).await.unwrap_err();
    assert!(matches!(err, PlaylistError::StorageFull));

    let mut next = SmallPlaylist::new(PlaylistConfig::default());
    let outcome = next.load_or_rebuild(&mut fs, &mut FixedEntropy(1)).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded);
    assert_eq!(next.record().entries(), order.as_slice());
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn persist_then_load_is_exact() {
    for photos in [0usize, 1, 2, 7, 64] {
        let mut fs = card_with_photos(photos);
        let config = PlaylistConfig { boundary: RebuildBoundary::Last, ..PlaylistConfig::default() };
        let mut store = fresh_store(&mut fs, config.clone()).await;
        for _ in 0..photos / 2 {
            store.advance(&mut fs, &mut FixedEntropy(4)).await.unwrap();
        }

        let mut reloaded = SmallPlaylist::new(config);
        let outcome = reloaded.load_or_rebuild(&mut fs, &mut FixedEntropy(99)).await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded, "{photos} photos");
        assert_eq!(reloaded.record(), store.record(), "{photos} photos");
    }
}

#[tokio::test]
async fn capacity_change_forces_rebuild() {
    let mut fs = card_with_photos(3);
    let _ = fresh_store(&mut fs, PlaylistConfig::default()).await;

    let mut bigger = playlist::PlaylistStore::<128>::new(PlaylistConfig::default());
    let outcome = bigger.load_or_rebuild(&mut fs, &mut FixedEntropy(2)).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Rebuilt);
    assert_eq!(bigger.record().count(), 3);
    assert_eq!(
        fs.contents("/config.bin").unwrap().len(),
        PlaylistRecord::<128>::encoded_len(Layout::Flat)
    );
}

#[tokio::test]
async fn layout_change_forces_rebuild() {
    let mut fs = card_with_photos(3);
    fs.add_file("/photos/album/x.raw", b"");
    let _ = fresh_store(&mut fs, PlaylistConfig::default()).await;

    let nested = PlaylistConfig { layout: Layout::Nested, ..PlaylistConfig::default() };
    let mut store = SmallPlaylist::new(nested);
    let outcome = store.load_or_rebuild(&mut fs, &mut FixedEntropy(2)).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Rebuilt);
    assert_eq!(store.record().count(), 1);
}

// ---------------------------------------------------------------------------
// Pass boundaries
// ---------------------------------------------------------------------------

async fn count_rebuilds(boundary: RebuildBoundary, photos: usize, steps: usize) -> (usize, Vec<u16>) {
    let mut fs = card_with_photos(photos);
    let config = PlaylistConfig { boundary, ..PlaylistConfig::default() };
    let mut store = fresh_store(&mut fs, config).await;
    let mut rebuilds = 0;
    let mut shown = vec![store.record().cursor()];
    for step in 0..steps {
        match store.advance(&mut fs, &mut FixedEntropy(step as u32)).await.unwrap() {
            Advance::Next(i) => shown.push(i),
            Advance::Rebuilt(n) => {
                assert_eq!(usize::from(n), photos);
                assert_eq!(store.record().cursor(), 0);
                rebuilds += 1;
                shown.push(0);
            }
        }
    }
    (rebuilds, shown)
}

#[tokio::test]
async fn second_to_last_boundary_skips_the_last_photo() {
    let (rebuilds, shown) = count_rebuilds(RebuildBoundary::SecondToLast, 5, 12).await;
    assert_eq!(rebuilds, 3);
    assert_eq!(&shown[..9], &[0, 1, 2, 3, 0, 1, 2, 3, 0]);
    assert!(!shown.contains(&4));
}

#[tokio::test]
async fn last_boundary_shows_every_photo() {
    let (rebuilds, shown) = count_rebuilds(RebuildBoundary::Last, 5, 10).await;
    assert_eq!(rebuilds, 2);
    assert_eq!(&shown[..6], &[0, 1, 2, 3, 4, 0]);
}

#[tokio::test]
async fn tiny_playlists_rebuild_every_time() {
    let (rebuilds, _) = count_rebuilds(RebuildBoundary::SecondToLast, 1, 3).await;
    assert_eq!(rebuilds, 3);
    let (rebuilds, _) = count_rebuilds(RebuildBoundary::SecondToLast, 0, 2).await;
    assert_eq!(rebuilds, 2);
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wrong_magic_rebuilds_three_visible_photos() {
    let mut fs = MemoryStorage::new();
    fs.add_file("/photos/a.raw", b"1")
        .add_file("/photos/b.raw", b"2")
        .add_file("/photos/c.raw", b"3")
        .add_hidden_file("/photos/d.raw", b"4")
        .add_file("/config.bin", &[0xAB; 200]);

    let mut store = SmallPlaylist::new(PlaylistConfig::default());
    let outcome = store.load_or_rebuild(&mut fs, &mut FixedEntropy(17)).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Rebuilt);
    assert_eq!(store.record().count(), 3);
    assert_eq!(store.record().cursor(), 0);
    let stored = fs.contents("/config.bin").unwrap();
    assert_eq!(&stored[..20], MAGIC_FLAT);
}

#[tokio::test]
async fn local_card_round_trip() {
    let tmp = TempDir::new().unwrap();
    let photos = tmp.path().join("photos");
    std::fs::create_dir(&photos).unwrap();
    for name in ["a.raw", "b.raw", "c.raw", ".d.raw"] {
        std::fs::write(photos.join(name), [0x11u8; 4]).unwrap();
    }
    std::fs::write(tmp.path().join("config.bin"), b"not a playlist").unwrap();

    let mut card = LocalFileStorage::new(tmp.path());
    let mut store = SmallPlaylist::new(PlaylistConfig::default());
    let outcome = store.load_or_rebuild(&mut card, &mut FixedEntropy(5)).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Rebuilt);
    assert_eq!(store.record().count(), 3);
    assert!(!tmp.path().join("config.tmp").exists());

    store.advance(&mut card, &mut FixedEntropy(5)).await.unwrap();
    let path = store.current_path(&mut card).await.unwrap();
    assert!(path.as_str().starts_with("/photos/"));
    assert!(!path.as_str().contains("/."));

    let mut card = LocalFileStorage::new(tmp.path());
    let mut reloaded = SmallPlaylist::new(PlaylistConfig::default());
    assert_eq!(
        reloaded.load_or_rebuild(&mut card, &mut FixedEntropy(0)).await.unwrap(),
        LoadOutcome::Loaded
    );
    assert_eq!(reloaded.record(), store.record());
}
