//! Persistent shuffled playlist - directory scan, shuffle, durable cursor.
//!
//! The frame forgets everything between wakes, so the playlist lives on the
//! memory card as a fixed-layout record and is rebuilt whenever that record
//! is missing or unreadable.
//!
//! # Modules
//!
//! - [`reference`] - `PhotoReference` locators and the `Layout` they follow
//! - [`record`] - `PlaylistRecord<N>` and its streaming binary codec
//! - [`scanner`] - directory walk that fills a record
//! - [`shuffle`] - seeded in-place permutation
//! - [`store`] - `PlaylistStore<N>`: load, advance, crash-safe persist

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

pub mod config;
pub mod reference;
pub mod record;
pub mod scanner;
pub mod shuffle;
pub mod store;

// Top-level re-exports for convenience
pub use config::{PlaylistConfig, RebuildBoundary};
pub use record::{PlaylistRecord, RecordError};
pub use reference::{Layout, PhotoReference};
pub use shuffle::shuffle;
pub use store::{
    Advance, FullPlaylist, LoadOutcome, PersistStep, PlaylistError, PlaylistStore, SmallPlaylist,
    MAX_PHOTOS,
};
