//! Hardware Abstraction Layer (HAL) for the e-paper photo frame
//!
//! This crate provides trait-based abstractions for every collaborator the
//! frame consumes, enabling development and testing without the board.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (firmware crate: wake cycle, renderer, panel driver)
//!         ↓
//! Feature Layers (playlist)
//!         ↓
//! Platform HAL (this crate - trait abstractions)
//!         ↓
//! Board support (SD/FAT driver, SPI, GPIO, sleep controller)
//! ```
//!
//! # Collaborators
//!
//! - [`Storage`] / [`File`] - memory-card filesystem
//! - [`PanelBus`] - e-paper command/data transport
//! - [`ExternalRam`] - serial PSRAM holding the frame buffer ([`SpiSram`])
//! - [`PowerMonitor`], [`SleepScheduler`], [`EntropySource`] - power and wake
//!
//! # Features
//!
//! - `std`: host implementations ([`storage_local`], [`mocks`])
//! - `hardware`: physical hardware build ([`storage_sdmmc`] via `sdmmc`)
//! - `defmt`: defmt derives and log output
//! - `tracing`: log output through `tracing`

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::doc_markdown)] // register and chip names in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // single-threaded executor, Send bounds not needed

pub mod config;
pub mod external_ram;
pub mod log;
pub mod panel;
pub mod power;
pub mod spi_sram;
pub mod storage;

#[cfg(any(test, feature = "std"))]
pub mod storage_local;

#[cfg(feature = "sdmmc")]
pub mod storage_sdmmc;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use external_ram::{ExternalRam, RamError};
pub use panel::{PanelBus, PanelError};
pub use power::{EntropySource, PowerMonitor, SleepScheduler, WakeSource};
pub use spi_sram::SpiSram;
pub use storage::{DirEntry, File, Storage, StoragePath};
