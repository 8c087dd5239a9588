//! E-paper photo frame firmware
//!
//! Wakes, shows the next photo of a shuffled playlist on a 7-colour ACeP
//! panel, and goes back to deep sleep.
//!
//! # Architecture
//!
//! This firmware follows a layered architecture:
//!
//! ```text
//! Application Layer (main.rs, cycle)
//!         ↓
//! Frame Renderer (display, render, status, battery)
//!         ↓
//! Playlist Store (playlist crate)
//!         ↓
//! Platform HAL (platform crate: Storage, PanelBus, ExternalRam, power)
//!         ↓
//! Board support (Embassy, STM32, embedded-sdmmc)
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for STM32H7 target (embassy, embedded HAL)
//! - `simulator` - Run wake cycles on the desktop against a card directory
//! - `std` - Enable standard library (for simulator and testing)
//!
//! # Examples
//!
//! ## Hardware Target
//!
//! ```bash
//! cargo build --release --target thumbv7em-none-eabihf --features hardware
//! ```
//!
//! ## Simulator
//!
//! ```bash
//! cargo run -p xtask -- simulate --card ./card --cycles 3
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
// Upgrade relevant warns to deny; keep pedantic as warn (too noisy for firmware)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Critical correctness: deny these
#![deny(clippy::await_holding_lock)] // holding a blocking Mutex across .await is a bug
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline (allow println in tests via clippy.toml)
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
#![allow(async_fn_in_trait)] // single-threaded executor, Send bounds not needed
// Pedantic lints too noisy for firmware application code:
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::similar_names)]
#![allow(clippy::unused_async)]
#![allow(clippy::too_many_arguments)]

pub mod battery;
pub mod config;
pub mod cycle;
pub mod display;
pub mod error;
pub mod render;
pub mod status;

#[cfg(feature = "hardware")]
pub mod board;

#[cfg(feature = "simulator")]
pub mod sim;

// Re-export key types
pub use config::FrameConfig;
pub use cycle::{CycleReport, Shown, WakeCycle};
pub use display::{
    AcepColor, BackingStore, ExternalBacking, FrameBuffer, FrameMemory, FrameStore, LocalBacking,
    RefreshSequencer, Rotation, FRAME_BYTES, HEIGHT, WIDTH,
};
pub use error::CycleError;
pub use render::SampleMap;
pub use status::StatusMessage;

#[cfg(feature = "simulator")]
pub use display::SimulatedPanel;
