//! Display stack for the 5.65" 7-colour ACeP panel (600×448)
//!
//! ```text
//! FrameBuffer<B>      rotation + nibble addressing, DrawTarget
//!         ↓
//! BackingStore        LocalBacking (MCU RAM) | ExternalBacking (SPI PSRAM)
//!                     FrameMemory picks one at runtime
//!
//! RefreshSequencer    PowerUp → DeGhost → WriteFrame → CommitRefresh → PowerDown
//!         ↓
//! PanelBus            SpiPanelBus on hardware, RecordingPanel / simulator on host
//! ```

pub mod backing;
pub mod color;
pub mod driver;
pub mod framebuffer;
pub mod sequencer;

#[cfg(feature = "simulator")]
pub mod simulator;

pub use backing::{BackingStore, ExternalBacking, FrameMemory, FrameMemoryError, FrameStore, LocalBacking};
pub use color::AcepColor;
pub use driver::{Command, SpiPanelBus};
pub use framebuffer::{FrameBuffer, Rotation};
pub use sequencer::{RefreshError, RefreshPhase, RefreshSequencer, RefreshTiming};

#[cfg(feature = "simulator")]
pub use simulator::SimulatedPanel;

/// Panel width in pixels.
pub const WIDTH: u32 = 600;

/// Panel height in pixels.
pub const HEIGHT: u32 = 448;

/// Packed frame size: two 4-bit pixels per byte.
pub const FRAME_BYTES: usize = (WIDTH as usize * HEIGHT as usize) / 2;

/// Fill byte for a blank frame (white in both nibbles).
pub const CLEAR_BYTE: u8 = 0x11;
