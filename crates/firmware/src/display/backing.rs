//! Frame buffer backing stores
//!
//! The packed frame is 134 400 bytes. Boards with enough internal RAM keep
//! it in a static ([`LocalBacking`]); the rest put it in a serial PSRAM on
//! a serial PSRAM ([`ExternalBacking`]). [`FrameBuffer`] only sees the
//! [`BackingStore`] trait, so drawing behaves the same on both.
//! [`FrameMemory`] picks one of the two at runtime from a [`FrameStore`]
//! setting.
//!
//! [`FrameBuffer`]: super::FrameBuffer

use core::convert::Infallible;

use platform::external_ram::{check_range, ExternalRam, RamError};
use platform::warn;

/// Byte-addressed storage for a packed frame.
pub trait BackingStore {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read the byte at `addr`.
    fn read_byte(&mut self, addr: usize) -> Result<u8, Self::Error>;

    /// Overwrite the byte at `addr`.
    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), Self::Error>;

    /// Set `len` bytes from `start` to `value`.
    fn erase(&mut self, start: usize, len: usize, value: u8) -> Result<(), Self::Error>;

    /// Size in bytes.
    fn len(&self) -> usize;

    /// Whether the store holds no bytes at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `buf.len()` bytes starting at `start` into `buf`.
    ///
    /// Used to stream the frame to the panel. The default reads one byte at
    /// a time.
    fn read_into(&mut self, start: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = self.read_byte(start.saturating_add(i))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LocalBacking
// ---------------------------------------------------------------------------

/// Frame held in MCU memory, mutated in place.
pub struct LocalBacking<'a> {
    bytes: &'a mut [u8],
}

impl<'a> LocalBacking<'a> {
    /// Wrap a byte slice, usually a `static` placed in AXI SRAM.
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }
}

impl BackingStore for LocalBacking<'_> {
    type Error = RamError;

    fn read_byte(&mut self, addr: usize) -> Result<u8, Self::Error> {
        self.bytes.get(addr).copied().ok_or(RamError::OutOfRange { offset: addr, len: 1 })
    }

    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), Self::Error> {
        let slot = self.bytes.get_mut(addr).ok_or(RamError::OutOfRange { offset: addr, len: 1 })?;
        *slot = value;
        Ok(())
    }

    fn erase(&mut self, start: usize, len: usize, value: u8) -> Result<(), Self::Error> {
        check_range::<Infallible>(start, len, self.bytes.len())?;
        self.bytes
            .get_mut(start..start.saturating_add(len))
            .ok_or(RamError::OutOfRange { offset: start, len })?
            .fill(value);
        Ok(())
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read_into(&mut self, start: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        let src = self
            .bytes
            .get(start..start.saturating_add(buf.len()))
            .ok_or(RamError::OutOfRange { offset: start, len: buf.len() })?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ExternalBacking
// ---------------------------------------------------------------------------

/// Frame held in an external RAM chip.
///
/// Every pixel write is one read and one write transaction on the chip;
/// nothing is cached on the MCU side.
pub struct ExternalBacking<R> {
    ram: R,
    len: usize,
}

impl<R: ExternalRam> ExternalBacking<R> {
    /// Use the first `len` bytes of `ram`.
    ///
    /// Fails when the chip is smaller than `len`.
    pub fn new(ram: R, len: usize) -> Result<Self, RamError> {
        check_range::<Infallible>(0, len, ram.capacity())?;
        Ok(Self { ram, len })
    }

    /// Give the chip back.
    pub fn release(self) -> R {
        self.ram
    }

    /// The chip driver.
    pub fn ram(&self) -> &R {
        &self.ram
    }
}

impl<R: ExternalRam> BackingStore for ExternalBacking<R> {
    type Error = R::Error;

    fn read_byte(&mut self, addr: usize) -> Result<u8, Self::Error> {
        self.ram.read_u8(addr)
    }

    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), Self::Error> {
        self.ram.write_u8(addr, value)
    }

    fn erase(&mut self, start: usize, len: usize, value: u8) -> Result<(), Self::Error> {
        self.ram.fill(start, len, value)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn read_into(&mut self, start: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.ram.read(start, buf)
    }
}

// ---------------------------------------------------------------------------
// Runtime selection
// ---------------------------------------------------------------------------

/// Where the frame is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum FrameStore {
    /// MCU memory.
    #[default]
    Local,
    /// External RAM chip.
    External,
}

/// Error of a [`FrameMemory`], tagged with the memory it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMemoryError<E> {
    /// From the local buffer.
    Local(RamError),
    /// From the external chip.
    External(E),
}

/// Either backing, chosen when the cycle is put together.
pub enum FrameMemory<'a, R> {
    /// Frame in MCU memory.
    Local(LocalBacking<'a>),
    /// Frame in external RAM.
    External(ExternalBacking<R>),
}

impl<'a, R: ExternalRam> FrameMemory<'a, R> {
    /// Back a `len`-byte frame as `store` asks.
    ///
    /// `local` must hold at least `len` bytes. When the chip is missing or
    /// smaller than `len` the local buffer is used instead.
    pub fn select(store: FrameStore, local: &'a mut [u8], ram: Option<R>, len: usize) -> Self {
        if store == FrameStore::Local {
            return Self::Local(LocalBacking::new(local));
        }
        match ram.map(|ram| ExternalBacking::new(ram, len)) {
            Some(Ok(backing)) => Self::External(backing),
            Some(Err(_)) => {
                warn!("External RAM smaller than {} bytes, keeping the frame local", len);
                Self::Local(LocalBacking::new(local))
            }
            None => {
                warn!("No external RAM available, keeping the frame local");
                Self::Local(LocalBacking::new(local))
            }
        }
    }

    /// Which memory is in use.
    pub fn store(&self) -> FrameStore {
        match self {
            Self::Local(_) => FrameStore::Local,
            Self::External(_) => FrameStore::External,
        }
    }
}

impl<R: ExternalRam> BackingStore for FrameMemory<'_, R> {
    type Error = FrameMemoryError<R::Error>;

    fn read_byte(&mut self, addr: usize) -> Result<u8, Self::Error> {
        match self {
            Self::Local(b) => b.read_byte(addr).map_err(FrameMemoryError::Local),
            Self::External(b) => b.read_byte(addr).map_err(FrameMemoryError::External),
        }
    }

    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), Self::Error> {
        match self {
            Self::Local(b) => b.write_byte(addr, value).map_err(FrameMemoryError::Local),
            Self::External(b) => b.write_byte(addr, value).map_err(FrameMemoryError::External),
        }
    }

    fn erase(&mut self, start: usize, len: usize, value: u8) -> Result<(), Self::Error> {
        match self {
            Self::Local(b) => b.erase(start, len, value).map_err(FrameMemoryError::Local),
            Self::External(b) => b.erase(start, len, value).map_err(FrameMemoryError::External),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Local(b) => b.len(),
            Self::External(b) => b.len(),
        }
    }

    fn read_into(&mut self, start: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        match self {
            Self::Local(b) => b.read_into(start, buf).map_err(FrameMemoryError::Local),
            Self::External(b) => b.read_into(start, buf).map_err(FrameMemoryError::External),
        }
    }
}
