//! External RAM abstraction
//!
//! Provides a trait for byte-addressed memory that lives outside the MCU,
//! typically a serial PSRAM/SRAM chip on the display's SPI bus. The frame
//! buffer is placed here on boards whose internal RAM cannot hold a full
//! 4bpp frame (600×448 / 2 = 134 400 bytes).
//!
//! Every access is a bus transaction. Callers that need read-modify-write
//! semantics (nibble writes) issue one read and one write per byte; there is
//! no caching at this layer.

/// External RAM interface.
///
/// Implementations provide bounds-checked access to a linear address space
/// of [`capacity`](Self::capacity) bytes. On hardware this wraps an SPI
/// memory chip; in tests it wraps a heap-allocated `Vec<u8>`.
pub trait ExternalRam {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read bytes from external RAM at `offset`.
    ///
    /// Returns `Err` if `offset + buf.len() > capacity()`.
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write bytes to external RAM at `offset`.
    ///
    /// Returns `Err` if `offset + data.len() > capacity()`.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error>;

    /// Fill `len` bytes starting at `offset` with `value`.
    fn fill(&mut self, offset: usize, len: usize, value: u8) -> Result<(), Self::Error>;

    /// Total capacity in bytes.
    fn capacity(&self) -> usize;

    /// Read a single byte.
    fn read_u8(&mut self, offset: usize) -> Result<u8, Self::Error> {
        let mut b = [0u8; 1];
        self.read(offset, &mut b)?;
        let [value] = b;
        Ok(value)
    }

    /// Write a single byte.
    fn write_u8(&mut self, offset: usize, value: u8) -> Result<(), Self::Error> {
        self.write(offset, &[value])
    }
}

/// Errors returned by [`ExternalRam`] implementations in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RamError<E = core::convert::Infallible> {
    /// The access would run past the end of the device.
    #[error("access of {len} bytes at offset {offset} is out of range")]
    OutOfRange {
        /// First byte of the rejected access.
        offset: usize,
        /// Length of the rejected access.
        len: usize,
    },
    /// The underlying bus transaction failed.
    #[error("bus error: {0:?}")]
    Bus(E),
}

/// Check that `[offset, offset + len)` lies inside `capacity`.
pub fn check_range<E>(offset: usize, len: usize, capacity: usize) -> Result<(), RamError<E>> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(RamError::OutOfRange { offset, len }),
    }
}
