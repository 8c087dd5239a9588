//! Serial PSRAM driver (APS6404L / ESP-PSRAM64 class) over a blocking
//! [`embedded_hal::spi::SpiDevice`].
//!
//! The chip is accessed with plain SPI commands and a 24-bit big-endian
//! address:
//!
//! | Op    | Code | Frame                                  |
//! |-------|------|----------------------------------------|
//! | READ  | 0x03 | `03 A23..A16 A15..A8 A7..A0` + read N  |
//! | WRITE | 0x02 | `02 A23..A16 A15..A8 A7..A0` + write N |
//!
//! Linear bursts wrap inside a 1 KiB page, so multi-byte accesses are split
//! at page boundaries. Each piece is its own `SpiDevice` transaction (CS
//! framed by the device).

use embedded_hal::spi::{Operation, SpiDevice};

use crate::external_ram::{check_range, ExternalRam, RamError};

/// READ command (no wait cycles, up to 33 MHz).
pub const CMD_READ: u8 = 0x03;
/// WRITE command.
pub const CMD_WRITE: u8 = 0x02;
/// Burst wrap boundary.
pub const PAGE_SIZE: usize = 1024;
/// Capacity of a 64 Mbit part.
pub const CAPACITY_64MBIT: usize = 8 * 1024 * 1024;

const FILL_CHUNK: usize = 64;
const ADDRESS_SPACE: usize = 0x0100_0000;

/// SPI PSRAM chip.
pub struct SpiSram<SPI> {
    spi: SPI,
    capacity: usize,
}

impl<SPI: SpiDevice> SpiSram<SPI> {
    /// Wrap `spi` as a memory of `capacity` bytes.
    ///
    /// `capacity` is clamped to the 24-bit address space.
    pub fn new(spi: SPI, capacity: usize) -> Self {
        Self { spi, capacity: capacity.min(ADDRESS_SPACE) }
    }

    /// Release the SPI device.
    pub fn release(self) -> SPI {
        self.spi
    }

    fn header(cmd: u8, addr: usize) -> [u8; 4] {
        let [_, a2, a1, a0] = u32::try_from(addr).unwrap_or(u32::MAX).to_be_bytes();
        [cmd, a2, a1, a0]
    }

    /// Bytes left in the page containing `addr`.
    // addr % PAGE_SIZE < PAGE_SIZE, so the subtraction cannot underflow.
    #[allow(clippy::arithmetic_side_effects)]
    fn page_room(addr: usize) -> usize {
        PAGE_SIZE - addr % PAGE_SIZE
    }
}

impl<SPI: SpiDevice> ExternalRam for SpiSram<SPI> {
    type Error = RamError<SPI::Error>;

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), Self::Error> {
        check_range::<SPI::Error>(offset, buf.len(), self.capacity)?;
        let mut addr = offset;
        let mut rest = buf;
        while !rest.is_empty() {
            let n = Self::page_room(addr).min(rest.len());
            let (head, tail) = rest.split_at_mut(n);
            let header = Self::header(CMD_READ, addr);
            self.spi
                .transaction(&mut [Operation::Write(&header), Operation::Read(head)])
                .map_err(RamError::Bus)?;
            addr = addr.saturating_add(n);
            rest = tail;
        }
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), Self::Error> {
        check_range::<SPI::Error>(offset, data.len(), self.capacity)?;
        let mut addr = offset;
        let mut rest = data;
        while !rest.is_empty() {
            let n = Self::page_room(addr).min(rest.len());
            let (head, tail) = rest.split_at(n);
            let header = Self::header(CMD_WRITE, addr);
            self.spi
                .transaction(&mut [Operation::Write(&header), Operation::Write(head)])
                .map_err(RamError::Bus)?;
            addr = addr.saturating_add(n);
            rest = tail;
        }
        Ok(())
    }

    fn fill(&mut self, offset: usize, len: usize, value: u8) -> Result<(), Self::Error> {
        check_range::<SPI::Error>(offset, len, self.capacity)?;
        let pattern = [value; FILL_CHUNK];
        let mut addr = offset;
        let mut remaining = len;
        while remaining > 0 {
            let n = remaining.min(FILL_CHUNK);
            // n <= FILL_CHUNK == pattern.len()
            #[allow(clippy::indexing_slicing)]
            self.write(addr, &pattern[..n])?;
            addr = addr.saturating_add(n);
            remaining = remaining.saturating_sub(n);
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
