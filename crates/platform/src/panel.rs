//! Display panel transport
//!
//! The lowest layer of the display stack: push a command byte, push data
//! bytes, pulse the reset line and sample the busy line. What the bytes mean
//! is the business of the controller driver sitting on top.

/// Errors raised by a panel transport or the sequencer driving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelError {
    /// SPI communication error.
    #[error("SPI communication error")]
    Communication,
    /// GPIO operation error.
    #[error("GPIO error")]
    Gpio,
    /// The busy line did not reach the expected level in time.
    #[error("busy line did not settle within {waited_ms} ms")]
    BusyTimeout {
        /// Time spent polling before giving up.
        waited_ms: u32,
    },
}

/// Command/data transport to an e-paper controller.
pub trait PanelBus {
    /// Send one command byte (DC low).
    fn command(&mut self, cmd: u8) -> impl core::future::Future<Output = Result<(), PanelError>>;

    /// Send data bytes belonging to the last command (DC high).
    fn data(&mut self, data: &[u8]) -> impl core::future::Future<Output = Result<(), PanelError>>;

    /// Pulse the hardware reset line.
    fn reset(&mut self) -> impl core::future::Future<Output = Result<(), PanelError>>;

    /// Sample the busy line.
    ///
    /// Returns `Ok(None)` when no busy line is wired; callers must then fall
    /// back to fixed delays.
    fn busy_level(&mut self) -> Result<Option<bool>, PanelError>;
}
