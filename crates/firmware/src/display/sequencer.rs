//! ACeP refresh sequencer
//!
//! One full refresh per wake:
//!
//! ```text
//! PowerUp → DeGhost → (500 ms) → PowerUp → WriteFrame → CommitRefresh → [PowerDown]
//! ```
//!
//! Every refresh waits on the BUSY line with a bounded poll. Boards without
//! a BUSY line wait a fixed delay instead, never shorter than
//! [`RefreshTiming::MIN_FALLBACK_MS`]. Nothing is retried: the first
//! failing phase ends the sequence.

use core::convert::Infallible;

use embedded_hal_async::delay::DelayNs;
use platform::panel::{PanelBus, PanelError};
use platform::{debug, info};

use super::backing::BackingStore;
use super::driver::{
    Command, DEEP_SLEEP_CHECK, DEFAULT_INIT, DEGHOST_FILL, RESOLUTION, TABLE_DELAY, TABLE_END,
};
use super::FRAME_BYTES;

/// Bytes per data transfer when streaming fills and frames.
const BLOCK: usize = 256;

/// BUSY poll interval.
const POLL_MS: u32 = 10;

// ---------------------------------------------------------------------------
// Timing, phases, errors
// ---------------------------------------------------------------------------

/// BUSY handling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RefreshTiming {
    busy_timeout_ms: u32,
    busy_fallback_ms: u32,
}

impl RefreshTiming {
    /// Shortest wait used in place of a BUSY line.
    pub const MIN_FALLBACK_MS: u32 = 500;

    /// A full-colour refresh takes ~30 s; allow generous headroom.
    pub const DEFAULT_TIMEOUT_MS: u32 = 60_000;

    /// `busy_fallback_ms` is raised to [`MIN_FALLBACK_MS`](Self::MIN_FALLBACK_MS)
    /// when smaller.
    pub const fn new(busy_timeout_ms: u32, busy_fallback_ms: u32) -> Self {
        let busy_fallback_ms = if busy_fallback_ms < Self::MIN_FALLBACK_MS {
            Self::MIN_FALLBACK_MS
        } else {
            busy_fallback_ms
        };
        Self { busy_timeout_ms, busy_fallback_ms }
    }

    /// Give up on BUSY after this long.
    pub const fn busy_timeout_ms(&self) -> u32 {
        self.busy_timeout_ms
    }

    /// Fixed wait without a BUSY line.
    pub const fn busy_fallback_ms(&self) -> u32 {
        self.busy_fallback_ms
    }
}

impl Default for RefreshTiming {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT_MS, Self::MIN_FALLBACK_MS)
    }
}

/// Step of the refresh sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RefreshPhase {
    /// Reset, init table, resolution.
    PowerUp,
    /// Mid-grey fill and refresh to clear the previous image.
    DeGhost,
    /// Stream the frame into panel memory.
    WriteFrame,
    /// Power on, refresh, power off.
    CommitRefresh,
    /// Deep sleep of the controller.
    PowerDown,
}

impl RefreshPhase {
    /// Short label for log lines.
    pub const fn label(self) -> &'static str {
        match self {
            Self::PowerUp => "power up",
            Self::DeGhost => "de-ghost",
            Self::WriteFrame => "write frame",
            Self::CommitRefresh => "refresh",
            Self::PowerDown => "power down",
        }
    }
}

/// Refresh failure. `E` is the frame backing store's error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RefreshError<E = Infallible> {
    /// The panel transport failed or BUSY never settled.
    #[error("{cause} during {phase:?}")]
    Panel {
        /// Phase in progress.
        phase: RefreshPhase,
        /// Transport error.
        cause: PanelError,
    },
    /// The init table ends early or lacks its terminator.
    #[error("malformed init table at byte {offset}")]
    InitTable {
        /// Offset of the offending byte.
        offset: usize,
    },
    /// Reading the frame back failed.
    #[error("frame read failed: {0:?}")]
    Backing(E),
}

impl RefreshError<Infallible> {
    /// Same error with a concrete backing error type.
    pub fn widen<E>(self) -> RefreshError<E> {
        match self {
            Self::Panel { phase, cause } => RefreshError::Panel { phase, cause },
            Self::InitTable { offset } => RefreshError::InitTable { offset },
            Self::Backing(never) => match never {},
        }
    }
}

impl<E> RefreshError<E> {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Panel { cause: PanelError::BusyTimeout { .. }, .. } => "busy timeout",
            Self::Panel { .. } => "panel bus",
            Self::InitTable { .. } => "init table",
            Self::Backing(_) => "frame read",
        }
    }
}

fn in_phase(phase: RefreshPhase) -> impl FnOnce(PanelError) -> RefreshError {
    move |cause| RefreshError::Panel { phase, cause }
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Drives one [`PanelBus`] through the refresh sequence.
pub struct RefreshSequencer<'t, P, D> {
    panel: P,
    delay: D,
    timing: RefreshTiming,
    init: &'t [u8],
    power_down: bool,
}

impl<P: PanelBus, D: DelayNs> RefreshSequencer<'static, P, D> {
    /// Sequencer using the built-in init table.
    pub fn new(panel: P, delay: D, timing: RefreshTiming) -> Self {
        Self { panel, delay, timing, init: DEFAULT_INIT, power_down: false }
    }
}

impl<'t, P: PanelBus, D: DelayNs> RefreshSequencer<'t, P, D> {
    /// Replace the power-up register table.
    pub fn with_init_table<'u>(self, table: &'u [u8]) -> RefreshSequencer<'u, P, D> {
        RefreshSequencer {
            panel: self.panel,
            delay: self.delay,
            timing: self.timing,
            init: table,
            power_down: self.power_down,
        }
    }

    /// Put the controller into deep sleep after each refresh.
    pub fn power_down_after_refresh(mut self, enabled: bool) -> Self {
        self.power_down = enabled;
        self
    }

    /// The transport.
    pub fn panel(&self) -> &P {
        &self.panel
    }

    /// The delay provider.
    pub fn delay(&self) -> &D {
        &self.delay
    }

    /// The delay provider, mutably; the wake cycle borrows it between phases.
    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Give back the transport and delay.
    pub fn release(self) -> (P, D) {
        (self.panel, self.delay)
    }

    /// Show `frame` on the panel.
    pub async fn display<B: BackingStore>(&mut self, frame: &mut B) -> Result<(), RefreshError<B::Error>> {
        self.power_up().await.map_err(RefreshError::widen)?;
        self.deghost().await.map_err(RefreshError::widen)?;
        self.delay.delay_ms(500).await;
        self.power_up().await.map_err(RefreshError::widen)?;
        self.write_frame(frame).await?;
        self.commit_refresh().await.map_err(RefreshError::widen)?;
        if self.power_down {
            self.power_down().await.map_err(RefreshError::widen)?;
        }
        info!("Display refreshed");
        Ok(())
    }

    /// Reset the controller and load the init table.
    pub async fn power_up(&mut self) -> Result<(), RefreshError> {
        let phase = RefreshPhase::PowerUp;
        debug!("Panel: {}", phase.label());
        self.panel.reset().await.map_err(in_phase(phase))?;
        self.delay.delay_ms(200).await;
        self.wait_until(true).await.map_err(in_phase(phase))?;
        self.run_init_table().await?;
        self.send(phase, Command::Resolution, &RESOLUTION).await?;
        self.delay.delay_ms(100).await;
        Ok(())
    }

    /// Fill the panel with mid-grey and refresh it once.
    pub async fn deghost(&mut self) -> Result<(), RefreshError> {
        let phase = RefreshPhase::DeGhost;
        debug!("Panel: {}", phase.label());
        self.send(phase, Command::Resolution, &RESOLUTION).await?;
        self.send(phase, Command::DataStartTransmission, &[]).await?;
        let block = [DEGHOST_FILL; BLOCK];
        let mut remaining = FRAME_BYTES;
        while remaining > 0 {
            let n = remaining.min(BLOCK);
            self.panel
                .data(block.get(..n).unwrap_or(&block))
                .await
                .map_err(in_phase(phase))?;
            remaining = remaining.saturating_sub(n);
        }
        self.refresh_cycle(phase).await
    }

    /// Stream the packed frame to panel memory.
    pub async fn write_frame<B: BackingStore>(&mut self, frame: &mut B) -> Result<(), RefreshError<B::Error>> {
        let phase = RefreshPhase::WriteFrame;
        debug!("Panel: {}", phase.label());
        self.send(phase, Command::DataStartTransmission, &[])
            .await
            .map_err(RefreshError::widen)?;
        let total = FRAME_BYTES.min(frame.len());
        let mut block = [0u8; BLOCK];
        let mut offset = 0;
        while offset < total {
            let n = total.saturating_sub(offset).min(BLOCK);
            let chunk = block.get_mut(..n).unwrap_or(&mut []);
            frame.read_into(offset, chunk).map_err(RefreshError::Backing)?;
            self.panel
                .data(chunk)
                .await
                .map_err(|cause| RefreshError::Panel { phase, cause })?;
            offset = offset.saturating_add(n);
        }
        Ok(())
    }

    /// Power on, refresh, power off.
    pub async fn commit_refresh(&mut self) -> Result<(), RefreshError> {
        let phase = RefreshPhase::CommitRefresh;
        debug!("Panel: {}", phase.label());
        self.refresh_cycle(phase).await
    }

    /// Send the controller to deep sleep.
    pub async fn power_down(&mut self) -> Result<(), RefreshError> {
        let phase = RefreshPhase::PowerDown;
        debug!("Panel: {}", phase.label());
        self.delay.delay_ms(1000).await;
        self.send(phase, Command::DeepSleep, &[DEEP_SLEEP_CHECK]).await?;
        self.delay.delay_ms(100).await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn send(&mut self, phase: RefreshPhase, cmd: Command, data: &[u8]) -> Result<(), RefreshError> {
        self.panel.command(cmd.code()).await.map_err(in_phase(phase))?;
        self.panel.data(data).await.map_err(in_phase(phase))
    }

    async fn refresh_cycle(&mut self, phase: RefreshPhase) -> Result<(), RefreshError> {
        self.send(phase, Command::PowerOn, &[]).await?;
        self.wait_until(true).await.map_err(in_phase(phase))?;
        self.send(phase, Command::DisplayRefresh, &[]).await?;
        self.wait_until(true).await.map_err(in_phase(phase))?;
        self.send(phase, Command::PowerOff, &[]).await?;
        self.wait_until(false).await.map_err(in_phase(phase))
    }

    /// Wait for BUSY to read `level`, or the fallback delay without a pin.
    async fn wait_until(&mut self, level: bool) -> Result<(), PanelError> {
        let mut waited_ms: u32 = 0;
        loop {
            match self.panel.busy_level()? {
                None => {
                    self.delay.delay_ms(self.timing.busy_fallback_ms).await;
                    return Ok(());
                }
                Some(now) if now == level => return Ok(()),
                Some(_) if waited_ms >= self.timing.busy_timeout_ms => {
                    return Err(PanelError::BusyTimeout { waited_ms });
                }
                Some(_) => {
                    self.delay.delay_ms(POLL_MS).await;
                    waited_ms = waited_ms.saturating_add(POLL_MS);
                }
            }
        }
    }

    async fn run_init_table(&mut self) -> Result<(), RefreshError> {
        let phase = RefreshPhase::PowerUp;
        let table = self.init;
        let mut at = 0usize;
        loop {
            let malformed = RefreshError::InitTable { offset: at };
            match table.get(at).copied() {
                None => return Err(malformed),
                Some(TABLE_END) => return Ok(()),
                Some(TABLE_DELAY) => {
                    let ms = table.get(at.saturating_add(1)).copied().ok_or(malformed)?;
                    self.delay.delay_ms(u32::from(ms)).await;
                    at = at.saturating_add(2);
                }
                Some(cmd) => {
                    let n = usize::from(table.get(at.saturating_add(1)).copied().ok_or(malformed)?);
                    let start = at.saturating_add(2);
                    let args = table.get(start..start.saturating_add(n)).ok_or(malformed)?;
                    self.panel.command(cmd).await.map_err(in_phase(phase))?;
                    self.panel.data(args).await.map_err(in_phase(phase))?;
                    at = start.saturating_add(n);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use platform::mocks::{BusyLine, RecordingDelay, RecordingPanel};

    fn sequencer(busy: BusyLine) -> RefreshSequencer<'static, RecordingPanel, RecordingDelay> {
        RefreshSequencer::new(RecordingPanel::new(busy), RecordingDelay::new(), RefreshTiming::new(1_000, 0))
    }

    #[test]
    fn fallback_floor_is_enforced() {
        assert_eq!(RefreshTiming::new(10, 0).busy_fallback_ms(), 500);
        assert_eq!(RefreshTiming::new(10, 750).busy_fallback_ms(), 750);
    }

    #[tokio::test]
    async fn init_table_delays_and_commands() {
        let table = [0xFF, 7, 0x30, 1, 0x3C, 0x50, 0, 0xFE];
        let mut seq = sequencer(BusyLine::Responsive).with_init_table(&table);
        seq.run_init_table().await.unwrap();
        let (panel, delay) = seq.release();
        assert_eq!(panel.commands(), vec![0x30, 0x50]);
        assert_eq!(panel.data_after(0x30, 0), Some(&[0x3C][..]));
        assert_eq!(delay.millis(), &[7]);
    }

    #[tokio::test]
    async fn truncated_init_table_is_rejected() {
        for (table, offset) in [
            (&[0x30, 3, 0x01][..], 0usize),
            (&[0xFF][..], 0),
            (&[0x30, 1, 0x01][..], 3),
        ] {
            let mut seq = sequencer(BusyLine::Responsive).with_init_table(table);
            assert_eq!(seq.run_init_table().await, Err(RefreshError::InitTable { offset }));
        }
    }

    #[tokio::test]
    async fn missing_busy_pin_waits_fallback_once() {
        let mut seq = sequencer(BusyLine::Absent);
        seq.commit_refresh().await.unwrap();
        let (panel, delay) = seq.release();
        assert_eq!(panel.commands(), vec![0x04, 0x12, 0x02]);
        assert_eq!(delay.millis(), &[500, 500, 500]);
    }

    #[tokio::test]
    async fn stuck_busy_times_out() {
        let mut seq = sequencer(BusyLine::Stuck(false));
        let err = seq.commit_refresh().await.unwrap_err();
        assert_eq!(
            err,
            RefreshError::Panel {
                phase: RefreshPhase::CommitRefresh,
                cause: PanelError::BusyTimeout { waited_ms: 1_000 },
            }
        );
        // Nothing is sent after the failed wait.
        assert_eq!(seq.panel().commands(), vec![0x04]);
    }

    #[tokio::test]
    async fn power_down_sends_check_code() {
        let mut seq = sequencer(BusyLine::Responsive);
        seq.power_down().await.unwrap();
        let (panel, delay) = seq.release();
        assert_eq!(panel.commands(), vec![0x07]);
        assert_eq!(panel.data_after(0x07, 0), Some(&[0xA5][..]));
        assert_eq!(delay.millis(), &[1000, 100]);
    }
}
