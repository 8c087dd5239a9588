//! Host collaborators for running wake cycles on the desktop.
//!
//! [`simulate_wake`] drives one full [`WakeCycle`] against any [`Storage`]
//! (normally a card directory through `LocalFileStorage`) and hands back
//! the [`SimulatedPanel`] so the result can be saved as PNG. With
//! [`FrameStore::External`] the frame is drawn in a heap-backed
//! [`MemoryRam`] standing in for the PSRAM chip.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::time::Duration;

use embedded_hal_async::delay::DelayNs;
use platform::mocks::MemoryRam;
use platform::power::{EntropySource, PowerMonitor, SleepScheduler, WakeSource};
use platform::storage::Storage;
use playlist::PlaylistStore;

use crate::config::FrameConfig;
use crate::cycle::{CycleReport, WakeCycle};
use crate::display::{FrameBuffer, FrameMemory, FrameStore, RefreshSequencer, SimulatedPanel, FRAME_BYTES};

/// Tokio-backed delay.
///
/// Real panel waits add up to tens of seconds, so by default the delay only
/// yields and keeps count of the time that would have passed.
#[derive(Debug, Clone, Default)]
pub struct TokioDelay {
    realtime: bool,
    skipped_ns: u64,
}

impl TokioDelay {
    /// Delay that only yields.
    pub fn instant() -> Self {
        Self::default()
    }

    /// Delay that actually sleeps.
    pub fn realtime() -> Self {
        Self { realtime: true, skipped_ns: 0 }
    }

    /// Time that was requested but not slept.
    pub fn skipped(&self) -> Duration {
        Duration::from_nanos(self.skipped_ns)
    }
}

impl DelayNs for TokioDelay {
    async fn delay_ns(&mut self, ns: u32) {
        if self.realtime {
            tokio::time::sleep(Duration::from_nanos(u64::from(ns))).await;
        } else {
            self.skipped_ns = self.skipped_ns.saturating_add(u64::from(ns));
            tokio::task::yield_now().await;
        }
    }
}

/// Sleep scheduler that logs the request and returns.
#[derive(Debug, Clone)]
pub struct HostSleep {
    wake: WakeSource,
    requested_us: Option<u64>,
}

impl HostSleep {
    /// Scheduler reporting `wake`.
    pub fn new(wake: WakeSource) -> Self {
        Self { wake, requested_us: None }
    }

    /// Duration of the last sleep request.
    pub fn requested_us(&self) -> Option<u64> {
        self.requested_us
    }
}

impl SleepScheduler for HostSleep {
    fn wake_reason(&mut self) -> WakeSource {
        self.wake
    }

    async fn deep_sleep(&mut self, duration_us: u64) {
        tracing::info!(seconds = duration_us / 1_000_000, "deep sleep requested");
        self.requested_us = Some(duration_us);
    }
}

/// Battery with a configurable reading.
#[derive(Debug, Clone, Copy)]
pub struct HostPower {
    /// Reported voltage, `None` to simulate a failed sample.
    pub voltage_mv: Option<u16>,
}

impl PowerMonitor for HostPower {
    fn battery_voltage_mv(&mut self) -> Option<u16> {
        self.voltage_mv
    }
}

/// Entropy from the process-random hasher keys.
#[derive(Debug, Default)]
pub struct HostEntropy {
    keys: RandomState,
    counter: u64,
}

impl EntropySource for HostEntropy {
    fn sample(&mut self) -> u32 {
        self.counter = self.counter.wrapping_add(1);
        let mut hasher = self.keys.build_hasher();
        hasher.write_u64(self.counter);
        // Truncation keeps the low half of a well-mixed hash.
        #[allow(clippy::cast_possible_truncation)]
        let sample = hasher.finish() as u32;
        sample
    }
}

/// Run one wake cycle against `storage` and return the panel it drew on.
pub async fn simulate_wake<S: Storage, const N: usize>(
    config: &FrameConfig,
    playlist: &mut PlaylistStore<N>,
    storage: S,
    wake: WakeSource,
    power: HostPower,
) -> (CycleReport, SimulatedPanel) {
    let mut frame = vec![0u8; FRAME_BYTES];
    let ram = (config.frame_store == FrameStore::External).then(|| MemoryRam::new(FRAME_BYTES));
    let memory = FrameMemory::select(config.frame_store, &mut frame, ram, FRAME_BYTES);
    tracing::debug!(store = ?memory.store(), "frame memory selected");
    let display = RefreshSequencer::new(SimulatedPanel::new(), TokioDelay::instant(), config.refresh_timing())
        .power_down_after_refresh(config.power_down_after_refresh);

    let mut cycle = WakeCycle {
        config,
        playlist,
        storage,
        frame: FrameBuffer::new(memory),
        display,
        sleep: HostSleep::new(wake),
        power,
        entropy: HostEntropy::default(),
    };
    let report = cycle.run().await;
    let (panel, delay) = cycle.display.release();
    tracing::debug!(panel_wait_ms = delay.skipped().as_millis(), "simulated wake finished");
    (report, panel)
}
