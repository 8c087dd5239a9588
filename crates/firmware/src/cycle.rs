//! One wake cycle
//!
//! ```text
//! wake → clear frame → mount (retries) → photo dir → load/rebuild playlist
//!      → open photo → decode → advance + persist → battery → refresh → sleep
//! ```
//!
//! Any failure stops the pipeline, draws its status message, applies the
//! playlist consequence from [`CycleError::invalidates_playlist`], and the
//! cycle still refreshes the panel and sleeps exactly once.

use embedded_hal_async::delay::DelayNs;
use platform::panel::PanelBus;
use platform::power::{EntropySource, PowerMonitor, SleepScheduler, WakeSource};
use platform::storage::Storage;
use platform::{error, info, warn};
use playlist::{Advance, LoadOutcome, PlaylistError, PlaylistStore};

use crate::battery::BatteryStatus;
use crate::config::FrameConfig;
use crate::display::{BackingStore, FrameBuffer, RefreshSequencer};
use crate::error::CycleError;
use crate::render::{render_photo, RenderError};
use crate::status::{draw_battery_warning, StatusConsole};

/// What a successful cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shown {
    /// How the playlist was obtained.
    pub load: LoadOutcome,
    /// Playlist position of the photo drawn.
    pub index: u16,
    /// Photo bytes decoded.
    pub bytes: usize,
    /// Where the cursor went afterwards.
    pub advance: Advance,
    /// Battery reading taken before the refresh.
    pub battery: BatteryStatus,
}

/// Summary of one cycle, returned once the sleep request has been made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Reported wake reason.
    pub wake: WakeSource,
    /// Photo shown, or the failure that was reported instead.
    pub result: Result<Shown, CycleError>,
}

/// Collaborators and state for a single wake.
///
/// Built fresh after every reset and consumed by [`run`](Self::run); nothing
/// survives into the next wake except what is on the card.
pub struct WakeCycle<'a, S, B, P, D, Z, M, R, const N: usize> {
    /// Behaviour settings.
    pub config: &'a FrameConfig,
    /// Playlist context, usually a `static` sized for the full capacity.
    pub playlist: &'a mut PlaylistStore<N>,
    /// Memory card.
    pub storage: S,
    /// Frame under construction.
    pub frame: FrameBuffer<B>,
    /// Panel refresh sequencer; also lends its delay to the mount retries.
    pub display: RefreshSequencer<'a, P, D>,
    /// Wake reason and deep sleep.
    pub sleep: Z,
    /// Battery monitor.
    pub power: M,
    /// Shuffle seed source.
    pub entropy: R,
}

impl<S, B, P, D, Z, M, R, const N: usize> WakeCycle<'_, S, B, P, D, Z, M, R, N>
where
    S: Storage,
    B: BackingStore,
    P: PanelBus,
    D: DelayNs,
    Z: SleepScheduler,
    M: PowerMonitor,
    R: EntropySource,
{
    /// Run the whole cycle and request deep sleep.
    ///
    /// On hardware the sleep request does not return.
    pub async fn run(&mut self) -> CycleReport {
        let wake = self.sleep.wake_reason();
        info!("Wake reason: {}", wake.label());

        self.frame.set_rotation(self.config.rotation);
        let mut result = match self.frame.blank() {
            Ok(()) => self.present().await,
            Err(_) => Err(CycleError::Frame),
        };

        if let Err(e) = result {
            error!("Cycle failed: {}", e);
            self.report(e).await;
        }

        if result != Err(CycleError::Frame) {
            if let Err(e) = self.display.display(self.frame.store_mut()).await {
                error!("Refresh failed: {}", e.kind());
                if result.is_ok() {
                    result = Err(CycleError::Display(e.kind()));
                }
            }
        }

        info!("Going to sleep");
        self.sleep.deep_sleep(self.config.sleep_interval_us).await;
        CycleReport { wake, result }
    }

    /// Everything up to, not including, the refresh.
    async fn present(&mut self) -> Result<Shown, CycleError> {
        self.mount().await?;
        self.check_photo_dir().await?;

        let load = self
            .playlist
            .load_or_rebuild(&mut self.storage, &mut self.entropy)
            .await
            .map_err(|e| load_failure(&e))?;
        info!("Playlist {}: {} photos", load_label(load), self.playlist.record().count());
        if self.playlist.record().is_empty() {
            return Err(CycleError::NoPhotos);
        }

        let index = self.playlist.record().cursor();
        let mut file = self
            .playlist
            .open_current(&mut self.storage)
            .await
            .map_err(|e| CycleError::PhotoOpen(e.kind()))?;
        let bytes = match render_photo(&mut file, &mut self.frame, self.config.sample_map).await {
            Ok(bytes) => bytes,
            Err(RenderError::Read(_)) => {
                // The status message goes on a clean frame, not over half a photo.
                warn!("Photo read failed part-way, discarding the partial frame");
                self.frame.blank().map_err(|_| CycleError::Frame)?;
                return Err(CycleError::PhotoOpen("read"));
            }
            Err(RenderError::Frame(_)) => return Err(CycleError::Frame),
        };
        drop(file);

        let advance = self
            .playlist
            .advance(&mut self.storage, &mut self.entropy)
            .await
            .map_err(|e| persist_failure(&e))?;

        let check = self.config.battery_check();
        let battery = check.sample(&mut self.power);
        if let Some(mv) = check.line_to_show(battery) {
            draw_battery_warning(&mut self.frame, mv).map_err(|_| CycleError::Frame)?;
        }

        Ok(Shown { load, index, bytes, advance, battery })
    }

    async fn mount(&mut self) -> Result<(), CycleError> {
        let attempts = self.config.sd_init_attempts.max(1);
        for attempt in 1..=attempts {
            if self.storage.mount().await.is_ok() {
                info!("SD initialized");
                return Ok(());
            }
            warn!("SD initialization error ({} of {})", attempt, attempts);
            if attempt < attempts {
                self.display.delay_mut().delay_ms(self.config.sd_retry_delay_ms).await;
            }
        }
        Err(CycleError::StorageInit { attempts })
    }

    async fn check_photo_dir(&mut self) -> Result<(), CycleError> {
        match self.storage.exists(&self.config.playlist.photo_dir).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(CycleError::PhotoDirectory),
        }
    }

    /// Draw the failure and apply its playlist consequence.
    async fn report(&mut self, failure: CycleError) {
        if let Some(message) = failure.message() {
            if StatusConsole::new().show(&mut self.frame, message).is_err() {
                warn!("Could not draw status message");
            }
        }
        if failure.invalidates_playlist() {
            match self.playlist.invalidate(&mut self.storage).await {
                Ok(()) => info!("Playlist invalidated"),
                Err(e) => error!("Invalidate failed: {}", e.kind()),
            }
        }
    }
}

fn load_failure<E: core::fmt::Debug>(e: &PlaylistError<E>) -> CycleError {
    match e {
        PlaylistError::Scan(_) => CycleError::PhotoDirectory,
        other => CycleError::RecordOpen(other.kind()),
    }
}

fn persist_failure<E: core::fmt::Debug>(e: &PlaylistError<E>) -> CycleError {
    match e {
        PlaylistError::Scan(_) => CycleError::PhotoDirectory,
        other => CycleError::Persist(other.kind()),
    }
}

const fn load_label(load: LoadOutcome) -> &'static str {
    match load {
        LoadOutcome::Loaded => "loaded",
        LoadOutcome::Rebuilt => "rebuilt",
        LoadOutcome::Recovered => "recovered",
    }
}
