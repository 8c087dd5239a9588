//! Frame configuration
//!
//! Compiled-in defaults match the deployed frames. Host builds with the
//! `serde` feature can load a JSON file over them; every field is optional
//! there.

use playlist::PlaylistConfig;

use crate::battery::BatteryCheck;
use crate::display::{FrameStore, RefreshTiming, Rotation};
use crate::render::SampleMap;

/// 15 minutes between wakes.
pub const DEFAULT_SLEEP_INTERVAL_US: u64 = 15 * 60 * 1_000_000;

/// Everything one wake cycle needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct FrameConfig {
    /// Photo directory, record paths and rebuild policy.
    pub playlist: PlaylistConfig,
    /// Deep-sleep duration after each cycle.
    pub sleep_interval_us: u64,
    /// Battery readings below this are reported on screen.
    pub battery_warning_mv: u16,
    /// Report the battery voltage on every refresh.
    pub always_show_battery: bool,
    /// Card mount attempts before giving up.
    pub sd_init_attempts: u8,
    /// Pause between mount attempts.
    pub sd_retry_delay_ms: u32,
    /// Canvas orientation.
    pub rotation: Rotation,
    /// Memory that holds the frame while it is drawn.
    pub frame_store: FrameStore,
    /// Give up on the BUSY line after this long.
    pub busy_timeout_ms: u32,
    /// Fixed wait per refresh phase when no BUSY line is wired.
    pub busy_fallback_ms: u32,
    /// Deep-sleep the panel controller after refreshing.
    pub power_down_after_refresh: bool,
    /// Sample mapping for the attached panel.
    pub sample_map: SampleMap,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            playlist: PlaylistConfig::default(),
            sleep_interval_us: DEFAULT_SLEEP_INTERVAL_US,
            battery_warning_mv: 3_600,
            always_show_battery: false,
            sd_init_attempts: 5,
            sd_retry_delay_ms: 100,
            rotation: Rotation::Deg0,
            frame_store: FrameStore::Local,
            busy_timeout_ms: RefreshTiming::DEFAULT_TIMEOUT_MS,
            busy_fallback_ms: RefreshTiming::MIN_FALLBACK_MS,
            power_down_after_refresh: false,
            sample_map: SampleMap::Direct,
        }
    }
}

impl FrameConfig {
    /// BUSY timing for the refresh sequencer.
    pub fn refresh_timing(&self) -> RefreshTiming {
        RefreshTiming::new(self.busy_timeout_ms, self.busy_fallback_ms)
    }

    /// Battery policy.
    pub fn battery_check(&self) -> BatteryCheck {
        BatteryCheck { warning_mv: self.battery_warning_mv, always_show: self.always_show_battery }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = FrameConfig::default();
        assert_eq!(c.sleep_interval_us, 900_000_000);
        assert_eq!(c.sd_init_attempts, 5);
        assert_eq!(c.refresh_timing().busy_fallback_ms(), 500);
        assert_eq!(c.playlist.photo_dir.as_str(), "/photos");
        assert_eq!(c.frame_store, FrameStore::Local);
    }

    #[test]
    fn fallback_cannot_be_configured_below_floor() {
        let c = FrameConfig { busy_fallback_ms: 50, ..FrameConfig::default() };
        assert_eq!(c.refresh_timing().busy_fallback_ms(), 500);
    }
}
