//! xtask simulate - run wake cycles against a local card directory.
//!
//! The card directory is used exactly as the firmware would see the SD card:
//! the playlist record is read from and written back to it, so consecutive
//! invocations continue the same shuffle pass.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use firmware::sim::{simulate_wake, HostPower};
use firmware::{CycleReport, FrameConfig, FrameStore};
use platform::power::WakeSource;
use platform::storage_local::LocalFileStorage;
use playlist::FullPlaylist;

/// Command-line switches for a simulation run.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Number of consecutive wakes.
    pub cycles: u32,
    /// Reported battery voltage; `None` simulates a failed sample.
    pub battery_mv: Option<u16>,
    /// Force the frame into emulated external RAM.
    pub external_ram: bool,
}

/// Entry point called from main.rs
pub fn run(card: &Path, config: Option<&Path>, out: &Path, options: Options) -> Result<()> {
    let Options { cycles, battery_mv, external_ram } = options;
    let mut config = load_config(config)?;
    if external_ram {
        config.frame_store = FrameStore::External;
    }
    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("starting tokio runtime")?;

    println!();
    println!("{}", platform::config::dev_banner().cyan().bold());
    println!("{}", format!("Simulating {cycles} wake(s) on {}", card.display()).cyan().bold());
    println!("{}", format!("Frame memory: {:?}", config.frame_store).dimmed());
    println!();

    // One store across all cycles, like the static on hardware; the record
    // itself is reloaded from the card on every wake.
    let mut playlist = Box::new(FullPlaylist::new(config.playlist.clone()));

    for n in 0..cycles {
        let wake = if n == 0 { WakeSource::Cold } else { WakeSource::Timer };
        let power = HostPower { voltage_mv: battery_mv };
        let (report, panel) = runtime.block_on(simulate_wake(
            &config,
            &mut *playlist,
            LocalFileStorage::new(card),
            wake,
            power,
        ));

        let png = out.join(format!("frame-{n:03}.png"));
        panel.save_png(&png).with_context(|| format!("writing {}", png.display()))?;
        print_report(n, &report, &png, panel.refreshes());
    }

    println!();
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<FrameConfig> {
    let Some(path) = path else {
        return Ok(FrameConfig::default());
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config = serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    tracing::info!(path = %path.display(), "loaded frame configuration");
    Ok(config)
}

fn print_report(n: u32, report: &CycleReport, png: &Path, refreshes: u32) {
    let head = format!("  wake {n} ({})", report.wake.label());
    match &report.result {
        Ok(shown) => {
            println!(
                "{} {}",
                head.green(),
                format!(
                    "photo #{} ({} bytes, {:?}), next {:?}, battery {:?}",
                    shown.index, shown.bytes, shown.load, shown.advance, shown.battery
                )
                .dimmed()
            );
        }
        Err(err) => {
            let note = if err.invalidates_playlist() { " (playlist invalidated)" } else { "" };
            println!("{} {}", head.yellow(), format!("{err}{note}").yellow());
        }
    }
    println!("    {} refresh(es) -> {}", refreshes, png.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use firmware::FRAME_BYTES;

    #[test]
    fn two_cycles_write_two_frames_and_a_record() {
        let card = tempfile::tempdir().unwrap();
        let photos = card.path().join("photos");
        std::fs::create_dir(&photos).unwrap();
        std::fs::write(photos.join("one.bin"), vec![0x22u8; FRAME_BYTES]).unwrap();
        std::fs::write(photos.join("two.bin"), vec![0x33u8; FRAME_BYTES]).unwrap();
        let out = tempfile::tempdir().unwrap();

        let options = Options { cycles: 2, battery_mv: Some(4_000), external_ram: false };
        run(card.path(), None, out.path(), options).unwrap();

        assert!(out.path().join("frame-000.png").exists());
        assert!(out.path().join("frame-001.png").exists());
        let record = std::fs::read(card.path().join("config.bin")).unwrap();
        assert!(record.starts_with(playlist::record::MAGIC_FLAT));
        assert!(!card.path().join("config.tmp").exists());
    }

    #[test]
    fn external_ram_renders_the_same_frame() {
        let mut frames = Vec::new();
        for external_ram in [false, true] {
            let card = tempfile::tempdir().unwrap();
            let photos = card.path().join("photos");
            std::fs::create_dir(&photos).unwrap();
            std::fs::write(photos.join("only.bin"), vec![0x46u8; FRAME_BYTES]).unwrap();
            let out = tempfile::tempdir().unwrap();

            let options = Options { cycles: 1, battery_mv: Some(4_000), external_ram };
            run(card.path(), None, out.path(), options).unwrap();

            frames.push(std::fs::read(out.path().join("frame-000.png")).unwrap());
        }
        assert_eq!(frames[0], frames[1]);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.json");
        std::fs::write(
            &path,
            r#"{ "battery_warning_mv": 3700, "frame_store": "external", "playlist": { "photo_dir": "/pics" } }"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();

        assert_eq!(config.battery_warning_mv, 3_700);
        assert_eq!(config.frame_store, FrameStore::External);
        assert_eq!(config.playlist.photo_dir.as_str(), "/pics");
        assert_eq!(config.playlist.record_path.as_str(), "/config.bin");
    }
}
