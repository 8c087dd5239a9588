//! Architecture boundary tests - run with `cargo test -p firmware --test arch_boundaries`
// Architecture test file: expect/unwrap/panic are intentional test mechanisms.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
//!
//! Layering rules checked here:
//!   Rule 1: platform (traits + host backends) never depends on playlist or firmware
//!   Rule 2: playlist depends on platform only, never on firmware or embassy
//!   Rule 3: firmware library code is hardware-agnostic; embassy lives in
//!           `board.rs` and `main.rs` only
//!   Rule 4: the linker script keeps .bss/.data in AXI SRAM
//!
//! Rules 1 and 2 are enforced by the dependency graph; the manifest scans
//! below catch a regression before it reaches `cargo tree`.

const PLATFORM_CARGO: &str = include_str!("../../platform/Cargo.toml");
const PLAYLIST_CARGO: &str = include_str!("../../playlist/Cargo.toml");
const FIRMWARE_CARGO: &str = include_str!("../Cargo.toml");
const MEMORY_X: &str = include_str!("../../../memory.x");

/// The `[dependencies]` table of a manifest, up to the next table header.
fn dependencies(manifest: &str) -> &str {
    let start = manifest.find("[dependencies]").expect("manifest has [dependencies]");
    let rest = &manifest[start + "[dependencies]".len()..];
    let end = rest.find("\n[").unwrap_or(rest.len());
    &rest[..end]
}

#[test]
fn platform_depends_on_no_application_crate() {
    let deps = dependencies(PLATFORM_CARGO);
    assert!(!deps.contains("playlist"), "platform must not depend on playlist");
    assert!(!deps.contains("firmware"), "platform must not depend on firmware");
    assert!(!deps.contains("embassy"), "platform traits must stay executor-agnostic");
}

#[test]
fn playlist_depends_on_platform_only() {
    let deps = dependencies(PLAYLIST_CARGO);
    assert!(deps.contains("platform"));
    assert!(!deps.contains("firmware"), "playlist must not depend on firmware");
    assert!(!deps.contains("embassy"), "playlist must run under any executor");
}

/// Compile-time check: the playlist store accepts any `platform::Storage`.
#[test]
fn playlist_store_is_generic_over_storage() {
    fn _accepts<S: platform::storage::Storage>(_: &mut S) {}
    let mut fs = platform::mocks::MemoryStorage::new();
    _accepts(&mut fs);
}

/// Library modules other than the board glue must not name embassy.
#[test]
fn embassy_is_confined_to_board_and_main() {
    let sources = [
        ("battery.rs", include_str!("../src/battery.rs")),
        ("config.rs", include_str!("../src/config.rs")),
        ("cycle.rs", include_str!("../src/cycle.rs")),
        ("error.rs", include_str!("../src/error.rs")),
        ("render.rs", include_str!("../src/render.rs")),
        ("status.rs", include_str!("../src/status.rs")),
        ("display/backing.rs", include_str!("../src/display/backing.rs")),
        ("display/driver.rs", include_str!("../src/display/driver.rs")),
        ("display/framebuffer.rs", include_str!("../src/display/framebuffer.rs")),
        ("display/sequencer.rs", include_str!("../src/display/sequencer.rs")),
    ];
    for (name, src) in sources {
        assert!(!src.contains("embassy_"), "{name} must not use embassy directly");
    }
}

/// `time-driver-any` lets the HAL pick an arbitrary timer at link time.
#[test]
fn time_driver_is_explicit_tim2() {
    let root = include_str!("../../../Cargo.toml");
    assert!(root.contains("time-driver-tim2"));
    assert!(!root.contains("time-driver-any"));
    assert!(!FIRMWARE_CARGO.contains("time-driver-any"));
}

/// The frame buffer (134 400 bytes) and the full playlist do not fit in
/// 128K of DTCM, so RAM must be the 512K AXI SRAM.
#[test]
fn memory_x_places_ram_in_axi_sram() {
    let ram = MEMORY_X
        .lines()
        .find(|l| l.trim_start().starts_with("RAM "))
        .expect("memory.x defines RAM");
    assert!(ram.contains("0x24000000"), "RAM must start at AXI SRAM: {ram}");
    assert!(ram.contains("512K"), "RAM must span all of AXI SRAM: {ram}");
}

#[test]
fn memory_x_defines_flash_at_boot_address() {
    assert!(MEMORY_X.contains("0x08000000"));
    assert!(MEMORY_X.contains("2048K"));
}

/// Reset flags are cleared by `ResetSleep::take`, so it must run before
/// anything that could reset the MCU.
#[test]
fn main_reads_wake_reason_before_init() {
    let main = include_str!("../src/main.rs");
    let take = main.find("ResetSleep::take()").expect("main takes the reset flags");
    let init = main.find("embassy_stm32::init(").expect("main initialises the HAL");
    assert!(take < init);
    assert!(main.contains("board::build_embassy_config()"), "main must not boot on Config::default()");
}

/// The hardware binary must not be built without its feature set.
#[test]
fn firmware_binary_requires_hardware_feature() {
    let bin = FIRMWARE_CARGO.find("[[bin]]").expect("firmware declares its binary");
    assert!(FIRMWARE_CARGO[bin..].contains("required-features = [\"hardware\"]"));
}
