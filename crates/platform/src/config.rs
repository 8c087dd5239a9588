//! Application configuration and constants
//!
//! Branding and version strings shared by the firmware, the simulator and
//! the developer tools.

/// The application name
pub const APP_NAME: &str = "E-Paper Photo Frame";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Development mode banner
pub const fn dev_banner() -> &'static str {
    "E-Paper Photo Frame - Simulator"
}
