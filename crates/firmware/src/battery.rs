//! Battery check before the refresh.

use platform::power::PowerMonitor;
use platform::{info, warn};

/// Result of one battery sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryStatus {
    /// At or above the warning level.
    Healthy(u16),
    /// Below the warning level.
    Low(u16),
    /// The monitor could not take a reading.
    Unknown,
}

/// Warning threshold and display policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryCheck {
    /// Readings below this many millivolts are low.
    pub warning_mv: u16,
    /// Show the voltage line on every refresh, low or not.
    pub always_show: bool,
}

impl BatteryCheck {
    /// Sample `power` and classify the reading.
    pub fn sample<P: PowerMonitor>(&self, power: &mut P) -> BatteryStatus {
        match power.battery_voltage_mv() {
            Some(mv) if mv < self.warning_mv => {
                warn!("Battery low: {} mV", mv);
                BatteryStatus::Low(mv)
            }
            Some(mv) => {
                info!("Battery level: {} mV", mv);
                BatteryStatus::Healthy(mv)
            }
            None => {
                warn!("Battery level unavailable");
                BatteryStatus::Unknown
            }
        }
    }

    /// Voltage to draw on the panel, if any.
    pub fn line_to_show(&self, status: BatteryStatus) -> Option<u16> {
        match status {
            BatteryStatus::Low(mv) => Some(mv),
            BatteryStatus::Healthy(mv) if self.always_show => Some(mv),
            BatteryStatus::Healthy(_) | BatteryStatus::Unknown => None,
        }
    }
}
