//! Power management abstraction
//!
//! Provides interfaces for deep sleep scheduling, wake-reason reporting,
//! battery sampling and the hardware entropy source used to seed shuffles.

/// Deep-sleep scheduler.
///
/// On hardware [`deep_sleep`](Self::deep_sleep) powers the MCU down and
/// never returns; the next wake restarts the program from reset. Host
/// implementations record the request and return.
pub trait SleepScheduler {
    /// Why the device woke up this time.
    fn wake_reason(&mut self) -> WakeSource;

    /// Arm the wake timer for `duration_us` and enter deep sleep.
    fn deep_sleep(&mut self, duration_us: u64) -> impl core::future::Future<Output = ()>;
}

/// Wake-up source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeSource {
    /// Power-on or reset, not a wake from sleep.
    Cold,
    /// Sleep timer expired.
    Timer,
    /// External wake pin (RTC_IO / button).
    External,
    /// Touch pad.
    Touch,
    /// Ultra-low-power coprocessor.
    Coprocessor,
}

impl WakeSource {
    /// Short label for log lines.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cold => "cold boot",
            Self::Timer => "timer",
            Self::External => "external signal",
            Self::Touch => "touchpad",
            Self::Coprocessor => "ULP program",
        }
    }
}

/// Power state monitor
pub trait PowerMonitor {
    /// Get battery voltage (mV), or `None` when it cannot be sampled.
    fn battery_voltage_mv(&mut self) -> Option<u16>;
}

/// Uncorrelated physical noise source (floating ADC pin, RNG peripheral).
///
/// There is no real-time clock, so time cannot seed the shuffle.
pub trait EntropySource {
    /// Take one sample.
    fn sample(&mut self) -> u32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_labels_are_distinct() {
        let all = [
            WakeSource::Cold,
            WakeSource::Timer,
            WakeSource::External,
            WakeSource::Touch,
            WakeSource::Coprocessor,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in all.iter().skip(i.saturating_add(1)) {
                assert_ne!(a.label(), b.label());
            }
        }
    }
}
