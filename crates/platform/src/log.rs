//! Logging facade.
//!
//! Hardware builds log through `defmt` (RTT), host builds through `tracing`.
//! With neither feature enabled the macros type-check their arguments and
//! compile to nothing.
//!
//! Format strings must stick to plain `{}` placeholders so that both
//! backends accept them.
//!
//! ```ignore
//! platform::info!("scanned {} photos", count);
//! ```

#[doc(hidden)]
#[cfg(feature = "defmt")]
pub use defmt as __defmt;

#[doc(hidden)]
#[cfg(all(feature = "tracing", not(feature = "defmt")))]
pub use tracing as __tracing;

#[cfg(feature = "defmt")]
mod backend {
    /// Log at TRACE level.
    #[macro_export]
    macro_rules! trace { ($($arg:tt)*) => { $crate::log::__defmt::trace!($($arg)*) }; }
    /// Log at DEBUG level.
    #[macro_export]
    macro_rules! debug { ($($arg:tt)*) => { $crate::log::__defmt::debug!($($arg)*) }; }
    /// Log at INFO level.
    #[macro_export]
    macro_rules! info { ($($arg:tt)*) => { $crate::log::__defmt::info!($($arg)*) }; }
    /// Log at WARN level.
    #[macro_export]
    macro_rules! warn { ($($arg:tt)*) => { $crate::log::__defmt::warn!($($arg)*) }; }
    /// Log at ERROR level.
    #[macro_export]
    macro_rules! error { ($($arg:tt)*) => { $crate::log::__defmt::error!($($arg)*) }; }
}

#[cfg(all(feature = "tracing", not(feature = "defmt")))]
mod backend {
    /// Log at TRACE level.
    #[macro_export]
    macro_rules! trace { ($($arg:tt)*) => { $crate::log::__tracing::trace!($($arg)*) }; }
    /// Log at DEBUG level.
    #[macro_export]
    macro_rules! debug { ($($arg:tt)*) => { $crate::log::__tracing::debug!($($arg)*) }; }
    /// Log at INFO level.
    #[macro_export]
    macro_rules! info { ($($arg:tt)*) => { $crate::log::__tracing::info!($($arg)*) }; }
    /// Log at WARN level.
    #[macro_export]
    macro_rules! warn { ($($arg:tt)*) => { $crate::log::__tracing::warn!($($arg)*) }; }
    /// Log at ERROR level.
    #[macro_export]
    macro_rules! error { ($($arg:tt)*) => { $crate::log::__tracing::error!($($arg)*) }; }
}

#[cfg(not(any(feature = "defmt", feature = "tracing")))]
mod backend {
    /// Log at TRACE level (disabled).
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {{ if false { let _ = ::core::format_args!($($arg)*); } }};
    }
    /// Log at DEBUG level (disabled).
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {{ if false { let _ = ::core::format_args!($($arg)*); } }};
    }
    /// Log at INFO level (disabled).
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {{ if false { let _ = ::core::format_args!($($arg)*); } }};
    }
    /// Log at WARN level (disabled).
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {{ if false { let _ = ::core::format_args!($($arg)*); } }};
    }
    /// Log at ERROR level (disabled).
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {{ if false { let _ = ::core::format_args!($($arg)*); } }};
    }
}
