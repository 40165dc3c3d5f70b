//! Logging shims.
//!
//! Forwards to `defmt` (feature `defmt-0-3`) and/or `log` (feature `log`). With neither
//! enabled the arguments are only borrowed, so nothing is formatted or linked in.

macro_rules! trace {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt-0-3")]
        ::defmt::trace!($fmt $(, $arg)*);
        #[cfg(feature = "log")]
        ::log::trace!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "defmt-0-3", feature = "log")))]
        {
            $( let _ = &$arg; )*
        }
    }};
}
pub(crate) use trace;

macro_rules! debug {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt-0-3")]
        ::defmt::debug!($fmt $(, $arg)*);
        #[cfg(feature = "log")]
        ::log::debug!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "defmt-0-3", feature = "log")))]
        {
            $( let _ = &$arg; )*
        }
    }};
}
pub(crate) use debug;

macro_rules! info {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt-0-3")]
        ::defmt::info!($fmt $(, $arg)*);
        #[cfg(feature = "log")]
        ::log::info!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "defmt-0-3", feature = "log")))]
        {
            $( let _ = &$arg; )*
        }
    }};
}
pub(crate) use info;

macro_rules! warni {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt-0-3")]
        ::defmt::warn!($fmt $(, $arg)*);
        #[cfg(feature = "log")]
        ::log::warn!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "defmt-0-3", feature = "log")))]
        {
            $( let _ = &$arg; )*
        }
    }};
}
pub(crate) use warni as warn;

macro_rules! error {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        #[cfg(feature = "defmt-0-3")]
        ::defmt::error!($fmt $(, $arg)*);
        #[cfg(feature = "log")]
        ::log::error!($fmt $(, $arg)*);
        #[cfg(not(any(feature = "defmt-0-3", feature = "log")))]
        {
            $( let _ = &$arg; )*
        }
    }};
}
pub(crate) use error;
