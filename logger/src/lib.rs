#![no_std]

//! Logging facade shared by the workspace crates.
//!
//! The backend is picked by this crate's own `defmt` and `log` features, so
//! dependents only forward their features here. With no backend enabled the
//! macros still type-check their arguments but emit nothing.

#[cfg(feature = "defmt")]
#[doc(hidden)]
pub use defmt as __defmt;

#[cfg(feature = "log")]
#[doc(hidden)]
pub use log as __log;

#[cfg(feature = "defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! __emit_defmt {
    ($level:ident, $($args:tt)*) => {
        $crate::__defmt::$level!($($args)*)
    };
}

#[cfg(not(feature = "defmt"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __emit_defmt {
    ($level:ident, $($args:tt)*) => {};
}

#[cfg(feature = "log")]
#[doc(hidden)]
#[macro_export]
macro_rules! __emit_log {
    ($level:ident, $($args:tt)*) => {
        $crate::__log::$level!($($args)*)
    };
}

#[cfg(all(not(feature = "log"), not(feature = "defmt")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __emit_log {
    ($level:ident, $($args:tt)*) => {
        let _ = ::core::format_args!($($args)*);
    };
}

#[cfg(all(not(feature = "log"), feature = "defmt"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __emit_log {
    ($level:ident, $($args:tt)*) => {};
}

#[macro_export]
macro_rules! trace {
    ($($args:tt)*) => {{
        $crate::__emit_defmt!(trace, $($args)*);
        $crate::__emit_log!(trace, $($args)*);
    }};
}

#[macro_export]
macro_rules! debug {
    ($($args:tt)*) => {{
        $crate::__emit_defmt!(debug, $($args)*);
        $crate::__emit_log!(debug, $($args)*);
    }};
}

#[macro_export]
macro_rules! info {
    ($($args:tt)*) => {{
        $crate::__emit_defmt!(info, $($args)*);
        $crate::__emit_log!(info, $($args)*);
    }};
}

#[macro_export]
macro_rules! warn {
    ($($args:tt)*) => {{
        $crate::__emit_defmt!(warn, $($args)*);
        $crate::__emit_log!(warn, $($args)*);
    }};
}

#[macro_export]
macro_rules! error {
    ($($args:tt)*) => {{
        $crate::__emit_defmt!(error, $($args)*);
        $crate::__emit_log!(error, $($args)*);
    }};
}
