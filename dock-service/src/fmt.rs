//! Logging macros shared by the dock services
//!
//! Each service logs through `trace!`, `debug!`, `info!`, `warn!` and `error!`. The
//! backend is chosen by the `defmt` or `log` feature of this crate; with neither
//! enabled the arguments are only borrowed so that no unused-variable warnings leak
//! into callers.

#[cfg(all(feature = "log", feature = "defmt", not(doc)))]
compile_error!("features `log` and `defmt` are mutually exclusive");

#[cfg(all(not(doc), feature = "defmt"))]
mod backend {
    /// Forwards a log record to `defmt`
    #[doc(hidden)]
    #[macro_export]
    #[collapse_debuginfo(yes)]
    macro_rules! __dock_log {
        ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {
            ::defmt::$level!($s $(, $x)*)
        };
    }
}

#[cfg(all(not(doc), feature = "log"))]
mod backend {
    /// Forwards a log record to `log`
    #[doc(hidden)]
    #[macro_export]
    #[collapse_debuginfo(yes)]
    macro_rules! __dock_log {
        ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {
            ::log::$level!($s $(, $x)*)
        };
    }
}

#[cfg(any(doc, not(any(feature = "defmt", feature = "log"))))]
mod backend {
    /// Discards a log record
    #[doc(hidden)]
    #[macro_export]
    #[collapse_debuginfo(yes)]
    macro_rules! __dock_log {
        ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {{
            let _ = ($( & $x ),*);
        }};
    }
}

/// Logs a trace message using the selected backend
#[macro_export]
macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => {
        $crate::__dock_log!(trace, $s $(, $x)*)
    };
}

/// Logs a debug message using the selected backend
#[macro_export]
macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        $crate::__dock_log!(debug, $s $(, $x)*)
    };
}

/// Logs an info message using the selected backend
#[macro_export]
macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {
        $crate::__dock_log!(info, $s $(, $x)*)
    };
}

/// Logs a warning using the selected backend
#[macro_export]
macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        $crate::__dock_log!(warn, $s $(, $x)*)
    };
}

/// Logs an error using the selected backend
#[macro_export]
macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => {
        $crate::__dock_log!(error, $s $(, $x)*)
    };
}
