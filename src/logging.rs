//! Crate-internal logging macros.
//!
//! With the `tracing` feature (on by default) every macro forwards to the matching `tracing`
//! macro under the `event_range_scanner` target. Without it the arguments are only borrowed so
//! that no binding goes unused, and nothing is emitted.

#[doc(hidden)]
#[macro_export]
#[cfg(feature = "tracing")]
macro_rules! __scan_log {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "event_range_scanner", $($arg)*)
    };
}

#[doc(hidden)]
#[macro_export]
#[cfg(not(feature = "tracing"))]
macro_rules! __scan_log {
    ($level:ident, $($arg:tt)*) => {
        $crate::__trace_consume!($($arg)*)
    };
}

#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => { $crate::__scan_log!(error, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::__scan_log!(warn, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => { $crate::__scan_log!(info, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::__scan_log!(debug, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::__scan_log!(trace, $($arg)*) };
}

#[doc(hidden)]
#[macro_export]
#[cfg(not(feature = "tracing"))]
macro_rules! __trace_consume {
    ($field:ident = % $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__trace_consume!($($rest)*); }
    };
    ($field:ident = ? $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__trace_consume!($($rest)*); }
    };
    ($field:ident = $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__trace_consume!($($rest)*); }
    };
    ($field:ident, $($rest:tt)*) => {
        { let _ = &$field; $crate::__trace_consume!($($rest)*); }
    };
    // message with format arguments
    ($lit:literal, $($value:expr),+ $(,)?) => {
        { $(let _ = &$value;)+ }
    };
    ($lit:literal) => { () };
    () => { () };
}
