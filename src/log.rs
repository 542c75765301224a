// Diagnostic events, compiled out unless `with-tracing` is enabled.

macro_rules! log_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "with-tracing")]
        {
            ::tracing::debug!($($arg)*);
        }
    };
}

macro_rules! log_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "with-tracing")]
        {
            ::tracing::trace!($($arg)*);
        }
    };
}
