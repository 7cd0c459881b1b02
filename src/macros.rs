//! Conditional tracing support.
//!
//! Every macro here expands to nothing unless the `tracing` feature is
//! enabled, so call sites need no `cfg` of their own. Use them as
//! statements.

/// Enter a tracing span for a pipeline stage (when the `tracing` feature is
/// enabled). When disabled, this is a no-op and the compiler eliminates it.
macro_rules! trace_stage {
    ($name:expr) => {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("list_builder_stage", stage = $name).entered();
    };
}

macro_rules! log_trace {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::trace!($($arg)+);
    };
}

macro_rules! log_debug {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::debug!($($arg)+);
    };
}

macro_rules! log_warn {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::warn!($($arg)+);
    };
}

macro_rules! log_error {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        tracing::error!($($arg)+);
    };
}
