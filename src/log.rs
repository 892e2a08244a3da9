use std::sync::atomic::{AtomicBool, Ordering};

static EVENT_TRACE: AtomicBool = AtomicBool::new(false);

#[inline(always)]
pub fn is_event_trace_enabled() -> bool {
    EVENT_TRACE.load(Ordering::SeqCst)
}

/// Log every queued, routed and processed event at `debug` level.
pub fn enable_event_trace() {
    EVENT_TRACE.store(true, Ordering::SeqCst)
}

pub fn disable_event_trace() {
    EVENT_TRACE.store(false, Ordering::SeqCst)
}

/// Install `env_logger` as the `log` backend (filter taken from `RUST_LOG`).
///
/// Does nothing if the host already installed a logger.
pub fn init() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .try_init();
}

#[macro_export]
macro_rules! event_trace {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::log::is_event_trace_enabled() {
            log::debug!(target: $target, $($arg)+)
        }
    };
    ($($arg:tt)+) => {
        if $crate::log::is_event_trace_enabled() {
            log::debug!($($arg)+)
        }
    };
}
