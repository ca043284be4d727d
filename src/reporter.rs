//! Lifecycle and diagnostic events emitted by the watchdog

use crate::monitor::Payload;

/// Why the watchdog loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No monitor was registered
    MonitorsNotConfigured,
    /// A handler reported success
    SuccessfullyHandled,
    /// Stop was requested from outside
    BackgroundTaskStopped,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::MonitorsNotConfigured => "monitors are not configured",
            StopReason::SuccessfullyHandled => "successfully handled",
            StopReason::BackgroundTaskStopped => "background task stopped",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for watchdog events
///
/// Implementations must not panic; reporting is side-effect only.
pub trait EventReporter: Send {
    fn started(&self, handler_class: &str, sleep_time_s: f64);

    fn stopped(&self, handler_class: &str, sleep_time_s: f64, reason: StopReason);

    fn threshold_violated(&self, monitor_name: &str);

    fn strikes_exceeded(
        &self,
        monitor_name: &str,
        handler_class: &str,
        sleep_time_s: f64,
        current_strikes: u32,
        max_strikes: u32,
        payload: &Payload,
    );
}

/// Reporter writing structured `tracing` records
///
/// Every record carries `pid` and `memwatch_*` fields. The monitor payload of
/// `strikes_exceeded` has dynamic keys, so it is emitted as a single JSON
/// object string in `memwatch_payload` rather than as top-level fields.
#[derive(Debug, Clone, Copy)]
pub struct LogReporter {
    pid: u32,
}

impl LogReporter {
    pub fn new() -> Self {
        Self {
            pid: std::process::id(),
        }
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventReporter for LogReporter {
    fn started(&self, handler_class: &str, sleep_time_s: f64) {
        tracing::info!(
            pid = self.pid,
            memwatch_handler_class = handler_class,
            memwatch_sleep_time_s = sleep_time_s,
            "memwatch: started"
        );
    }

    fn stopped(&self, handler_class: &str, sleep_time_s: f64, reason: StopReason) {
        tracing::info!(
            pid = self.pid,
            memwatch_handler_class = handler_class,
            memwatch_sleep_time_s = sleep_time_s,
            memwatch_reason = reason.as_str(),
            "memwatch: stopped"
        );
    }

    fn threshold_violated(&self, monitor_name: &str) {
        tracing::warn!(
            pid = self.pid,
            memwatch_monitor = monitor_name,
            "memwatch: threshold violated"
        );
    }

    fn strikes_exceeded(
        &self,
        monitor_name: &str,
        handler_class: &str,
        sleep_time_s: f64,
        current_strikes: u32,
        max_strikes: u32,
        payload: &Payload,
    ) {
        let payload = serde_json::to_string(payload).unwrap_or_default();
        tracing::warn!(
            pid = self.pid,
            memwatch_monitor = monitor_name,
            memwatch_handler_class = handler_class,
            memwatch_sleep_time_s = sleep_time_s,
            memwatch_cur_strikes = current_strikes,
            memwatch_max_strikes = max_strikes,
            memwatch_payload = %payload,
            "memwatch: strikes exceeded"
        );
    }
}
