//! memwatch - process memory watchdog
//!
//! A background supervisor that periodically runs pluggable monitors against
//! the current process, counts consecutive threshold violations per monitor,
//! and triggers a remediation handler once a monitor runs out of strikes.

pub mod diagnostics;
pub mod error;
pub mod handler;
pub mod monitor;
pub mod reporter;
pub mod settings;
pub mod toggles;
pub mod watchdog;

pub use diagnostics::{DiagnosticHook, NoDiagnostics};
pub use error::{Error, Result};
pub use handler::{
    Handler, HandlerKind, ManagedProcessHandler, ManagedProcessOptions, NullHandler,
    TermProcessHandler, WorkerEvent, WorkerHandle, WorkerManager,
};
pub use monitor::{Monitor, MonitorResult, MonitorSet, MonitorState, Payload};
pub use reporter::{EventReporter, LogReporter, StopReason};
pub use settings::Settings;
pub use toggles::{SharedToggles, StaticToggles, Toggles};
pub use watchdog::{
    Configuration, InterruptiblePause, Lifecycle, Pause, StopHandle, Watchdog, WatchdogThread,
};
