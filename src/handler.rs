//! Remediation handlers
//!
//! A handler runs once a monitor exceeds its strike limit. Returning `true`
//! tells the watchdog the problem is being dealt with and it can stop.

use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Remediation action
pub trait Handler: Send + Sync {
    /// Handler class name, included in reported events
    fn name(&self) -> &str;

    /// Run the remediation; `true` means the watchdog should stop
    fn call(&self) -> bool;
}

/// Handler that does nothing and never stops the watchdog
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

static NULL_HANDLER: NullHandler = NullHandler;

impl NullHandler {
    /// Process-wide shared instance
    pub fn instance() -> &'static NullHandler {
        &NULL_HANDLER
    }
}

impl Handler for NullHandler {
    fn name(&self) -> &str {
        "NullHandler"
    }

    fn call(&self) -> bool {
        false
    }
}

/// Sends SIGTERM to a process
#[derive(Debug, Clone, Copy)]
pub struct TermProcessHandler {
    pid: Pid,
}

impl TermProcessHandler {
    pub fn new(pid: i32) -> Self {
        Self {
            pid: Pid::from_raw(pid),
        }
    }

    /// Handler targeting the current process
    pub fn current() -> Self {
        Self { pid: Pid::this() }
    }

    /// Target process ID
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// Deliver SIGTERM to the target
    pub fn signal(&self) -> Result<()> {
        kill(self.pid, Signal::SIGTERM).map_err(|source| Error::Signal {
            pid: self.pid.as_raw(),
            source,
        })
    }
}

impl Handler for TermProcessHandler {
    fn name(&self) -> &str {
        "TermProcessHandler"
    }

    // Delivery is fire-and-forget; a failure is only logged.
    fn call(&self) -> bool {
        if let Err(e) = self.signal() {
            tracing::warn!(error = %e, "memwatch: SIGTERM delivery failed");
        }
        true
    }
}

/// What the worker manager needs to retire a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedProcessOptions {
    /// Worker process to retire
    pub pid: i32,
    /// Time the worker gets to finish in-flight work
    pub graceful_timeout: Option<Duration>,
}

impl ManagedProcessOptions {
    pub fn new(pid: i32) -> Self {
        Self {
            pid,
            graceful_timeout: None,
        }
    }

    /// Set graceful shutdown timeout
    pub fn with_graceful_timeout(mut self, timeout: Duration) -> Self {
        self.graceful_timeout = Some(timeout);
        self
    }
}

/// External process manager able to replace a worker
pub trait WorkerManager: Send + Sync {
    fn retire(&self, options: &ManagedProcessOptions) -> Result<()>;
}

/// Requests sent to the worker manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Gracefully stop the worker and start a replacement
    Retire {
        pid: i32,
        graceful_timeout: Option<Duration>,
    },
}

/// Channel-backed [`WorkerManager`] usable from the watchdog thread
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    sender: mpsc::Sender<WorkerEvent>,
}

impl WorkerHandle {
    /// Create a handle and the receiving end for the manager
    ///
    /// A capacity of zero is raised to one.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WorkerEvent>) {
        let (sender, rx) = mpsc::channel(capacity.max(1));
        (Self { sender }, rx)
    }

    /// Ask the manager to retire a worker (blocking version for sync code)
    pub fn retire_blocking(&self, options: &ManagedProcessOptions) -> Result<()> {
        self.sender
            .blocking_send(WorkerEvent::Retire {
                pid: options.pid,
                graceful_timeout: options.graceful_timeout,
            })
            .map_err(|_| Error::WorkerManager("worker manager channel closed".into()))
    }
}

impl WorkerManager for WorkerHandle {
    fn retire(&self, options: &ManagedProcessOptions) -> Result<()> {
        self.retire_blocking(options)
    }
}

/// Asks the worker manager to retire the current worker
pub struct ManagedProcessHandler {
    manager: Arc<dyn WorkerManager>,
    options: ManagedProcessOptions,
}

impl ManagedProcessHandler {
    pub fn new(manager: Arc<dyn WorkerManager>, options: ManagedProcessOptions) -> Self {
        Self { manager, options }
    }

    pub fn options(&self) -> &ManagedProcessOptions {
        &self.options
    }
}

impl Handler for ManagedProcessHandler {
    fn name(&self) -> &str {
        "ManagedProcessHandler"
    }

    fn call(&self) -> bool {
        match self.manager.retire(&self.options) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    pid = self.options.pid,
                    error = %e,
                    "memwatch: failed to request worker retirement"
                );
                false
            }
        }
    }
}

/// Handler selection from settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Detect and report only
    #[default]
    Null,
    /// SIGTERM the watched process
    TermProcess,
    /// Ask the worker manager to retire the watched process
    ManagedProcess,
}

impl HandlerKind {
    /// Build the handler for `pid`
    ///
    /// `ManagedProcess` requires a worker manager.
    pub fn build(
        self,
        pid: i32,
        manager: Option<Arc<dyn WorkerManager>>,
    ) -> Result<Arc<dyn Handler>> {
        let handler: Arc<dyn Handler> = match self {
            HandlerKind::Null => Arc::new(NullHandler),
            HandlerKind::TermProcess => Arc::new(TermProcessHandler::new(pid)),
            HandlerKind::ManagedProcess => {
                let manager = manager.ok_or_else(|| {
                    Error::ConfigValidation(
                        "managed_process handler requires a worker manager".into(),
                    )
                })?;
                Arc::new(ManagedProcessHandler::new(
                    manager,
                    ManagedProcessOptions::new(pid),
                ))
            }
        };
        Ok(handler)
    }
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerKind::Null => write!(f, "null"),
            HandlerKind::TermProcess => write!(f, "term_process"),
            HandlerKind::ManagedProcess => write!(f, "managed_process"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Command;

    #[test]
    fn test_null_handler_does_nothing() {
        let handler = NullHandler::instance();
        assert!(!handler.call());
        assert_eq!(handler.name(), "NullHandler");
        assert!(std::ptr::eq(handler, NullHandler::instance()));
    }

    #[test]
    fn test_term_process_handler_sends_sigterm() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let handler = TermProcessHandler::new(child.id() as i32);

        assert!(handler.call());

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc_sigterm()));
    }

    #[test]
    fn test_term_process_handler_reports_success_on_missing_process() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();

        let handler = TermProcessHandler::new(pid);
        assert!(handler.signal().is_err());
        assert!(handler.call());
    }

    #[test]
    fn test_managed_process_handler_requests_retirement() {
        let (handle, mut rx) = WorkerHandle::channel(4);
        let options = ManagedProcessOptions::new(42).with_graceful_timeout(Duration::from_secs(5));
        let handler = ManagedProcessHandler::new(Arc::new(handle), options);

        assert!(handler.call());
        assert_eq!(
            rx.try_recv().unwrap(),
            WorkerEvent::Retire {
                pid: 42,
                graceful_timeout: Some(Duration::from_secs(5)),
            }
        );
    }

    #[test]
    fn test_worker_handle_zero_capacity() {
        let (handle, mut rx) = WorkerHandle::channel(0);

        handle.retire_blocking(&ManagedProcessOptions::new(7)).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            WorkerEvent::Retire {
                pid: 7,
                graceful_timeout: None,
            }
        );
    }

    #[test]
    fn test_managed_process_handler_fails_when_manager_gone() {
        let (handle, rx) = WorkerHandle::channel(1);
        drop(rx);
        let handler = ManagedProcessHandler::new(Arc::new(handle), ManagedProcessOptions::new(42));

        assert!(!handler.call());
    }

    #[test]
    fn test_handler_kind_build() {
        let null = HandlerKind::Null.build(1, None).unwrap();
        assert_eq!(null.name(), "NullHandler");

        let term = HandlerKind::TermProcess.build(1, None).unwrap();
        assert_eq!(term.name(), "TermProcessHandler");

        assert!(HandlerKind::ManagedProcess.build(1, None).is_err());

        let (handle, _rx) = WorkerHandle::channel(1);
        let managed = HandlerKind::ManagedProcess
            .build(1, Some(Arc::new(handle)))
            .unwrap();
        assert_eq!(managed.name(), "ManagedProcessHandler");
    }

    #[test]
    fn test_handler_kind_display() {
        assert_eq!(HandlerKind::Null.to_string(), "null");
        assert_eq!(HandlerKind::TermProcess.to_string(), "term_process");
        assert_eq!(HandlerKind::ManagedProcess.to_string(), "managed_process");
    }

    fn libc_sigterm() -> i32 {
        Signal::SIGTERM as i32
    }
}
