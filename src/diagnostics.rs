//! Diagnostics captured when a monitor runs out of strikes
//!
//! Runs before the handler, so a dump or report can be scheduled while the
//! offending process is still alive.

/// Hook invoked on every strikes-exceeded event
pub trait DiagnosticHook: Send {
    fn strikes_exceeded(&mut self, monitor_name: &str);
}

/// Hook that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDiagnostics;

impl DiagnosticHook for NoDiagnostics {
    fn strikes_exceeded(&mut self, _monitor_name: &str) {}
}

impl<F> DiagnosticHook for F
where
    F: FnMut(&str) + Send,
{
    fn strikes_exceeded(&mut self, monitor_name: &str) {
        self(monitor_name)
    }
}
