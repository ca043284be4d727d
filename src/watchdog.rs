//! The watchdog loop
//!
//! Every tick runs each registered monitor in order and enforces a
//! "N strikes, then act" policy per monitor:
//! - A passing monitor has its strikes reset
//! - A violating monitor gains a strike
//! - Past `max_strikes`, the handler runs; success ends the loop
//!
//! At most one handler invocation happens per tick. The first monitor to
//! exceed its strikes wins and later monitors are not evaluated that tick.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use state_machines::state_machine;

use crate::diagnostics::{DiagnosticHook, NoDiagnostics};
use crate::error::Error;
use crate::handler::{Handler, NullHandler};
use crate::monitor::MonitorSet;
use crate::reporter::{EventReporter, LogReporter, StopReason};
use crate::settings::Settings;
use crate::toggles::{StaticToggles, Toggles};

state_machine! {
    name: WatchdogMachine,
    dynamic: true,
    initial: Idle,
    states: [Idle, Running, Stopped],
    events {
        start {
            transition: { from: Idle, to: Running }
        }
        stop {
            transition: { from: Running, to: Stopped }
        }
    }
}

/// Watchdog lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

impl Lifecycle {
    /// Parse lifecycle from the machine's state name
    fn from_state(s: &str) -> Self {
        match s {
            "Running" => Lifecycle::Running,
            "Stopped" => Lifecycle::Stopped,
            _ => Lifecycle::Idle,
        }
    }
}

/// Everything the loop needs, built before `run()`
pub struct Configuration {
    /// Interval between ticks
    pub sleep_time: Duration,
    /// Remediation once a monitor runs out of strikes
    pub handler: Arc<dyn Handler>,
    /// Event sink
    pub event_reporter: Box<dyn EventReporter>,
    /// Registered monitors
    pub monitors: MonitorSet,
    /// Runs on every strikes-exceeded event, before the handler
    pub diagnostics: Box<dyn DiagnosticHook>,
}

impl Configuration {
    /// Copy loop settings from a settings file
    pub fn apply(&mut self, settings: &Settings) {
        self.sleep_time = settings.sleep_time();
    }

    /// Sleep interval in seconds, as reported in events
    pub fn sleep_time_seconds(&self) -> f64 {
        self.sleep_time.as_secs_f64()
    }

    /// Check the configuration can drive the loop
    pub fn validate(&self) -> crate::Result<()> {
        if self.sleep_time.is_zero() {
            return Err(Error::ConfigValidation(
                "sleep_time must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            sleep_time: Duration::from_secs(60),
            handler: Arc::new(NullHandler),
            event_reporter: Box::new(LogReporter::new()),
            monitors: MonitorSet::new(),
            diagnostics: Box::new(NoDiagnostics),
        }
    }
}

/// Suspends the loop between ticks
pub trait Pause: Send {
    fn pause(&mut self, duration: Duration);
}

/// Sleeps for the interval, waking early when a stop is requested
pub struct InterruptiblePause {
    wake: Receiver<()>,
}

impl Pause for InterruptiblePause {
    fn pause(&mut self, duration: Duration) {
        let _ = self.wake.recv_timeout(duration);
    }
}

/// Cooperative stop request for a watchdog
#[derive(Debug, Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake: Sender<()>,
}

impl StopHandle {
    /// Ask the loop to exit at the top of its next iteration
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.wake.try_send(());
    }

    /// Check if stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// The memory watchdog
pub struct Watchdog {
    configuration: Configuration,
    toggles: Arc<dyn Toggles>,
    pause: Box<dyn Pause>,
    stop: StopHandle,
    machine: DynamicWatchdogMachine<()>,
}

impl Watchdog {
    /// Create a watchdog with a default configuration
    pub fn new() -> Self {
        let (wake_tx, wake_rx) = channel::bounded(1);
        Self {
            configuration: Configuration::default(),
            toggles: Arc::new(StaticToggles::default()),
            pause: Box::new(InterruptiblePause { wake: wake_rx }),
            stop: StopHandle {
                stopped: Arc::new(AtomicBool::new(false)),
                wake: wake_tx,
            },
            machine: WatchdogMachine::new(()).into_dynamic(),
        }
    }

    /// Use the given toggle source
    pub fn with_toggles(mut self, toggles: impl Toggles + 'static) -> Self {
        self.toggles = Arc::new(toggles);
        self
    }

    /// Replace the sleep between ticks
    pub fn with_pause(mut self, pause: impl Pause + 'static) -> Self {
        self.pause = Box::new(pause);
        self
    }

    /// Adjust the configuration
    pub fn configure<F: FnOnce(&mut Configuration)>(&mut self, f: F) {
        f(&mut self.configuration);
    }

    /// Current configuration
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Get stop handle for external control
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request the loop to stop
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Current lifecycle state
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_state(self.machine.current_state())
    }

    /// Run the loop on the current thread until stopped or handled
    ///
    /// A watchdog runs once; calling this again returns an error. A zero
    /// sleep interval is rejected before anything is reported.
    pub fn run(&mut self) -> crate::Result<StopReason> {
        self.configuration.validate()?;

        if let Err(e) = self.machine.handle(WatchdogMachineEvent::Start) {
            return Err(Error::Lifecycle(format!(
                "cannot start from {}: {:?}",
                self.machine.current_state(),
                e
            )));
        }

        let sleep_time_s = self.configuration.sleep_time_seconds();
        let handler_class = self.handler().name().to_string();
        self.configuration
            .event_reporter
            .started(&handler_class, sleep_time_s);

        let reason = self.run_loop();

        let handler_class = self.handler().name().to_string();
        self.configuration
            .event_reporter
            .stopped(&handler_class, sleep_time_s, reason);

        self.machine
            .handle(WatchdogMachineEvent::Stop)
            .map_err(|e| Error::Lifecycle(format!("cannot stop: {:?}", e)))?;

        Ok(reason)
    }

    /// Run the loop on a dedicated thread
    pub fn spawn(mut self) -> crate::Result<WatchdogThread> {
        let stop = self.stop_handle();
        let join = thread::Builder::new()
            .name("memwatch".to_string())
            .spawn(move || self.run())
            .map_err(Error::Spawn)?;
        Ok(WatchdogThread { stop, join })
    }

    fn run_loop(&mut self) -> StopReason {
        loop {
            if self.stop.is_stopped() {
                return StopReason::BackgroundTaskStopped;
            }

            if self.configuration.monitors.is_empty() {
                return StopReason::MonitorsNotConfigured;
            }

            if self.toggles.watchdog_enabled() && self.tick() {
                return StopReason::SuccessfullyHandled;
            }

            self.pause.pause(self.configuration.sleep_time);
        }
    }

    /// Handler in effect right now; the null handler when enforcement is off
    fn handler(&self) -> &dyn Handler {
        select_handler(
            &self.configuration.handler,
            self.toggles.enforcement_enabled(),
        )
    }

    /// One pass over the monitors; returns whether a handler succeeded
    fn tick(&mut self) -> bool {
        let handler = select_handler(
            &self.configuration.handler,
            self.toggles.enforcement_enabled(),
        );
        let sleep_time_s = self.configuration.sleep_time_seconds();
        let reporter = &self.configuration.event_reporter;

        let mut exceeded = None;
        for (idx, monitor) in self.configuration.monitors.iter_mut().enumerate() {
            let result = monitor.call();
            if !result.threshold_violated {
                continue;
            }

            reporter.threshold_violated(monitor.name());

            if monitor.strikes_exceeded() {
                reporter.strikes_exceeded(
                    monitor.name(),
                    handler.name(),
                    sleep_time_s,
                    monitor.strikes(),
                    monitor.max_strikes(),
                    &result.payload,
                );
                exceeded = Some(idx);
                break;
            }
        }

        let Some(idx) = exceeded else {
            return false;
        };
        let Some(monitor) = self.configuration.monitors.get_mut(idx) else {
            return false;
        };

        self.configuration.diagnostics.strikes_exceeded(monitor.name());
        let handled = handler.call();
        monitor.reset_strikes();
        handled
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

fn select_handler(configured: &Arc<dyn Handler>, enforce: bool) -> &dyn Handler {
    if enforce {
        configured.as_ref()
    } else {
        NullHandler::instance()
    }
}

/// A watchdog running on its own thread
pub struct WatchdogThread {
    stop: StopHandle,
    join: JoinHandle<crate::Result<StopReason>>,
}

impl WatchdogThread {
    /// Get stop handle for external control
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Check if the loop has exited
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Request a stop and wait for the loop to exit
    pub fn shutdown(self) -> crate::Result<StopReason> {
        self.stop.stop();
        self.join()
    }

    /// Wait for the loop to exit
    pub fn join(self) -> crate::Result<StopReason> {
        self.join
            .join()
            .map_err(|_| Error::Lifecycle("watchdog thread panicked".into()))?
    }
}
