//! Monitors and strike tracking
//!
//! A monitor inspects some resource of the current process and reports
//! whether its threshold is violated. The watchdog keeps one
//! [`MonitorState`] per registered monitor, holding the strike counter.

use std::collections::BTreeMap;

use crate::settings::Settings;

/// Diagnostic key/value data attached to a monitor result
pub type Payload = BTreeMap<String, serde_json::Value>;

/// Outcome of a single monitor invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorResult {
    /// Whether the monitored threshold is currently exceeded
    pub threshold_violated: bool,
    /// Extra data forwarded to the `strikes_exceeded` event
    pub payload: Payload,
}

impl MonitorResult {
    /// Threshold respected, no payload
    pub fn ok() -> Self {
        Self::default()
    }

    /// Threshold violated, empty payload
    pub fn violated() -> Self {
        Self {
            threshold_violated: true,
            payload: Payload::new(),
        }
    }

    /// Attach a payload entry
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// A pluggable resource check
///
/// Monitors run on the watchdog thread and should return quickly; a slow
/// monitor stalls the whole tick.
pub trait Monitor: Send {
    /// Name used in reported events
    fn name(&self) -> &str;

    /// Measure and compare against the threshold
    fn call(&mut self) -> MonitorResult;
}

/// A registered monitor with its strike counter
pub struct MonitorState {
    monitor: Box<dyn Monitor>,
    max_strikes: u32,
    strikes: u32,
}

impl MonitorState {
    fn new(monitor: Box<dyn Monitor>, max_strikes: u32) -> Self {
        Self {
            monitor,
            max_strikes,
            strikes: 0,
        }
    }

    /// Monitor name
    pub fn name(&self) -> &str {
        self.monitor.name()
    }

    /// Strikes tolerated before the handler runs
    pub fn max_strikes(&self) -> u32 {
        self.max_strikes
    }

    /// Consecutive violations seen so far
    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    /// Invoke the monitor and update the strike counter
    pub fn call(&mut self) -> MonitorResult {
        let result = self.monitor.call();
        if result.threshold_violated {
            self.strikes = self.strikes.saturating_add(1);
        } else {
            self.strikes = 0;
        }
        result
    }

    /// True once strikes went past `max_strikes`
    pub fn strikes_exceeded(&self) -> bool {
        self.strikes > self.max_strikes
    }

    /// Clear the strike counter
    pub fn reset_strikes(&mut self) {
        self.strikes = 0;
    }
}

impl std::fmt::Debug for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorState")
            .field("name", &self.name())
            .field("max_strikes", &self.max_strikes)
            .field("strikes", &self.strikes)
            .finish()
    }
}

/// Ordered collection of monitors, iterated in registration order
#[derive(Debug, Default)]
pub struct MonitorSet {
    monitors: Vec<MonitorState>,
}

impl MonitorSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitor with a fresh strike counter
    pub fn push<M: Monitor + 'static>(&mut self, monitor: M, max_strikes: u32) {
        self.monitors
            .push(MonitorState::new(Box::new(monitor), max_strikes));
    }

    /// Register a monitor built by `factory`
    pub fn push_with<M, F>(&mut self, factory: F, max_strikes: u32)
    where
        M: Monitor + 'static,
        F: FnOnce() -> M,
    {
        self.push(factory(), max_strikes);
    }

    /// Register a monitor unless the settings disable it
    ///
    /// `max_strikes` from the settings file wins over `default_max_strikes`.
    /// Returns whether the monitor was registered.
    pub fn push_configured<M: Monitor + 'static>(
        &mut self,
        settings: &Settings,
        monitor: M,
        default_max_strikes: u32,
    ) -> bool {
        let overrides = settings.monitor(monitor.name());
        if overrides.is_some_and(|m| !m.enabled) {
            return false;
        }
        let max_strikes = overrides
            .and_then(|m| m.max_strikes)
            .unwrap_or(default_max_strikes);
        self.push(monitor, max_strikes);
        true
    }

    /// Check whether any monitor is registered
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Number of registered monitors
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    /// Iterate in registration order
    pub fn iter(&self) -> std::slice::Iter<'_, MonitorState> {
        self.monitors.iter()
    }

    /// Iterate mutably in registration order
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, MonitorState> {
        self.monitors.iter_mut()
    }

    /// Get a monitor by registration index
    pub fn get(&self, idx: usize) -> Option<&MonitorState> {
        self.monitors.get(idx)
    }

    /// Get a monitor mutably by registration index
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut MonitorState> {
        self.monitors.get_mut(idx)
    }
}
