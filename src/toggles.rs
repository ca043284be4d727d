//! Operational toggles consulted by the watchdog on every tick

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Two independent switches: detection and remediation
///
/// Queried fresh on each tick, never cached by the watchdog.
pub trait Toggles: Send + Sync {
    /// Run monitors at all
    fn watchdog_enabled(&self) -> bool;

    /// Run the configured handler (otherwise the null handler is used)
    fn enforcement_enabled(&self) -> bool;
}

/// Fixed toggle values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticToggles {
    pub watchdog: bool,
    pub enforce: bool,
}

impl Default for StaticToggles {
    fn default() -> Self {
        Self {
            watchdog: true,
            enforce: true,
        }
    }
}

impl Toggles for StaticToggles {
    fn watchdog_enabled(&self) -> bool {
        self.watchdog
    }

    fn enforcement_enabled(&self) -> bool {
        self.enforce
    }
}

/// Toggles that can be flipped while the watchdog runs
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct SharedToggles {
    watchdog: Arc<AtomicBool>,
    enforce: Arc<AtomicBool>,
}

impl SharedToggles {
    pub fn new(watchdog: bool, enforce: bool) -> Self {
        Self {
            watchdog: Arc::new(AtomicBool::new(watchdog)),
            enforce: Arc::new(AtomicBool::new(enforce)),
        }
    }

    /// Turn detection on or off
    pub fn set_watchdog(&self, enabled: bool) {
        self.watchdog.store(enabled, Ordering::SeqCst);
    }

    /// Turn remediation on or off
    pub fn set_enforce(&self, enabled: bool) {
        self.enforce.store(enabled, Ordering::SeqCst);
    }
}

impl Default for SharedToggles {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl Toggles for SharedToggles {
    fn watchdog_enabled(&self) -> bool {
        self.watchdog.load(Ordering::SeqCst)
    }

    fn enforcement_enabled(&self) -> bool {
        self.enforce.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_defaults() {
        let toggles = StaticToggles::default();
        assert!(toggles.watchdog_enabled());
        assert!(toggles.enforcement_enabled());
    }

    #[test]
    fn test_shared_toggles_visible_across_clones() {
        let toggles = SharedToggles::default();
        let remote = toggles.clone();

        remote.set_watchdog(false);
        assert!(!toggles.watchdog_enabled());
        assert!(toggles.enforcement_enabled());

        remote.set_enforce(false);
        assert!(!toggles.enforcement_enabled());
    }
}
