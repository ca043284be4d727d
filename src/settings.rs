//! Settings file parsing for memwatch
//!
//! Parses `memwatch.toml` using serde

use crate::error::{Error, Result};
use crate::handler::HandlerKind;
use crate::toggles::SharedToggles;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load settings from a file
pub fn load(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let settings: Settings = toml::from_str(&content)?;
    settings.validate()?;

    Ok(settings)
}

/// Root settings structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Loop settings
    #[serde(default)]
    pub watchdog: WatchdogSettings,

    /// Per-monitor overrides, keyed by monitor name
    #[serde(default)]
    pub monitors: BTreeMap<String, MonitorSettings>,
}

impl Settings {
    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.watchdog.sleep_time_seconds == 0 {
            return Err(Error::ConfigValidation(
                "sleep_time_seconds must be greater than zero".into(),
            ));
        }

        if self.monitors.keys().any(|name| name.trim().is_empty()) {
            return Err(Error::ConfigValidation("Monitor name cannot be empty".into()));
        }

        Ok(())
    }

    /// Overrides for a monitor, if any
    pub fn monitor(&self, name: &str) -> Option<&MonitorSettings> {
        self.monitors.get(name)
    }

    /// Interval between ticks
    pub fn sleep_time(&self) -> Duration {
        Duration::from_secs(self.watchdog.sleep_time_seconds)
    }

    /// Live toggles seeded from the file defaults
    pub fn toggles(&self) -> SharedToggles {
        SharedToggles::new(self.watchdog.enabled, self.watchdog.enforce)
    }
}

/// `[watchdog]` table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchdogSettings {
    /// Seconds between ticks
    #[serde(default = "default_sleep_time_seconds")]
    pub sleep_time_seconds: u64,

    /// Remediation to run once a monitor runs out of strikes
    #[serde(default)]
    pub handler: HandlerKind,

    /// Initial state of the detection toggle
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Initial state of the remediation toggle
    #[serde(default = "default_true")]
    pub enforce: bool,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            sleep_time_seconds: default_sleep_time_seconds(),
            handler: HandlerKind::default(),
            enabled: true,
            enforce: true,
        }
    }
}

/// `[monitors.<name>]` table
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorSettings {
    /// Register the monitor at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Override for the monitor's default strike limit
    #[serde(default)]
    pub max_strikes: Option<u32>,
}

fn default_sleep_time_seconds() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toggles::Toggles;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.watchdog.sleep_time_seconds, 60);
        assert_eq!(settings.watchdog.handler, HandlerKind::Null);
        assert!(settings.watchdog.enabled);
        assert!(settings.watchdog.enforce);
        assert!(settings.monitors.is_empty());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
[watchdog]
sleep_time_seconds = 15
handler = "managed_process"
enabled = true
enforce = false

[monitors.rss_memory_limit]
max_strikes = 5

[monitors.heap_fragmentation]
enabled = false
"#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert_eq!(settings.sleep_time(), Duration::from_secs(15));
        assert_eq!(settings.watchdog.handler, HandlerKind::ManagedProcess);

        let rss = settings.monitor("rss_memory_limit").unwrap();
        assert!(rss.enabled);
        assert_eq!(rss.max_strikes, Some(5));
        assert!(!settings.monitor("heap_fragmentation").unwrap().enabled);
        assert!(settings.monitor("unknown").is_none());

        let toggles = settings.toggles();
        assert!(toggles.watchdog_enabled());
        assert!(!toggles.enforcement_enabled());
    }

    #[test]
    fn test_zero_sleep_rejected() {
        let settings: Settings = toml::from_str("[watchdog]\nsleep_time_seconds = 0\n").unwrap();
        assert!(matches!(settings.validate(), Err(Error::ConfigValidation(_))));
    }

    #[test]
    fn test_unknown_handler_rejected() {
        let result: std::result::Result<Settings, _> =
            toml::from_str("[watchdog]\nhandler = \"reboot\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[watchdog]\nsleep_time_seconds = 30\nhandler = \"term_process\"").unwrap();

        let settings = load(file.path()).unwrap();
        assert_eq!(settings.watchdog.sleep_time_seconds, 30);
        assert_eq!(settings.watchdog.handler, HandlerKind::TermProcess);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/memwatch.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }
}
