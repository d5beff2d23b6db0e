use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Polling and script-run settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Milliseconds between two checks of a pending condition.
    pub check_interval_ms: u64,
    /// Longest span of timer time a script run will drive before giving up
    /// on pending waits.
    pub budget_ms: u64,
    /// Sleep through timer deadlines instead of jumping over them.
    pub realtime: bool,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 10,
            budget_ms: 30_000,
            realtime: false,
        }
    }
}

impl WaitConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval_ms == 0 {
            bail!("check_interval_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn with_check_interval(mut self, ms: u64) -> Self {
        self.check_interval_ms = ms;
        self
    }

    pub fn with_budget(mut self, ms: u64) -> Self {
        self.budget_ms = ms;
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}
