//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.
//! Durations are written in humantime form (`"30s"`, `"2m"`).
//!
//! ```toml
//! [dispatch]
//! request_timeout = "30s"
//!
//! [rebalance]
//! candidate_limit = 10
//! tasks_per_user = 3
//! overloaded_users = 2
//! run_time_limit = "20s"
//!
//! [escalation]
//! max_tasks_per_run = 500
//! run_time_limit = "20s"
//!
//! [bulk]
//! max_task_ids = 500
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub dispatch: DispatchConfig,
    pub rebalance: RebalanceConfig,
    pub escalation: EscalationConfig,
    pub bulk: BulkConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Wall-clock limit for a single operation.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceConfig {
    /// Unassigned ready tasks considered per run.
    pub candidate_limit: usize,
    /// Tasks suggested per user, for both recommendation kinds.
    pub tasks_per_user: usize,
    /// How many of the most overloaded users get redistribution suggestions.
    pub overloaded_users: usize,
    /// Workload scan limit; must stay below `dispatch.request_timeout`.
    #[serde(with = "humantime_serde")]
    pub run_time_limit: Duration,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            candidate_limit: 10,
            tasks_per_user: 3,
            overloaded_users: 2,
            run_time_limit: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    pub max_tasks_per_run: usize,
    #[serde(with = "humantime_serde")]
    pub run_time_limit: Duration,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_run: 500,
            run_time_limit: Duration::from_secs(20),
        }
    }
}

/// Limits shared by bulk assignment and batch reminders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    pub max_task_ids: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self { max_task_ids: 500 }
    }
}

impl RulesConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: RulesConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("dispatch.request_timeout", self.dispatch.request_timeout.is_zero()),
            ("rebalance.candidate_limit", self.rebalance.candidate_limit == 0),
            ("rebalance.tasks_per_user", self.rebalance.tasks_per_user == 0),
            ("rebalance.run_time_limit", self.rebalance.run_time_limit.is_zero()),
            ("escalation.max_tasks_per_run", self.escalation.max_tasks_per_run == 0),
            ("escalation.run_time_limit", self.escalation.run_time_limit.is_zero()),
            ("bulk.max_task_ids", self.bulk.max_task_ids == 0),
        ];
        if let Some((name, _)) = checks.iter().find(|(_, is_zero)| *is_zero) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }

        // Scans must stop on their own before the dispatcher aborts them.
        let scan_limits = [
            ("rebalance.run_time_limit", self.rebalance.run_time_limit),
            ("escalation.run_time_limit", self.escalation.run_time_limit),
        ];
        match scan_limits
            .iter()
            .find(|(_, limit)| *limit >= self.dispatch.request_timeout)
        {
            Some((name, _)) => Err(ConfigError::Invalid(format!(
                "{name} must be shorter than dispatch.request_timeout"
            ))),
            None => Ok(()),
        }
    }
}
