//! Configuration for the governance runtime

use governance_engine::EngineSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// External check configuration
    #[serde(default)]
    pub checks: CheckConfig,

    /// Collaboration worker configuration
    #[serde(default)]
    pub workers: WorkerConfig,

    /// Deadline configuration
    #[serde(default)]
    pub deadlines: DeadlineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bounds on platform calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Timeout of each platform call in milliseconds
    #[serde(default = "default_check_timeout")]
    pub timeout_ms: u64,

    /// Retries of a failed call before it fails closed
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_check_timeout(),
            retries: default_retries(),
        }
    }
}

/// Collaboration worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Per-collaboration event queue capacity
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Stop workers and their timers once a collaboration is final
    #[serde(default = "default_true")]
    pub idle_gc: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            idle_gc: true,
        }
    }
}

/// Deadline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeadlineConfig {
    /// Give every opened instance a deadline this many seconds out
    #[serde(default)]
    pub test_offset_secs: Option<i64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_check_timeout() -> u64 {
    5000
}

fn default_retries() -> u32 {
    1
}

fn default_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RuntimeConfig {
    /// Load configuration: defaults, then an optional file, then `GOVERN_*`
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&RuntimeConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // GOVERN_CHECKS__TIMEOUT_MS, GOVERN_LOGGING__LEVEL, ...
        builder = builder.add_source(
            config::Environment::with_prefix("GOVERN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.checks.timeout_ms)
    }

    /// Engine settings derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        match self.deadlines.test_offset_secs {
            Some(secs) => {
                EngineSettings::default().with_deadline_override(chrono::Duration::seconds(secs))
            }
            None => EngineSettings::default(),
        }
    }
}
