use crate::cadence::{Cadence, DEFAULT_LONG_BREAK_INTERVAL};
use crate::error::{PomoError, Result};
use crate::{io, paths};
use crate::timer::{Durations, IntervalTimer};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// TimerConfig
// ---------------------------------------------------------------------------

/// Interval lengths are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_pomodoro_secs")]
    pub pomodoro_secs: u32,
    #[serde(default = "default_short_break_secs")]
    pub short_break_secs: u32,
    #[serde(default = "default_long_break_secs")]
    pub long_break_secs: u32,
    #[serde(default)]
    pub auto_advance: bool,
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
}

fn default_pomodoro_secs() -> u32 {
    25 * 60
}

fn default_short_break_secs() -> u32 {
    5 * 60
}

fn default_long_break_secs() -> u32 {
    15 * 60
}

fn default_long_break_interval() -> u32 {
    DEFAULT_LONG_BREAK_INTERVAL
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            pomodoro_secs: default_pomodoro_secs(),
            short_break_secs: default_short_break_secs(),
            long_break_secs: default_long_break_secs(),
            auto_advance: false,
            long_break_interval: default_long_break_interval(),
        }
    }
}

impl TimerConfig {
    pub fn durations(&self) -> Result<Durations> {
        Durations::new(
            self.pomodoro_secs,
            self.short_break_secs,
            self.long_break_secs,
        )
    }

    /// A fresh timer armed for a focus interval, with the cadence policy
    /// attached when auto-advance is on.
    pub fn build_timer(&self) -> Result<IntervalTimer> {
        let timer = IntervalTimer::new(self.durations()?);
        if self.auto_advance {
            Ok(timer.with_cadence(Cadence::new(self.long_break_interval)))
        } else {
            Ok(timer)
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

/// Retry policy for durable session writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl SyncConfig {
    /// Delay before retry number `attempt` (1-based): doubles each time,
    /// capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            timer: TimerConfig::default(),
            server: ServerConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

const LONG_INTERVAL_WARN_SECS: u32 = 4 * 60 * 60;

impl Config {
    /// Read `.pomo/config.yaml`. Absent fields take their defaults.
    pub fn load(root: &Path) -> Result<Self> {
        io::read_yaml(&paths::config_path(root))?.ok_or(PomoError::NotInitialized)
    }

    /// Like `load`, but an uninitialized root yields the defaults.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(PomoError::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        io::write_yaml(&paths::config_path(root), self)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        let durations = [
            ("timer.pomodoro_secs", self.timer.pomodoro_secs),
            ("timer.short_break_secs", self.timer.short_break_secs),
            ("timer.long_break_secs", self.timer.long_break_secs),
        ];
        for (field, secs) in durations {
            if secs == 0 {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{field} must be a positive number of seconds"),
                });
            } else if secs > LONG_INTERVAL_WARN_SECS {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("{field}={secs} is longer than 4 hours (is it in minutes?)"),
                });
            }
        }

        if self.timer.auto_advance && self.timer.long_break_interval == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "timer.long_break_interval must be at least 1 when auto_advance is on"
                    .to_string(),
            });
        }

        if self.sync.max_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "sync.max_attempts must be at least 1".to_string(),
            });
        }

        if self.sync.initial_backoff_ms > self.sync.max_backoff_ms {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "sync.initial_backoff_ms ({}) exceeds sync.max_backoff_ms ({})",
                    self.sync.initial_backoff_ms, self.sync.max_backoff_ms
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
