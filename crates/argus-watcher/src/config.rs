//! Watcher configuration.
//!
//! Validated once at registration time; a watcher with an invalid
//! configuration is never started. Cron expressions use the six-field form
//! with a leading seconds column.

use std::str::FromStr;

use cron::Schedule;
use serde::{Deserialize, Serialize};

use crate::error::WatcherError;

/// Default watch schedule: hourly.
pub const DEFAULT_CRON: &str = "0 0 * * * *";

/// Default stats-collection schedule: every minute.
pub const DEFAULT_STATS_CRON: &str = "0 * * * * *";

/// Default backend port.
pub const DEFAULT_PORT: u16 = 2375;

/// Per-host watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherConfig {
    /// Backend host address.
    pub host: String,

    /// Backend port.
    pub port: u16,

    /// Reference to the credentials used to reach the backend, resolved by
    /// the transport layer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,

    /// Watch schedule.
    pub cron: String,

    /// Whether workloads without an explicit opt-in label are watched.
    pub watch_by_default: bool,

    /// Whether stopped workloads are listed too.
    pub watch_all: bool,

    /// Whether to listen to the backend's live event stream.
    pub watch_events: bool,

    /// Whether to collect runtime stats on a secondary schedule.
    pub watch_stats: bool,

    /// Stats-collection schedule.
    pub stats_cron: String,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            credentials: None,
            cron: DEFAULT_CRON.to_string(),
            watch_by_default: true,
            watch_all: false,
            watch_events: true,
            watch_stats: true,
            stats_cron: DEFAULT_STATS_CRON.to_string(),
        }
    }
}

impl WatcherConfig {
    /// Creates a configuration for a host with default schedules.
    #[must_use]
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Sets the watch schedule.
    #[must_use]
    pub fn with_cron(mut self, cron: impl Into<String>) -> Self {
        self.cron = cron.into();
        self
    }

    /// Sets the backend port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the credentials reference.
    #[must_use]
    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Sets whether unlabeled workloads are watched.
    #[must_use]
    pub const fn with_watch_by_default(mut self, watch_by_default: bool) -> Self {
        self.watch_by_default = watch_by_default;
        self
    }

    /// Sets whether stopped workloads are listed too.
    #[must_use]
    pub const fn with_watch_all(mut self, watch_all: bool) -> Self {
        self.watch_all = watch_all;
        self
    }

    /// Sets whether the live event stream is consumed.
    #[must_use]
    pub const fn with_watch_events(mut self, watch_events: bool) -> Self {
        self.watch_events = watch_events;
        self
    }

    /// Sets whether runtime stats are collected.
    #[must_use]
    pub const fn with_watch_stats(mut self, watch_stats: bool) -> Self {
        self.watch_stats = watch_stats;
        self
    }

    /// Parses and validates the configuration's schedules.
    ///
    /// # Errors
    ///
    /// Returns an error when the host is empty or a cron expression cannot
    /// be parsed.
    pub fn validate(&self, watcher: &str) -> Result<Schedules, WatcherError> {
        if self.host.is_empty() {
            return Err(WatcherError::InvalidConfiguration {
                watcher: watcher.to_string(),
                message: "host is required".to_string(),
            });
        }
        let watch = parse_cron(&self.cron)?;
        let stats = if self.watch_stats {
            Some(parse_cron(&self.stats_cron)?)
        } else {
            None
        };
        Ok(Schedules { watch, stats })
    }
}

/// Parsed schedules of a validated configuration.
#[derive(Debug, Clone)]
pub struct Schedules {
    /// Primary watch schedule.
    pub watch: Schedule,

    /// Stats-collection schedule, when enabled.
    pub stats: Option<Schedule>,
}

fn parse_cron(expression: &str) -> Result<Schedule, WatcherError> {
    Schedule::from_str(expression).map_err(|e| WatcherError::InvalidCron {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}
