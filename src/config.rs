// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use crate::report::GaugeDescriptor;

/// Default threshold above which a single group sweep is logged as slow.
pub const DEFAULT_SLOW_SWEEP_THRESHOLD: Duration = Duration::from_millis(10);

/// Configuration for [`MailboxMetrics`](crate::MailboxMetrics).
///
/// The sampling period is deliberately absent: it belongs to whoever drives
/// the ticks, see [`MailboxMetrics::spawn_collector`](crate::MailboxMetrics::spawn_collector).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use mailbox_gauge::Config;
///
/// let config = Config::default()
///     .with_gauge_name("my_app_mailbox_length")
///     .with_slow_sweep_threshold(Some(Duration::from_millis(2)));
/// assert!(config.enabled);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// When `false`, metrics are inert: registrations are accepted and dropped.
    pub enabled: bool,
    /// Gauge handed to the backend initializer.
    pub gauge: GaugeDescriptor,
    /// Sweeps holding a group's lock longer than this are logged as warnings.
    /// `None` disables the check.
    pub slow_sweep_threshold: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            gauge: GaugeDescriptor::default(),
            slow_sweep_threshold: Some(DEFAULT_SLOW_SWEEP_THRESHOLD),
        }
    }
}

impl Config {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_gauge(mut self, gauge: GaugeDescriptor) -> Self {
        self.gauge = gauge;
        self
    }

    pub fn with_gauge_name(mut self, name: impl Into<String>) -> Self {
        self.gauge.name = name.into();
        self
    }

    pub fn with_slow_sweep_threshold(mut self, threshold: Option<Duration>) -> Self {
        self.slow_sweep_threshold = threshold;
        self
    }
}
