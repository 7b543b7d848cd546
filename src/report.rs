// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use crate::label::LabelSet;

/// Describes the gauge the telemetry backend should create for mailbox lengths.
///
/// The core never creates instruments itself. The descriptor is handed to the
/// backend initializer passed to [`MailboxMetrics::try_init`](crate::MailboxMetrics::try_init).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaugeDescriptor {
    pub name: String,
    pub description: String,
    pub unit: String,
}

impl GaugeDescriptor {
    pub const DEFAULT_NAME: &'static str = "actor_mailbox_length";
    pub const DEFAULT_DESCRIPTION: &'static str = "Actor's Mailbox Length";
    pub const DEFAULT_UNIT: &'static str = "1";
}

impl Default for GaugeDescriptor {
    fn default() -> Self {
        Self {
            name: Self::DEFAULT_NAME.to_string(),
            description: Self::DEFAULT_DESCRIPTION.to_string(),
            unit: Self::DEFAULT_UNIT.to_string(),
        }
    }
}

/// Receives one aggregated mailbox length per label group on every tick.
///
/// Formatting, batching and transmission are entirely up to the implementor.
/// An error is logged by the tick driver and the remaining groups are still
/// reported; the value is not retried until the next tick.
///
/// Implemented for closures `Fn(&LabelSet, u64) -> anyhow::Result<()>`.
pub trait Reporter: Send + Sync {
    fn report(&self, labels: &LabelSet, count: u64) -> anyhow::Result<()>;
}

impl<F> Reporter for F
where
    F: Fn(&LabelSet, u64) -> anyhow::Result<()> + Send + Sync,
{
    fn report(&self, labels: &LabelSet, count: u64) -> anyhow::Result<()> {
        self(labels, count)
    }
}
