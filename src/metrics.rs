// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Mailbox length metrics for an actor system.
//!
//! [`MailboxMetrics`] is what an actor system holds: mailboxes register a
//! [`Probe`] together with their [`LabelSet`], and the telemetry backend pulls
//! one aggregated mailbox length per label set on every tick, either by calling
//! [`MailboxMetrics::collect`] from its own scheduler or through a periodic
//! [`Collector`].
//!
//! # Example
//!
//! ```rust
//! use mailbox_gauge::{Config, LabelSet, MailboxMetrics, ProbeReading};
//!
//! struct Worker;
//!
//! let metrics = MailboxMetrics::new(Config::default(), |labels: &LabelSet, count: u64| -> anyhow::Result<()> {
//!     println!("{labels} => {count}");
//!     Ok(())
//! });
//!
//! let labels = MailboxMetrics::common_labels::<Worker>("node-1:8090");
//! metrics.register(&labels, || ProbeReading::alive(3));
//!
//! let report = metrics.collect().unwrap();
//! assert_eq!(report.groups, 1);
//! ```

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, trace};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::label::{actor_type_name, Attribute, LabelSet, ACTOR_TYPE_LABEL, ADDRESS_LABEL};
use crate::probe::Probe;
use crate::registry::GroupRegistry;
use crate::report::{GaugeDescriptor, Reporter};
use crate::tick::{TickDriver, TickReport};

struct Inner {
    config: Config,
    driver: TickDriver,
    reporter: Arc<dyn Reporter>,
}

impl Inner {
    fn registry(&self) -> &Arc<GroupRegistry> {
        self.driver.registry()
    }
}

/// Mailbox metrics wiring for one actor system.
///
/// Cheap to clone; clones share the same registry and reporter. A disabled
/// instance is inert: [`register`](MailboxMetrics::register) accepts and drops
/// probes, and nothing is ever sampled.
#[derive(Clone)]
pub struct MailboxMetrics {
    inner: Option<Arc<Inner>>,
}

impl MailboxMetrics {
    /// Creates enabled metrics reporting through `reporter`.
    ///
    /// Returns a disabled instance when `config.enabled` is `false`.
    pub fn new<R>(config: Config, reporter: R) -> Self
    where
        R: Reporter + 'static,
    {
        Self::with_reporter(config, Arc::new(reporter))
    }

    pub fn with_reporter(config: Config, reporter: Arc<dyn Reporter>) -> Self {
        if !config.enabled {
            debug!("Mailbox metrics disabled by configuration");
            return Self::disabled();
        }

        let driver = TickDriver::new(Arc::new(GroupRegistry::new()))
            .with_slow_sweep_threshold(config.slow_sweep_threshold);
        Self {
            inner: Some(Arc::new(Inner {
                config,
                driver,
                reporter,
            })),
        }
    }

    /// Creates inert metrics.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Initializes the backend gauge with `init` and wires the resulting reporter.
    ///
    /// If `init` fails the error is logged and inert metrics are returned, so an
    /// unavailable backend never fails actor system startup.
    pub fn try_init<R, F>(config: Config, init: F) -> Self
    where
        R: Reporter + 'static,
        F: FnOnce(&GaugeDescriptor) -> anyhow::Result<R>,
    {
        if !config.enabled {
            return Self::disabled();
        }

        match init(&config.gauge) {
            Ok(reporter) => {
                info!("Mailbox length gauge {} initialized", config.gauge.name);
                Self::new(config, reporter)
            }
            Err(source) => {
                let err = Error::BackendInit { source };
                error!("{err}; mailbox metrics disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Returns the active configuration, or `None` when disabled.
    pub fn config(&self) -> Option<&Config> {
        self.inner.as_deref().map(|inner| &inner.config)
    }

    /// Returns the registry, or `None` when disabled.
    pub fn registry(&self) -> Option<&Arc<GroupRegistry>> {
        self.inner.as_deref().map(Inner::registry)
    }

    /// Registers a mailbox probe under `labels`. Fire-and-forget.
    pub fn register<P: Probe>(&self, labels: &LabelSet, probe: P) {
        match self.inner.as_deref() {
            Some(inner) => inner.registry().register(labels, probe),
            None => trace!("Mailbox metrics disabled, dropping probe for {}", labels),
        }
    }

    /// Runs one tick, reporting every group. `None` when disabled.
    pub fn collect(&self) -> Option<TickReport> {
        self.inner
            .as_deref()
            .map(|inner| inner.driver.tick(inner.reporter.as_ref()))
    }

    /// Spawns a tokio task that calls [`collect`](MailboxMetrics::collect) every `period`.
    ///
    /// The first tick fires immediately. Missed ticks are skipped rather than
    /// bunched up. Returns `Ok(None)` when disabled.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidInterval`] if `period` is zero.
    /// * [`Error::Runtime`] if called outside a tokio runtime.
    pub fn spawn_collector(&self, period: Duration) -> Result<Option<Collector>> {
        let Some(inner) = self.inner.clone() else {
            return Ok(None);
        };
        if period.is_zero() {
            return Err(Error::InvalidInterval { interval: period });
        }
        let handle = Handle::try_current().map_err(|e| Error::Runtime {
            details: e.to_string(),
        })?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = interval.tick() => {
                        inner.driver.tick(inner.reporter.as_ref());
                    }
                }
            }
            debug!("Mailbox collector stopped");
        });

        debug!("Mailbox collector started with period {:?}", period);
        Ok(Some(Collector {
            stop: Some(stop_tx),
            task: Some(task),
        }))
    }

    /// The standard label set for a mailbox: `{address, actortype}`.
    ///
    /// `actortype` is the short type name of `A`, see [`actor_type_name`].
    pub fn common_labels<A: ?Sized>(address: impl Into<String>) -> LabelSet {
        LabelSet::from([
            Attribute::new(ADDRESS_LABEL, address.into()),
            Attribute::new(ACTOR_TYPE_LABEL, actor_type_name::<A>()),
        ])
    }
}

impl std::fmt::Debug for MailboxMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailboxMetrics")
            .field("enabled", &self.is_enabled())
            .field("groups", &self.registry().map(|r| r.len()))
            .finish()
    }
}

/// Handle to a periodic collector task.
///
/// Dropping the handle stops the task without waiting for it.
#[derive(Debug)]
pub struct Collector {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Collector {
    /// Stops the collector and waits for its task to finish.
    ///
    /// A tick already in progress completes first.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop) = self.stop.take() {
            // The task may already be gone; joining below reports why.
            let _ = stop.send(());
        }
        match self.task.take() {
            Some(task) => task.await.map_err(|source| Error::Join { source }),
            None => Ok(()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
