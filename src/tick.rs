// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::Error;
use crate::registry::GroupRegistry;
use crate::report::Reporter;

/// Statistics for one tick across every group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct TickReport {
    /// Groups swept
    pub groups: usize,
    /// Probes invoked
    pub visited: usize,
    /// Probes removed because their owner was gone or they panicked
    pub pruned: usize,
    /// Probes that panicked
    pub panicked: usize,
    /// Groups whose value the reporter accepted
    pub reported: usize,
    /// Groups whose value the reporter rejected
    pub failed: usize,
    /// Groups whose sweep exceeded the slow-sweep threshold
    pub slow_sweeps: usize,
    /// Wall time of the whole tick
    pub elapsed: Duration,
}

/// Sweeps every group of a registry and reports one value per group.
#[derive(Debug, Clone)]
pub struct TickDriver {
    registry: Arc<GroupRegistry>,
    slow_sweep_threshold: Option<Duration>,
}

impl TickDriver {
    pub fn new(registry: Arc<GroupRegistry>) -> Self {
        Self {
            registry,
            slow_sweep_threshold: None,
        }
    }

    /// Log a warning for any group whose sweep holds its lock longer than `threshold`.
    pub fn with_slow_sweep_threshold(mut self, threshold: Option<Duration>) -> Self {
        self.slow_sweep_threshold = threshold;
        self
    }

    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    /// Runs one tick.
    ///
    /// Every group present when the tick starts is swept exactly once, in no
    /// particular order. A reporter error for one group is logged and counted;
    /// the other groups are still reported.
    pub fn tick(&self, reporter: &dyn Reporter) -> TickReport {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("mailbox_gauge_tick").entered();

        let start = Instant::now();
        let mut report = TickReport::default();

        for group in self.registry.groups() {
            let outcome = group.sweep();
            report.groups += 1;
            report.visited += outcome.visited;
            report.pruned += outcome.pruned;
            report.panicked += outcome.panicked;

            if let Some(threshold) = self.slow_sweep_threshold {
                if outcome.elapsed > threshold {
                    report.slow_sweeps += 1;
                    warn!(
                        "Sweep of mailbox group {} held its lock for {:?} ({} probes); probes must not block",
                        group.labels(),
                        outcome.elapsed,
                        outcome.visited
                    );
                }
            }

            match reporter.report(group.labels(), outcome.total) {
                Ok(()) => report.reported += 1,
                Err(source) => {
                    report.failed += 1;
                    let err = Error::Report {
                        labels: group.labels().canonical_key().to_string(),
                        source,
                    };
                    warn!("{err}");
                }
            }
        }

        report.elapsed = start.elapsed();
        debug!(
            "Mailbox tick elapsed: {:?}, groups: {}, iterated: {}, deleted: {}, failed reports: {}",
            report.elapsed, report.groups, report.visited, report.pruned, report.failed
        );
        #[cfg(feature = "tracing")]
        tracing::debug!(
            tick.groups = report.groups,
            tick.visited = report.visited,
            tick.pruned = report.pruned,
            tick.panicked = report.panicked,
            tick.failed = report.failed,
            tick.slow_sweeps = report.slow_sweeps,
            tick.elapsed_us = report.elapsed.as_micros() as u64,
            "Mailbox tick completed"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::{Attribute, LabelSet, Value};
    use crate::probe::ProbeReading;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(LabelSet, u64)>>,
    }

    impl Recorder {
        fn take(&self) -> HashMap<String, u64> {
            self.seen
                .lock()
                .unwrap()
                .drain(..)
                .map(|(labels, count)| (labels.canonical_key().to_string(), count))
                .collect()
        }
    }

    impl Reporter for Recorder {
        fn report(&self, labels: &LabelSet, count: u64) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push((labels.clone(), count));
            Ok(())
        }
    }

    fn worker() -> LabelSet {
        LabelSet::from([Attribute::new("type", "Worker")])
    }

    #[test]
    fn test_end_to_end_worker_scenario() {
        let registry = Arc::new(GroupRegistry::new());
        let driver = TickDriver::new(registry.clone());
        let recorder = Recorder::default();
        let first_alive = Arc::new(AtomicBool::new(true));

        {
            let first_alive = first_alive.clone();
            registry.register(&worker(), move || ProbeReading {
                size: 2,
                alive: first_alive.load(Ordering::SeqCst),
            });
        }
        registry.register(&worker(), || ProbeReading::alive(4));
        registry.register(&worker(), || ProbeReading::alive(6));

        let report = driver.tick(&recorder);
        assert_eq!(recorder.take(), HashMap::from([("type=Worker,".to_string(), 12)]));
        assert_eq!(report.groups, 1);
        assert_eq!(report.visited, 3);

        first_alive.store(false, Ordering::SeqCst);
        let report = driver.tick(&recorder);
        assert_eq!(recorder.take(), HashMap::from([("type=Worker,".to_string(), 10)]));
        assert_eq!(report.pruned, 1);

        // The pruned probe cannot come back even if its flag flips.
        first_alive.store(true, Ordering::SeqCst);
        let report = driver.tick(&recorder);
        assert_eq!(recorder.take(), HashMap::from([("type=Worker,".to_string(), 10)]));
        assert_eq!(report.visited, 2);
    }

    #[test]
    fn test_every_group_reported_once() {
        let registry = Arc::new(GroupRegistry::new());
        for (actor_type, size) in [("Worker", 1u64), ("Router", 2), ("Cache", 3)] {
            registry.register(
                &LabelSet::from([Attribute::new("type", actor_type)]),
                move || ProbeReading::alive(size),
            );
        }
        let recorder = Recorder::default();

        let report = TickDriver::new(registry).tick(&recorder);
        let seen = recorder.take();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen["type=Worker,"], 1);
        assert_eq!(seen["type=Router,"], 2);
        assert_eq!(seen["type=Cache,"], 3);
        assert_eq!(report.reported, 3);
    }

    #[test]
    fn test_reporter_failure_is_isolated() {
        let registry = Arc::new(GroupRegistry::new());
        for actor_type in ["Worker", "Router", "Cache"] {
            registry.register(
                &LabelSet::from([Attribute::new("type", actor_type)]),
                || ProbeReading::alive(1),
            );
        }
        let accepted = Mutex::new(Vec::new());
        let reporter = |labels: &LabelSet, _count: u64| -> anyhow::Result<()> {
            if labels.get("type") == Some(&Value::from("Router")) {
                anyhow::bail!("exporter rejected value");
            }
            accepted.lock().unwrap().push(labels.canonical_key().to_string());
            Ok(())
        };

        let report = TickDriver::new(registry).tick(&reporter);
        assert_eq!(report.groups, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.reported, 2);
        assert_eq!(accepted.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_group_still_reported() {
        let registry = Arc::new(GroupRegistry::new());
        registry.register(&worker(), ProbeReading::dead);
        let driver = TickDriver::new(registry);
        let recorder = Recorder::default();

        driver.tick(&recorder);
        driver.tick(&recorder);
        // Groups outlive their probes and keep reporting zero.
        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(worker(), 0), (worker(), 0)]);
    }

    #[test]
    fn test_slow_sweep_is_counted() {
        let registry = Arc::new(GroupRegistry::new());
        registry.register(&worker(), || {
            std::thread::sleep(Duration::from_millis(5));
            ProbeReading::alive(1)
        });
        let router = LabelSet::from([Attribute::new("type", "Router")]);
        registry.register(&router, || ProbeReading::alive(2));
        let driver = TickDriver::new(registry).with_slow_sweep_threshold(Some(Duration::from_millis(1)));
        let recorder = Recorder::default();

        let report = driver.tick(&recorder);
        assert_eq!(report.slow_sweeps, 1);
        assert_eq!(report.reported, 2);
        assert!(report.elapsed >= Duration::from_millis(5));
        let seen = recorder.take();
        assert_eq!(seen["type=Worker,"], 1);
        assert_eq!(seen["type=Router,"], 2);
    }

    #[test]
    fn test_slow_sweep_not_counted_without_threshold() {
        let registry = Arc::new(GroupRegistry::new());
        registry.register(&worker(), || {
            std::thread::sleep(Duration::from_millis(5));
            ProbeReading::alive(1)
        });
        let driver = TickDriver::new(registry);

        let report = driver.tick(&Recorder::default());
        assert_eq!(report.slow_sweeps, 0);
        assert_eq!(report.reported, 1);
    }
}
