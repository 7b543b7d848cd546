// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::warn;

use crate::label::LabelSet;
use crate::probe::{Probe, ProbeReading};

/// Result of a single [`SampleGroup::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct SweepOutcome {
    /// Sum of the sizes reported by live probes
    pub total: u64,
    /// Number of probes invoked
    pub visited: usize,
    /// Number of probes removed, including panicked ones
    pub pruned: usize,
    /// Number of probes that panicked while being sampled
    pub panicked: usize,
    /// Time the group's lock was held
    pub elapsed: Duration,
}

/// The probes registered under one canonical label key.
///
/// Registration and sweeping share a single lock. A sweep holds it for the
/// whole traversal, so probes must be cheap; groups never contend with each
/// other.
pub struct SampleGroup {
    labels: LabelSet,
    probes: Mutex<Vec<Box<dyn Probe>>>,
}

impl SampleGroup {
    pub fn new(labels: LabelSet) -> Self {
        Self {
            labels,
            probes: Mutex::new(Vec::new()),
        }
    }

    /// Returns the label set shared by every probe in this group.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Appends a probe. Registering the same mailbox twice counts it twice.
    pub fn register<P: Probe>(&self, probe: P) {
        self.register_boxed(Box::new(probe));
    }

    pub(crate) fn register_boxed(&self, probe: Box<dyn Probe>) {
        self.lock().push(probe);
    }

    /// Number of probes currently registered.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Samples every probe once and removes the ones whose owner is gone.
    ///
    /// Probes are visited front to back. Live probes add their size to the
    /// total and keep their relative order; dead or panicking probes are
    /// dropped in the same pass.
    pub fn sweep(&self) -> SweepOutcome {
        let mut probes = self.lock();
        let start = Instant::now();
        let mut outcome = SweepOutcome::default();

        probes.retain_mut(|probe| {
            outcome.visited += 1;
            match sample_guarded(probe.as_mut(), &self.labels) {
                Some(ProbeReading { size, alive: true }) => {
                    outcome.total = outcome.total.saturating_add(size);
                    true
                }
                Some(_) => {
                    outcome.pruned += 1;
                    false
                }
                None => {
                    outcome.panicked += 1;
                    outcome.pruned += 1;
                    false
                }
            }
        });

        outcome.elapsed = start.elapsed();
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Box<dyn Probe>>> {
        // Probe panics are caught inside sweep, so poisoning only follows a
        // panic in the Vec itself; the collection is still consistent.
        self.probes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SampleGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleGroup")
            .field("labels", &self.labels)
            .field("probes", &self.len())
            .finish()
    }
}

/// Invokes a probe, converting a panic into `None`.
fn sample_guarded(probe: &mut dyn Probe, labels: &LabelSet) -> Option<ProbeReading> {
    match panic::catch_unwind(AssertUnwindSafe(|| probe.sample())) {
        Ok(reading) => Some(reading),
        Err(payload) => {
            warn!(
                "Mailbox probe in group {} panicked and was removed: {}",
                labels,
                panic_message(payload)
            );
            None
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(v) => *v,
        Err(e) => match e.downcast::<&str>() {
            Ok(v) => v.to_string(),
            _ => "Unknown panic occurred which couldn't be coerced to a string".to_string(),
        },
    }
}
