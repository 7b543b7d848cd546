// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use log::debug;
use papaya::HashMap;

use crate::group::SampleGroup;
use crate::label::LabelSet;
use crate::probe::Probe;

/// Maps canonical label keys to their [`SampleGroup`].
///
/// Groups are created lazily on the first registration for a key and live as
/// long as the registry. The map itself is lock-free; each group carries its own
/// lock, so producers only ever contend with producers sharing their label set.
///
/// The registry is an ordinary value. Whoever builds the actor system owns it
/// and hands clones of the surrounding `Arc` (or of
/// [`MailboxMetrics`](crate::MailboxMetrics)) to the code that registers probes.
pub struct GroupRegistry {
    groups: HashMap<String, Arc<SampleGroup>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self {
            groups: HashMap::new(),
        }
    }

    /// Returns the group for `labels`, creating it if this is the first
    /// registration for its canonical key.
    ///
    /// Concurrent calls with equal label sets always observe the same group.
    pub fn get_or_create(&self, labels: &LabelSet) -> Arc<SampleGroup> {
        let map = self.groups.pin();
        if let Some(group) = map.get(labels.canonical_key()) {
            return group.clone();
        }

        let group = map.get_or_insert_with(labels.canonical_key().to_owned(), || {
            debug!("Creating mailbox sample group {}", labels);
            Arc::new(SampleGroup::new(labels.clone()))
        });
        debug_assert_eq!(group.labels(), labels);
        group.clone()
    }

    /// Registers `probe` under `labels`.
    pub fn register<P: Probe>(&self, labels: &LabelSet, probe: P) {
        self.get_or_create(labels).register(probe);
    }

    /// Returns the group for `labels` if one has been created.
    pub fn get(&self, labels: &LabelSet) -> Option<Arc<SampleGroup>> {
        self.groups.pin().get(labels.canonical_key()).cloned()
    }

    /// Snapshot of every group, in no particular order.
    pub fn groups(&self) -> Vec<Arc<SampleGroup>> {
        self.groups.pin().values().cloned().collect()
    }

    /// Number of distinct label groups.
    pub fn len(&self) -> usize {
        self.groups.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupRegistry")
            .field("groups", &self.len())
            .finish()
    }
}
