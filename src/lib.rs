// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! # mailbox-gauge: Mailbox Length Sampling for Actor Systems
//!
//! `mailbox-gauge` tracks how many messages are waiting in the mailboxes of a
//! running actor system and reports one aggregated count per group of actors,
//! for example per actor type and system address.
//!
//! ## Features
//!
//! - **Cheap registration**: a mailbox registers a [`Probe`] once, when it is
//!   created. There is no unregister call.
//! - **Label groups**: probes are grouped by a [`LabelSet`], compared through a
//!   canonical key that ignores attribute order.
//! - **Lazy cleanup**: a probe whose mailbox is gone reports `alive == false`
//!   and is removed during the next sweep, in the same pass that sums the live
//!   probes.
//! - **Fine-grained locking**: each group has its own lock; the map of groups
//!   is lock-free.
//! - **Backend agnostic**: values leave through a [`Reporter`]; the backend
//!   decides how often to tick and how to export.
//!
//! ## Core Concepts
//!
//! - **[`LabelSet`]** / **[`Attribute`]**: identify a group of mailboxes.
//! - **[`Probe`]**: reports the current size of one mailbox and whether its
//!   owner is still alive. Probes run under their group's lock and must never
//!   block.
//! - **[`SampleGroup`]**: the probes sharing one canonical key, plus the
//!   sample-and-prune [`sweep`](SampleGroup::sweep).
//! - **[`GroupRegistry`]**: canonical key to group, created on first use.
//! - **[`TickDriver`]**: sweeps every group and hands the totals to a
//!   [`Reporter`].
//! - **[`MailboxMetrics`]**: the object an actor system holds, tying the
//!   above together with a [`Config`].
//!
//! ## Getting Started
//!
//! ```rust
//! use mailbox_gauge::{probe, Config, LabelSet, MailboxMetrics};
//! use tokio::sync::mpsc;
//!
//! struct Worker;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let metrics = MailboxMetrics::new(Config::default(), |labels: &LabelSet, count: u64| -> anyhow::Result<()> {
//!         println!("mailbox length {labels} = {count}");
//!         Ok(())
//!     });
//!
//!     // A mailbox registers itself when it is created.
//!     let (tx, rx) = mpsc::channel::<String>(32);
//!     let labels = MailboxMetrics::common_labels::<Worker>("node-1:8090");
//!     metrics.register(&labels, probe::bounded_mailbox(&tx));
//!
//!     tx.send("hello".to_string()).await?;
//!     assert_eq!(metrics.collect().map(|r| r.reported), Some(1));
//!
//!     // Once the mailbox is gone the probe is pruned on the next tick.
//!     drop((tx, rx));
//!     assert_eq!(metrics.collect().map(|r| r.pruned), Some(1));
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod group;
mod label;
mod metrics;
pub mod probe;
mod registry;
mod report;
mod tick;

pub use config::{Config, DEFAULT_SLOW_SWEEP_THRESHOLD};
pub use error::{Error, Result};
pub use group::{SampleGroup, SweepOutcome};
pub use label::{
    actor_type_name, canonicalize, Attribute, LabelSet, Labels, Value, ACTOR_TYPE_LABEL,
    ADDRESS_LABEL,
};
pub use metrics::{Collector, MailboxMetrics};
pub use probe::{Probe, ProbeReading};
pub use registry::GroupRegistry;
pub use report::{GaugeDescriptor, Reporter};
pub use tick::{TickDriver, TickReport};

pub use mailbox_gauge_derive::Labels;
