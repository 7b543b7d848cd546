// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Mailbox size probes.
//!
//! A probe is a cheap, non-blocking callable that reports how many messages a
//! single mailbox currently holds and whether its owner is still alive. Probes
//! run while their group's lock is held, so they must never wait on anything.
//! Once a probe reports `alive == false` it is removed by the next sweep; owners
//! never unregister explicitly.

use std::sync::Weak;

use tokio::sync::mpsc;

/// The result of invoking a [`Probe`] once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReading {
    /// Current number of messages in the mailbox
    pub size: u64,
    /// `false` once the owning mailbox is gone
    pub alive: bool,
}

impl ProbeReading {
    /// A reading from a live mailbox holding `size` messages.
    pub const fn alive(size: u64) -> Self {
        Self { size, alive: true }
    }

    /// A reading signalling that the owner has terminated.
    pub const fn dead() -> Self {
        Self {
            size: 0,
            alive: false,
        }
    }
}

impl From<(u64, bool)> for ProbeReading {
    fn from((size, alive): (u64, bool)) -> Self {
        Self { size, alive }
    }
}

/// Reports the current size and liveness of one registered mailbox.
///
/// Implemented for every `FnMut() -> ProbeReading + Send + 'static` closure.
pub trait Probe: Send + 'static {
    fn sample(&mut self) -> ProbeReading;
}

impl<F> Probe for F
where
    F: FnMut() -> ProbeReading + Send + 'static,
{
    #[inline]
    fn sample(&mut self) -> ProbeReading {
        self()
    }
}

/// Probe for a bounded tokio mailbox.
///
/// Only a weak sender is retained, so the probe never keeps the mailbox open.
/// The reported size is the number of occupied slots
/// (`max_capacity - capacity`). The probe reports dead once every strong sender
/// has been dropped or the receiving side has been closed.
pub fn bounded_mailbox<T>(sender: &mpsc::Sender<T>) -> impl Probe
where
    T: Send + 'static,
{
    let weak = sender.downgrade();
    move || match weak.upgrade() {
        Some(sender) if !sender.is_closed() => {
            let occupied = sender.max_capacity().saturating_sub(sender.capacity());
            ProbeReading::alive(occupied as u64)
        }
        _ => ProbeReading::dead(),
    }
}

/// Probe for a mailbox owned through an `Arc`.
///
/// `len` is called with the owner while it is still alive; once the last
/// strong reference is dropped the probe reports dead.
pub fn from_weak<T, F>(owner: Weak<T>, len: F) -> impl Probe
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> usize + Send + 'static,
{
    move || match owner.upgrade() {
        Some(owner) => ProbeReading::alive(len(&owner) as u64),
        None => ProbeReading::dead(),
    }
}
