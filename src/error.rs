// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

#[derive(Debug)]
/// Represents errors that can occur while wiring or driving mailbox sampling.
///
/// None of these are produced by registration or by a sweep itself: stale probes
/// are pruned silently, and a failed report is logged and counted in the
/// [`TickReport`](crate::TickReport) rather than aborting the tick.
pub enum Error {
    /// The telemetry backend rejected an aggregated observation
    Report {
        /// Canonical key of the label set whose value was rejected
        labels: String,
        /// The error returned by the backend
        source: anyhow::Error,
    },
    /// The telemetry backend could not be initialized
    BackendInit {
        /// The error returned by the backend initializer
        source: anyhow::Error,
    },
    /// A periodic collector was requested with a zero period
    InvalidInterval {
        /// The rejected period
        interval: Duration,
    },
    /// No tokio runtime was available to run the collector
    Runtime {
        /// Additional context about the error
        details: String,
    },
    /// Error when awaiting the collector task fails
    Join {
        /// The original JoinError from tokio
        source: tokio::task::JoinError,
    },
}

/// Implementation of the Display trait for Error enum.
///
/// Provides human-readable error messages for each error variant.
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Report { labels, source } => {
                write!(
                    f,
                    "Failed to report mailbox length for labels {{{}}}: {}",
                    labels, source
                )
            }
            Error::BackendInit { source } => {
                write!(f, "Failed to initialize mailbox length gauge: {source}")
            }
            Error::InvalidInterval { interval } => {
                write!(f, "Collection interval must be non-zero, got {interval:?}")
            }
            Error::Runtime { details } => {
                write!(f, "Runtime error in mailbox collector: {details}")
            }
            Error::Join { source } => {
                write!(f, "Failed to join mailbox collector task: {source}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Report { source, .. } | Error::BackendInit { source } => Some(source.as_ref()),
            Error::Join { source } => Some(source),
            _ => None,
        }
    }
}

/// A Result type specialized for mailbox-gauge operations.
pub type Result<T> = std::result::Result<T, Error>;
