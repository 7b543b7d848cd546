// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

//! Mailbox Gauge Demo
//!
//! Spawns a few mailbox-backed worker tasks, registers their mailboxes and
//! prints one aggregated mailbox length per actor type on every tick. Halfway
//! through, the slow workers stop and their probes are pruned.
//!
//! Run with: `RUST_LOG=debug cargo run --example mailbox_gauge_demo`
//! With tracing: `cargo run --example mailbox_gauge_demo --features tracing`

use std::time::Duration;

use mailbox_gauge::{probe, Config, LabelSet, MailboxMetrics};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct FastWorker;
struct SlowWorker;

/// Spawns a task draining `rx`, sleeping `delay` per message.
fn spawn_worker(mut rx: mpsc::Receiver<u64>, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(_job) = rx.recv().await {
            tokio::time::sleep(delay).await;
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(feature = "tracing")]
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();
    #[cfg(not(feature = "tracing"))]
    env_logger::init();

    println!("=== mailbox-gauge Demo ===\n");

    let metrics = MailboxMetrics::new(
        Config::default(),
        |labels: &LabelSet, count: u64| -> anyhow::Result<()> {
            println!("  mailbox_length{labels} = {count}");
            Ok(())
        },
    );

    let address = "127.0.0.1:8090";
    let mut slow_senders = Vec::new();
    let mut fast_senders = Vec::new();
    let mut handles = Vec::new();

    for _ in 0..3 {
        let (tx, rx) = mpsc::channel(64);
        metrics.register(
            &MailboxMetrics::common_labels::<FastWorker>(address),
            probe::bounded_mailbox(&tx),
        );
        handles.push(spawn_worker(rx, Duration::from_millis(1)));
        fast_senders.push(tx);
    }
    for _ in 0..2 {
        let (tx, rx) = mpsc::channel(64);
        metrics.register(
            &MailboxMetrics::common_labels::<SlowWorker>(address),
            probe::bounded_mailbox(&tx),
        );
        handles.push(spawn_worker(rx, Duration::from_millis(50)));
        slow_senders.push(tx);
    }

    let collector = metrics
        .spawn_collector(Duration::from_millis(200))?
        .expect("metrics enabled");

    println!("Sending 20 jobs to every worker...");
    for job in 0..20 {
        for tx in fast_senders.iter().chain(slow_senders.iter()) {
            tx.send(job).await?;
        }
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("\nStopping slow workers...");
    drop(slow_senders);
    tokio::time::sleep(Duration::from_millis(1200)).await;

    collector.stop().await?;
    drop(fast_senders);
    for handle in handles {
        handle.await?;
    }

    if let Some(report) = metrics.collect() {
        println!(
            "\nFinal tick: {} groups, {} probes visited, {} pruned",
            report.groups, report.visited, report.pruned
        );
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
