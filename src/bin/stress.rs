//! tempstore stress binary
//!
//! Runs a create/write/read/dispose churn workload against a storage pool and
//! verifies every byte read back.

use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use tempstore::{CancellationToken, StoreConfig, TemporaryStorage};
use tracing_subscriber::{fmt, EnvFilter};

/// tempstore churn workload
#[derive(Parser, Debug)]
#[command(name = "tempstore-stress")]
#[command(about = "Churn test for the temporary off-heap storage pool")]
#[command(version)]
struct Args {
    /// Concurrent tasks; task i writes handles of about i KB
    #[arg(short, long, default_value = "256")]
    tasks: usize,

    /// Rounds per task
    #[arg(short, long, default_value = "4")]
    rounds: usize,

    /// Back segments with files in this directory instead of anonymous maps
    #[arg(short, long)]
    backing_dir: Option<String>,

    /// Background I/O threads
    #[arg(short, long, default_value = "4")]
    io_threads: usize,

    /// Segment capacity in MB
    #[arg(short = 's', long, default_value = "4")]
    segment_mb: usize,

    /// Verify CRC32 on every read
    #[arg(long)]
    verify: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tempstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("tempstore stress v{}", tempstore::VERSION);
    tracing::info!("Tasks: {}, rounds: {}", args.tasks, args.rounds);

    let mut builder = StoreConfig::builder()
        .io_threads(args.io_threads)
        .segment_capacity(args.segment_mb * 1024 * 1024)
        .verify_checksums(args.verify);
    if let Some(dir) = &args.backing_dir {
        builder = builder.backing_dir(dir);
    }

    let storage = match TemporaryStorage::open(builder.build()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Failed to open storage: {}", e);
            process::exit(1);
        }
    };

    let started = Instant::now();
    let mut workers = Vec::with_capacity(args.tasks);
    for task in 1..=args.tasks {
        let storage = Arc::clone(&storage);
        let rounds = args.rounds;
        workers.push(thread::spawn(move || churn(&storage, task, rounds)));
    }

    let mut failures = 0usize;
    for worker in workers {
        match worker.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("task failed: {}", e);
                failures += 1;
            }
            Err(_) => {
                tracing::error!("task panicked");
                failures += 1;
            }
        }
    }

    storage.sweep();
    let stats = storage.stats();
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        segments_created = stats.segments_created,
        segments_destroyed = stats.segments_destroyed,
        regions_reclaimed = stats.regions_reclaimed,
        live_regions = stats.live_regions,
        mapped_bytes = stats.mapped_bytes,
        "workload finished"
    );

    if failures > 0 {
        tracing::error!("{} task(s) failed", failures);
        process::exit(1);
    }
}

/// One task: three handles per round around `task` KB, one left undisposed
fn churn(storage: &TemporaryStorage, task: usize, rounds: usize) -> Result<(), String> {
    let cancel = CancellationToken::none();

    for round in 0..rounds {
        let sizes = [1024 * task - 1, 1024 * task, 1024 * task + 1];
        let mut handles = Vec::with_capacity(sizes.len());

        for &size in &sizes {
            let payload: Vec<u8> = (0..size).map(|i| ((i + task + round) % 256) as u8).collect();
            let handle = storage
                .create_storage(&cancel)
                .map_err(|e| e.to_string())?;
            handle.write_bytes(&payload).map_err(|e| e.to_string())?;
            handles.push((handle, payload));
        }

        for (handle, payload) in &handles {
            let read = handle.read_bytes().map_err(|e| e.to_string())?;
            if read.as_slice() != payload.as_slice() {
                return Err(format!(
                    "task {} round {}: handle {} read back {} bytes that differ from the {} written",
                    task,
                    round,
                    handle.id(),
                    read.len(),
                    payload.len()
                ));
            }
        }

        // Dispose all but the last; the reclaimer picks that one up.
        let mut handles = handles.into_iter();
        let _leaked = handles.next_back();
        for (handle, _) in handles {
            handle.dispose();
        }
    }
    Ok(())
}
