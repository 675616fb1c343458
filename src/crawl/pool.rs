//! Staggered worker pool draining the frontier
//!
//! Workers are plain OS threads, one per unit of hardware parallelism by
//! default. Startup is staggered so the instantaneous request burst against
//! the upstream stays bounded even though steady-state concurrency is full.
//! The pool join is a hard barrier: the tally must not be read before every
//! worker has observed the empty frontier and returned.

use crate::crawl::frontier::Frontier;
use crate::model::PlayerFacts;
use crate::Result;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Per-run result accumulator, shared by reference with every worker
///
/// Replaces any notion of process-wide counters: a tally lives exactly as
/// long as its run and is returned to the caller after the pool joins.
#[derive(Debug, Default)]
pub struct RunTally {
    processed: AtomicU64,
    skipped: AtomicU64,
    new_shots: AtomicU64,
}

impl RunTally {
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_new_shots(&self, count: u64) {
        self.new_shots.fetch_add(count, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn new_shots(&self) -> u64 {
        self.new_shots.load(Ordering::Relaxed)
    }
}

/// Pool pacing knobs
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Delay inserted between successive worker thread starts
    pub stagger: Duration,
    /// Upper bound of the random pause between entities on one worker
    pub pause_cap: Duration,
}

/// One worker's per-entity processing step
///
/// Implementations own their replica connections; a worker is moved into its
/// thread and never shared. An `Err` from `process` marks the entity skipped
/// and the worker moves on.
pub trait EntityWorker: Send {
    fn process(&mut self, player: &PlayerFacts, tally: &RunTally) -> Result<()>;
}

/// Runs the pool to completion over `frontier`
///
/// One thread per element of `workers`, started `stagger` apart. Each thread
/// loops: pop-or-exit, process, jittered pause while work remains. A popped
/// entity that fails is logged and counted, never fatal to the pool. Returns
/// once every worker has joined.
pub fn run_pool<W: EntityWorker>(
    frontier: Arc<Frontier>,
    tally: Arc<RunTally>,
    options: &PoolOptions,
    workers: Vec<W>,
) {
    let worker_count = workers.len();
    tracing::info!(
        "Starting {} workers over a frontier of {}",
        worker_count,
        frontier.len()
    );

    std::thread::scope(|scope| {
        for (index, worker) in workers.into_iter().enumerate() {
            let frontier = Arc::clone(&frontier);
            let tally = Arc::clone(&tally);
            let pause_cap = options.pause_cap;

            scope.spawn(move || {
                drain(index, worker, frontier, tally, pause_cap);
            });

            // Bound the instantaneous burst against the upstream
            if index + 1 < worker_count {
                std::thread::sleep(options.stagger);
            }
        }
    });

    tracing::info!(
        "Pool finished: {} processed, {} skipped",
        tally.processed(),
        tally.skipped()
    );
}

fn drain<W: EntityWorker>(
    index: usize,
    mut worker: W,
    frontier: Arc<Frontier>,
    tally: Arc<RunTally>,
    pause_cap: Duration,
) {
    tracing::debug!("Worker {} started", index);

    while let Some(player) = frontier.pop() {
        match worker.process(&player, &tally) {
            Ok(()) => tally.record_processed(),
            Err(e) => {
                tracing::warn!(
                    "Worker {} skipping {} {} ({}): {}",
                    index,
                    player.first_name,
                    player.last_name,
                    player.id,
                    e
                );
                tally.record_skipped();
            }
        }

        // Other workers may still be mid-fetch after the last pop; an empty
        // frontier here only means this worker is done pausing.
        if !frontier.is_empty() && !pause_cap.is_zero() {
            let pause = rand::thread_rng().gen_range(Duration::ZERO..pause_cap);
            std::thread::sleep(pause);
        }
    }

    tracing::debug!("Worker {} observed empty frontier, exiting", index);
}

/// Convenience constructor for a set of identical workers
///
/// Setup failures here are fatal to the run: if one worker cannot establish
/// its connections, none of them could proceed correctly.
pub fn build_workers<W, F>(count: usize, mut build: F) -> Result<Vec<W>>
where
    W: EntityWorker,
    F: FnMut(usize) -> Result<W>,
{
    let mut workers = Vec::with_capacity(count);
    for index in 0..count {
        workers.push(build(index).map_err(|e| {
            tracing::error!("Worker {} setup failed: {}", index, e);
            e
        })?);
    }
    Ok(workers)
}
