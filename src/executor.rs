//! Background executor for the non-blocking operations.
//!
//! A fixed set of named worker threads pull boxed jobs from a shared crossbeam
//! channel. Each job reports through a one-shot [`Completion`].

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use crossbeam::select;

use crate::error::{Result, StoreError};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Deferred result of an `*_async` operation
///
/// The result can be taken once. Later calls report `TaskAbandoned`.
#[must_use = "a Completion does nothing unless its result is inspected"]
pub struct Completion<T> {
    rx: Receiver<Result<T>>,
}

impl<T> Completion<T> {
    /// Block until the operation finishes
    pub fn wait(self) -> Result<T> {
        self.rx.recv().unwrap_or(Err(StoreError::TaskAbandoned))
    }

    /// Block up to `timeout`; None if the operation is still running
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(StoreError::TaskAbandoned)),
        }
    }

    /// Take the result if it is ready, without blocking
    pub fn try_take(&self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(StoreError::TaskAbandoned)),
        }
    }

    /// True once a result (or an abandonment) is waiting to be taken
    pub fn is_ready(&self) -> bool {
        !self.rx.is_empty()
    }
}

/// Sending half of a completion
///
/// Dropping it unsent, whether the job panicked or never ran, resolves the
/// completion to `TaskAbandoned` so pollers see it as ready.
struct Reply<T> {
    tx: Option<Sender<Result<T>>>,
}

impl<T> Reply<T> {
    fn send(mut self, result: Result<T>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }
}

impl<T> Drop for Reply<T> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(StoreError::TaskAbandoned));
        }
    }
}

/// Cloneable submission side of the executor
#[derive(Clone)]
pub(crate) struct Spawner {
    jobs: Sender<Job>,
}

impl Spawner {
    /// Run `task` on a worker thread
    ///
    /// If the executor is gone the job is dropped and the completion
    /// resolves to `TaskAbandoned`.
    pub(crate) fn spawn<T, F>(&self, task: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        let reply = Reply { tx: Some(tx) };
        let job: Job = Box::new(move || reply.send(task()));
        if self.jobs.send(job).is_err() {
            tracing::debug!("executor shut down, background task abandoned");
        }
        Completion { rx }
    }
}

/// Worker pool
///
/// Dropping it lets workers drain already-queued jobs, then joins them.
pub(crate) struct Executor {
    spawner: Spawner,
    shutdown: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Executor {
    pub(crate) fn start(threads: usize) -> Result<Self> {
        let (job_tx, job_rx) = channel::unbounded::<Job>();
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let jobs = job_rx.clone();
            let shutdown = shutdown_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("tempstore-io-{}", i))
                .spawn(move || worker_loop(jobs, shutdown))?;
            workers.push(handle);
        }

        tracing::debug!(threads, "executor started");

        Ok(Self {
            spawner: Spawner { jobs: job_tx },
            shutdown: Some(shutdown_tx),
            workers,
        })
    }

    pub(crate) fn spawner(&self) -> Spawner {
        self.spawner.clone()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        // Disconnecting the shutdown channel wakes every worker.
        drop(self.shutdown.take());

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("executor worker panicked during shutdown");
            }
        }
        tracing::debug!("executor stopped");
    }
}

fn worker_loop(jobs: Receiver<Job>, shutdown: Receiver<()>) {
    loop {
        select! {
            recv(jobs) -> job => match job {
                Ok(job) => run_job(job),
                Err(_) => return,
            },
            recv(shutdown) -> _ => {
                for job in jobs.try_iter() {
                    run_job(job);
                }
                return;
            }
        }
    }
}

fn run_job(job: Job) {
    // A panicking job drops its reply unsent, which resolves the completion
    // to TaskAbandoned. The worker keeps going.
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::error!("background task panicked");
    }
}
