//! Reclamation safety net
//!
//! Handles dropped without `dispose()` push their region onto a queue; a
//! background thread drains the queue and returns the regions to the pool.
//! Release timing is best-effort. Once the reclaimer has shut down, the
//! dropping thread releases the region itself.
//!
//! Submissions happen under a shared gate. Shutdown closes the gate before
//! the final drain, so no region can be queued after it and lost when the
//! channel is torn down.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, SendError, Sender};
use crossbeam::select;
use parking_lot::RwLock;

use crate::error::Result;
use crate::pool::{Region, SegmentPool};

/// Cloneable submission side, held by every handle
#[derive(Clone)]
pub(crate) struct ReclaimQueue {
    orphans: Sender<Region>,
    pool: Arc<SegmentPool>,
    /// True while the reclaimer accepts regions
    open: Arc<RwLock<bool>>,
}

impl ReclaimQueue {
    /// Hand over the region of a handle that was never disposed
    pub(crate) fn submit(&self, region: Region) {
        let open = self.open.read();
        let region = if *open {
            match self.orphans.send(region) {
                Ok(()) => return,
                Err(SendError(region)) => region,
            }
        } else {
            region
        };
        drop(open);

        tracing::trace!("reclaimer gone, releasing orphaned region inline");
        self.pool.reclaim_region(region);
    }
}

/// Background reclaimer thread
pub(crate) struct Reclaimer {
    queue: ReclaimQueue,
    /// Kept so `sweep` can drain without the thread
    orphans: Receiver<Region>,
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Reclaimer {
    pub(crate) fn start(pool: Arc<SegmentPool>) -> Result<Self> {
        let (orphan_tx, orphan_rx) = channel::unbounded::<Region>();
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let thread_pool = Arc::clone(&pool);
        let thread_orphans = orphan_rx.clone();
        let thread = thread::Builder::new()
            .name("tempstore-reclaimer".to_string())
            .spawn(move || reclaim_loop(thread_pool, thread_orphans, shutdown_rx))?;

        Ok(Self {
            queue: ReclaimQueue {
                orphans: orphan_tx,
                pool,
                open: Arc::new(RwLock::new(true)),
            },
            orphans: orphan_rx,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub(crate) fn queue(&self) -> ReclaimQueue {
        self.queue.clone()
    }

    /// Release every orphan queued so far on the calling thread
    ///
    /// Returns the number of regions released.
    pub(crate) fn sweep(&self) -> usize {
        let mut released = 0;
        for region in self.orphans.try_iter() {
            self.queue.pool.reclaim_region(region);
            released += 1;
        }
        released
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        // Waits out in-flight submissions; later ones release inline.
        *self.queue.open.write() = false;

        drop(self.shutdown.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("reclaimer thread panicked");
            }
        }
        // Anything queued after the thread's final drain.
        let late = self.sweep();
        if late > 0 {
            tracing::debug!(late, "released orphaned regions at shutdown");
        }
    }
}

fn reclaim_loop(pool: Arc<SegmentPool>, orphans: Receiver<Region>, shutdown: Receiver<()>) {
    let mut reclaimed: u64 = 0;
    loop {
        select! {
            recv(orphans) -> region => match region {
                Ok(region) => {
                    pool.reclaim_region(region);
                    reclaimed += 1;
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                for region in orphans.try_iter() {
                    pool.reclaim_region(region);
                    reclaimed += 1;
                }
                break;
            }
        }
    }
    tracing::debug!(reclaimed, "reclaimer stopped");
}
