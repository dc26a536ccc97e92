//! Storage Service
//!
//! The entry point hosts talk to. Owns the segment pool, the background
//! executor and the reclaimer, and hands out storage handles.

use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::config::{Backing, StoreConfig};
use crate::error::{Result, StoreError};
use crate::executor::Executor;
use crate::handle::StorageHandle;
use crate::pool::{PoolStats, SegmentPool};
use crate::reclaim::Reclaimer;

/// Temporary off-heap storage service
///
/// Handles created here stay usable after the service is dropped: the pool
/// lives as long as any handle does. Their `*_async` operations report
/// `TaskAbandoned` from then on, and dropped handles release inline.
pub struct TemporaryStorage {
    config: StoreConfig,
    pool: Arc<SegmentPool>,
    // Executor drops first; jobs it drains may still orphan regions.
    executor: Executor,
    reclaimer: Reclaimer,
    next_handle_id: AtomicU64,
}

impl TemporaryStorage {
    /// Start a storage service with the given config
    ///
    /// On startup:
    /// 1. Validate the size-class layout
    /// 2. Create the scratch directory for file-backed segments
    /// 3. Start the background executor and reclaimer
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        if let Backing::Directory(dir) = &config.backing {
            fs::create_dir_all(dir)?;
        }

        let pool = Arc::new(SegmentPool::new(&config)?);
        let executor = Executor::start(config.io_threads)?;
        let reclaimer = Reclaimer::start(Arc::clone(&pool))?;

        tracing::info!(
            min_block = config.min_block_size,
            max_block = config.max_block_size,
            segment_capacity = config.segment_capacity,
            backing = ?config.backing,
            "temporary storage started"
        );

        Ok(Self {
            config,
            pool,
            executor,
            reclaimer,
            next_handle_id: AtomicU64::new(1),
        })
    }

    /// Start with the default config
    pub fn open_default() -> Result<Self> {
        Self::open(StoreConfig::default())
    }

    /// Create an empty handle
    ///
    /// `cancel` is also consulted when the handle's first write allocates.
    pub fn create_storage(&self, cancel: &CancellationToken) -> Result<StorageHandle> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let id = self.next_handle_id.fetch_add(1, Ordering::Relaxed);
        Ok(StorageHandle::new(
            id,
            Arc::clone(&self.pool),
            self.reclaimer.queue(),
            self.executor.spawner(),
            cancel.clone(),
            self.config.verify_checksums,
        ))
    }

    /// Release orphaned regions now instead of waiting for the reclaimer
    ///
    /// Returns how many were released by this call.
    pub fn sweep(&self) -> usize {
        self.reclaimer.sweep()
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn pool(&self) -> &Arc<SegmentPool> {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl Drop for TemporaryStorage {
    fn drop(&mut self) {
        tracing::debug!(stats = ?self.pool.stats(), "temporary storage shutting down");
    }
}
