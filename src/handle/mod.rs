//! Storage Handle
//!
//! Write-once, read-many buffer living in a pooled region.
//!
//! ## State Machine
//! ```text
//!            write                 dispose
//!   Empty ───────────▶ Written ───────────▶ Disposed
//!     │                  │  ▲                  ▲
//!     │                  └──┘ read*            │
//!     └────────────────────────────────────────┘
//!                      dispose
//! ```
//! The state lives behind a per-handle `RwLock`: writes and disposal take
//! it exclusively, reads share it. Other threads therefore never observe a
//! half-finished transition, and a region is never released while a read
//! is still copying out of it.
//!
//! ## Ownership
//! `dispose()` is the primary release path. A handle dropped while still
//! holding a region hands it to the reclaimer instead.

mod stream;
mod text;

use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::cancel::CancellationToken;
use crate::encoding::TextEncoding;
use crate::error::{Result, StoreError};
use crate::executor::{Completion, Spawner};
use crate::pool::{Region, SegmentPool};
use crate::reclaim::ReclaimQueue;

pub use stream::ContentStream;

/// Observable lifecycle state of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Empty,
    Written,
    Disposed,
}

/// What the handle currently holds
enum Slot {
    Empty,
    Written(Stored),
    Disposed,
}

impl Slot {
    fn state(&self) -> HandleState {
        match self {
            Slot::Empty => HandleState::Empty,
            Slot::Written(_) => HandleState::Written,
            Slot::Disposed => HandleState::Disposed,
        }
    }
}

/// How the stored bytes were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Bytes,
    /// Length-framed encoded text; byte reads skip the frame header
    Text,
}

impl Payload {
    /// Bytes at the start of the region that are not content
    fn header_len(self) -> usize {
        match self {
            Payload::Bytes => 0,
            Payload::Text => text::TEXT_HEADER_SIZE,
        }
    }
}

struct Stored {
    region: Region,
    payload: Payload,
    /// CRC32 of the payload, if checksums are enabled
    checksum: Option<u32>,
}

/// Shared core; background operations keep it alive while they run
struct HandleCore {
    id: u64,
    slot: RwLock<Slot>,
    pool: Arc<SegmentPool>,
    reclaim: ReclaimQueue,
    cancel: CancellationToken,
    verify_checksums: bool,
}

/// Client-facing temporary storage buffer
///
/// Every method takes `&self`; share the handle across threads with `Arc`.
pub struct StorageHandle {
    core: Arc<HandleCore>,
    spawner: Spawner,
}

impl StorageHandle {
    pub(crate) fn new(
        id: u64,
        pool: Arc<SegmentPool>,
        reclaim: ReclaimQueue,
        spawner: Spawner,
        cancel: CancellationToken,
        verify_checksums: bool,
    ) -> Self {
        Self {
            core: Arc::new(HandleCore {
                id,
                slot: RwLock::new(Slot::Empty),
                pool,
                reclaim,
                cancel,
                verify_checksums,
            }),
            spawner,
        }
    }

    pub fn id(&self) -> u64 {
        self.core.id
    }

    pub fn state(&self) -> HandleState {
        self.core.slot.read().state()
    }

    /// Content length in bytes (encoded length for text); 0 unless written
    pub fn len(&self) -> usize {
        match &*self.core.slot.read() {
            Slot::Written(stored) => stored.region.len() - stored.payload.header_len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store raw bytes
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.core.write_payload(bytes, Payload::Bytes)
    }

    /// Store everything `reader` yields
    pub fn write_stream<R: Read>(&self, mut reader: R) -> Result<()> {
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        self.core.write_payload(&payload, Payload::Bytes)
    }

    /// Store text through `encoding`
    pub fn write_text(&self, text: &str, encoding: &dyn TextEncoding) -> Result<()> {
        let framed = text::frame(text, encoding)?;
        self.core.write_payload(&framed, Payload::Text)
    }

    /// Non-blocking `write_bytes`
    pub fn write_bytes_async(&self, bytes: impl Into<Bytes>) -> Completion<()> {
        let core = Arc::clone(&self.core);
        let bytes: Bytes = bytes.into();
        self.spawner
            .spawn(move || core.write_payload(&bytes, Payload::Bytes))
    }

    /// Non-blocking `write_text`
    pub fn write_text_async<E>(&self, text: impl Into<String>, encoding: E) -> Completion<()>
    where
        E: TextEncoding + 'static,
    {
        let core = Arc::clone(&self.core);
        let text: String = text.into();
        self.spawner.spawn(move || {
            let framed = text::frame(&text, &encoding)?;
            core.write_payload(&framed, Payload::Text)
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fresh copy of the stored bytes
    ///
    /// For a handle written as text this is the encoded text.
    pub fn read_bytes(&self) -> Result<ContentStream> {
        self.core.read_content().map(ContentStream::new)
    }

    /// Decode the stored text through `encoding`
    ///
    /// Fails with `InvalidArgument` if the handle was written as bytes.
    pub fn read_text(&self, encoding: &dyn TextEncoding) -> Result<String> {
        self.core.read_text(encoding)
    }

    /// Non-blocking `read_bytes`
    pub fn read_bytes_async(&self) -> Completion<ContentStream> {
        let core = Arc::clone(&self.core);
        self.spawner
            .spawn(move || core.read_content().map(ContentStream::new))
    }

    /// Non-blocking `read_text`
    pub fn read_text_async<E>(&self, encoding: E) -> Completion<String>
    where
        E: TextEncoding + 'static,
    {
        let core = Arc::clone(&self.core);
        self.spawner.spawn(move || core.read_text(&encoding))
    }

    /// Positioned read straight from the mapping
    ///
    /// Copies up to `buf.len()` bytes starting at content `offset`; returns
    /// the number copied, 0 at or past the end.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let slot = self.core.slot.read();
        match &*slot {
            Slot::Written(stored) => {
                let Some(offset) = offset.checked_add(stored.payload.header_len()) else {
                    return Ok(0);
                };
                Ok(stored.region.view()?.read_at(offset, buf))
            }
            other => Err(StoreError::invalid_state("read", other.state())),
        }
    }

    /// Single byte at `offset`
    pub fn read_byte_at(&self, offset: usize) -> Result<u8> {
        let mut byte = [0u8; 1];
        match self.read_at(offset, &mut byte)? {
            1 => Ok(byte[0]),
            _ => Err(StoreError::InvalidArgument(format!(
                "offset {} is past the end of handle {}",
                offset,
                self.id()
            ))),
        }
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Release the region and move to `Disposed`; idempotent
    pub fn dispose(&self) {
        self.core.dispose();
    }
}

impl std::fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageHandle")
            .field("id", &self.core.id)
            .field("state", &self.state())
            .finish()
    }
}

impl HandleCore {
    /// State is checked before the payload: a spent handle always reports
    /// `InvalidState`.
    fn write_payload(&self, bytes: &[u8], payload: Payload) -> Result<()> {
        let mut slot = self.slot.write();
        if !matches!(*slot, Slot::Empty) {
            return Err(StoreError::invalid_state("write", slot.state()));
        }
        if bytes.is_empty() {
            return Err(StoreError::InvalidArgument(
                "write payload must be at least one byte".to_string(),
            ));
        }

        let region = self.pool.acquire_region(bytes.len(), &self.cancel)?;
        let copied = region.view().and_then(|mut view| {
            view.write_all(bytes)?;
            Ok(())
        });
        if let Err(e) = copied {
            self.pool.release_region(region);
            return Err(e);
        }

        let checksum = self.verify_checksums.then(|| crc32fast::hash(bytes));
        *slot = Slot::Written(Stored {
            region,
            payload,
            checksum,
        });

        tracing::trace!(handle = self.id, len = bytes.len(), ?payload, "handle written");
        Ok(())
    }

    /// Content bytes, without any text frame header
    fn read_content(&self) -> Result<Vec<u8>> {
        let (mut stored, payload) = self.read_stored()?;
        stored.drain(..payload.header_len());
        Ok(stored)
    }

    fn read_text(&self, encoding: &dyn TextEncoding) -> Result<String> {
        let (framed, payload) = self.read_stored()?;
        if payload != Payload::Text {
            return Err(StoreError::InvalidArgument(format!(
                "handle {} holds raw bytes, not text",
                self.id
            )));
        }
        text::unframe(&framed, encoding)
    }

    /// Everything in the region, checksum-verified
    fn read_stored(&self) -> Result<(Vec<u8>, Payload)> {
        let slot = self.slot.read();
        let stored = match &*slot {
            Slot::Written(stored) => stored,
            other => return Err(StoreError::invalid_state("read", other.state())),
        };

        let mut bytes = vec![0u8; stored.region.len()];
        stored.region.view()?.read_exact(&mut bytes)?;

        if let Some(expected) = stored.checksum {
            let actual = crc32fast::hash(&bytes);
            if actual != expected {
                return Err(StoreError::Corrupted(format!(
                    "handle {} checksum mismatch: expected {:08x}, got {:08x}",
                    self.id, expected, actual
                )));
            }
        }
        Ok((bytes, stored.payload))
    }

    fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.slot.write(), Slot::Disposed);
        if let Slot::Written(stored) = previous {
            self.pool.release_region(stored.region);
            tracing::trace!(handle = self.id, "handle disposed");
        }
    }
}

impl Drop for HandleCore {
    fn drop(&mut self) {
        let previous = std::mem::replace(self.slot.get_mut(), Slot::Disposed);
        if let Slot::Written(stored) = previous {
            tracing::trace!(handle = self.id, "handle dropped undisposed, queueing region");
            self.reclaim.submit(stored.region);
        }
    }
}
