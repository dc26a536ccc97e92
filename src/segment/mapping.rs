//! Backing mappings for segments
//!
//! A mapping is either anonymous or backed by a scratch file. Dropping the
//! mapping unmaps it first and then removes the scratch file, if any.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::config::Backing;
use crate::error::{Result, StoreError};

pub(super) struct Mapping {
    mmap: Option<MmapMut>,
    file_path: Option<PathBuf>,
}

impl Mapping {
    /// Map `capacity` bytes for segment `id`
    pub(super) fn create(id: u64, capacity: usize, backing: &Backing) -> Result<Self> {
        match backing {
            Backing::Anonymous => {
                let mmap = MmapMut::map_anon(capacity).map_err(|source| {
                    StoreError::ResourceExhausted {
                        size: capacity,
                        source,
                    }
                })?;
                Ok(Self {
                    mmap: Some(mmap),
                    file_path: None,
                })
            }
            Backing::Directory(dir) => Self::create_file_backed(id, capacity, dir),
        }
    }

    fn create_file_backed(id: u64, capacity: usize, dir: &Path) -> Result<Self> {
        let path = segment_path(dir, id);
        let exhausted = |source: std::io::Error| StoreError::ResourceExhausted {
            size: capacity,
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(exhausted)?;

        let mapped = file.set_len(capacity as u64).and_then(|_| {
            // SAFETY: the file was just created with truncate=true under a
            // scratch directory owned by this process, and it is only ever
            // accessed through this mapping. The mapping outlives every view
            // because views hold an Arc to the owning segment.
            unsafe { MmapMut::map_mut(&file) }
        });

        match mapped {
            Ok(mmap) => Ok(Self {
                mmap: Some(mmap),
                file_path: Some(path),
            }),
            Err(source) => {
                let _ = fs::remove_file(&path);
                Err(exhausted(source))
            }
        }
    }

    /// Base address of the mapping
    pub(super) fn base_ptr(&mut self) -> *mut u8 {
        match self.mmap.as_mut() {
            Some(mmap) => mmap.as_mut_ptr(),
            None => std::ptr::null_mut(),
        }
    }

    pub(super) fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        // Unmap before unlinking; some platforms refuse to delete mapped files.
        drop(self.mmap.take());

        if let Some(path) = self.file_path.take() {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove segment file");
            }
        }
    }
}

/// "segment_000042.seg" under `dir`
pub(super) fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("segment_{:06}.seg", id))
}
