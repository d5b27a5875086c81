//! Open-file handle table
//!
//! Every open or create gets a fresh handle id and its own staging file.
//! Reads and writes go to the staging file only; the remote copy is
//! replaced when the handle is released dirty.

use crate::error::{FsError, FsResult};
use log::debug;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// State of one open file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub id: u64,
    /// Mount path the handle was opened for
    pub path: String,
    pub staging_path: PathBuf,
    pub dirty: bool,
}

struct HandleTable {
    next_id: u64,
    handles: HashMap<u64, FileHandle>,
}

/// Handle table for the filesystem
pub struct FileHandleManager {
    staging_dir: PathBuf,
    table: Mutex<HandleTable>,
}

impl FileHandleManager {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            table: Mutex::new(HandleTable {
                next_id: 1,
                handles: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandleTable> {
        match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Reserve the next handle id and a staging path unique to it
    pub fn reserve(&self) -> (u64, PathBuf) {
        let mut table = self.lock();
        let id = table.next_id;
        table.next_id += 1;
        let staging_path = self
            .staging_dir
            .join(format!("fj_{}_{}", id, Uuid::new_v4().simple()));
        (id, staging_path)
    }

    /// Make a reserved handle live
    pub fn register(&self, handle: FileHandle) {
        debug!(
            "📂 Handle {} for {} staged at {}",
            handle.id,
            handle.path,
            handle.staging_path.display()
        );
        self.lock().handles.insert(handle.id, handle);
    }

    pub fn get(&self, fh: u64) -> FsResult<FileHandle> {
        self.lock()
            .handles
            .get(&fh)
            .cloned()
            .ok_or(FsError::BadHandle(fh))
    }

    /// Newest live handle opened for `path`
    pub fn live_handle_for(&self, path: &str) -> Option<FileHandle> {
        self.lock()
            .handles
            .values()
            .filter(|handle| handle.path == path)
            .max_by_key(|handle| handle.id)
            .cloned()
    }

    pub fn mark_dirty(&self, fh: u64) -> FsResult<()> {
        let mut table = self.lock();
        let handle = table.handles.get_mut(&fh).ok_or(FsError::BadHandle(fh))?;
        handle.dirty = true;
        Ok(())
    }

    /// Remove the handle from the table
    pub fn take(&self, fh: u64) -> FsResult<FileHandle> {
        self.lock().handles.remove(&fh).ok_or(FsError::BadHandle(fh))
    }

    pub fn len(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `size` bytes at `offset`; empty at or past the end
    pub fn read(&self, fh: u64, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        let handle = self.get(fh)?;
        let file = File::open(&handle.staging_path)?;
        let mut buffer = vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            let n = file.read_at(&mut buffer[filled..], offset + filled as u64)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buffer.truncate(filled);
        Ok(buffer)
    }

    /// Write at `offset`, growing the file as needed, and mark dirty
    pub fn write(&self, fh: u64, offset: u64, data: &[u8]) -> FsResult<usize> {
        let handle = self.get(fh)?;
        let file = OpenOptions::new().write(true).open(&handle.staging_path)?;
        file.write_all_at(data, offset)?;
        self.mark_dirty(fh)?;
        Ok(data.len())
    }

    pub fn truncate(&self, fh: u64, size: u64) -> FsResult<()> {
        let handle = self.get(fh)?;
        let file = OpenOptions::new().write(true).open(&handle.staging_path)?;
        file.set_len(size)?;
        self.mark_dirty(fh)
    }
}
