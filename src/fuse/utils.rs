//! Utility functions for the FUSE adapter

use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;

/// Validity the kernel may cache attributes and entries for
pub const TTL: Duration = Duration::from_secs(1);

/// Inode of the mount root
pub const ROOT_INO: u64 = 1;

/// Run `future` to completion from a synchronous FUSE callback.
/// Inside a multi-threaded runtime worker the thread is handed back to the
/// runtime while it blocks; on a plain thread the handle drives the future.
pub fn sync_await<F, T>(handle: &Handle, future: F) -> T
where
    F: Future<Output = T>,
{
    match Handle::try_current() {
        Ok(_) => tokio::task::block_in_place(|| handle.block_on(future)),
        Err(_) => handle.block_on(future),
    }
}

/// Open flags that change how a staging copy is prepared
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    pub create: bool,
    pub truncate: bool,
    pub write: bool,
}

impl OpenFlags {
    pub fn from_i32(flags: i32) -> Self {
        let access_mode = flags & libc::O_ACCMODE;
        Self {
            create: flags & libc::O_CREAT != 0,
            truncate: flags & libc::O_TRUNC != 0,
            write: access_mode == libc::O_WRONLY || access_mode == libc::O_RDWR,
        }
    }

    /// Start from an empty staging file instead of the remote content
    pub fn stages_empty(&self) -> bool {
        self.create || self.truncate
    }
}
