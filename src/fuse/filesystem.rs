//! FUSE adapter
//!
//! Translates kernel callbacks (inode based) into path based operations and
//! errors into errno values. Callbacks block on the tokio runtime the mount
//! was started from.

use crate::fuse::attributes::{NodeAttributes, NodeKind};
use crate::fuse::inodes::InodeTable;
use crate::fuse::operations::FileJumpOperations;
use crate::fuse::utils::{sync_await, TTL};
use crate::index::path_utils;
use anyhow::Result;
use fuser::{
    FileType, Filesystem, KernelConfig, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use libc::c_int;
use log::{debug, info, warn};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::runtime::Handle;

const MAX_NAME_LENGTH: u32 = 255;

/// FileJump FUSE filesystem
pub struct FileJumpFuse {
    operations: Arc<FileJumpOperations>,
    inodes: InodeTable,
    runtime: Handle,
}

impl FileJumpFuse {
    pub fn new(operations: Arc<FileJumpOperations>, runtime: Handle) -> Self {
        Self {
            operations,
            inodes: InodeTable::new(),
            runtime,
        }
    }

    pub fn operations(&self) -> &Arc<FileJumpOperations> {
        &self.operations
    }

    fn path_of(&self, ino: u64) -> Result<String, c_int> {
        self.inodes.path_of(ino).ok_or(libc::ENOENT)
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Result<String, c_int> {
        let name = name.to_str().ok_or(libc::EINVAL)?;
        self.inodes.child_path(parent, name).ok_or(libc::ENOENT)
    }

    fn attributes(&self, path: &str, fh: Option<u64>) -> Result<NodeAttributes, c_int> {
        sync_await(&self.runtime, self.operations.get_attributes(path, fh))
            .map_err(|e| e.errno())
    }

    fn parent_ino(&self, path: &str) -> u64 {
        match path_utils::split_parent(path) {
            Some((parent, _)) => self.inodes.ino_for(&parent),
            None => self.inodes.ino_for("/"),
        }
    }
}

fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::Directory => FileType::Directory,
        NodeKind::File => FileType::RegularFile,
    }
}

impl Filesystem for FileJumpFuse {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!("FileJump filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        let open = self.operations.handles().len();
        if open > 0 {
            warn!("Unmounting with {} open handles; their changes are lost", open);
        }
        self.operations.cancel_uploads();
        info!("FileJump filesystem destroyed");
    }

    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        debug!("LOOKUP: parent={}, name={:?}", parent, name);
        let path = match self.child_path(parent, name) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match self.attributes(&path, None) {
            Ok(attributes) => {
                let ino = self.inodes.ino_for(&path);
                reply.entry(&TTL, &attributes.to_file_attr(ino, req.uid(), req.gid()), 0);
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, fh: Option<u64>, reply: ReplyAttr) {
        debug!("GETATTR: ino={}, fh={:?}", ino, fh);
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match self.attributes(&path, fh) {
            Ok(attributes) => {
                reply.attr(&TTL, &attributes.to_file_attr(ino, req.uid(), req.gid()))
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!("SETATTR: ino={}, size={:?}, fh={:?}", ino, size, fh);
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        if let Some(size) = size {
            if let Err(e) = sync_await(&self.runtime, self.operations.set_size(&path, fh, size)) {
                return reply.error(e.errno());
            }
        }
        // Other attribute changes are accepted and ignored
        match self.attributes(&path, fh) {
            Ok(attributes) => {
                reply.attr(&TTL, &attributes.to_file_attr(ino, req.uid(), req.gid()))
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!("READDIR: ino={}, offset={}", ino, offset);
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        let entries = match sync_await(
            &self.runtime,
            self.operations.list_directory_entries(&path),
        ) {
            Ok(entries) => entries,
            Err(e) => return reply.error(e.errno()),
        };

        for (index, entry) in entries.iter().enumerate().skip(offset.max(0) as usize) {
            let entry_ino = match entry.name.as_str() {
                "." => ino,
                ".." => self.parent_ino(&path),
                name => self.inodes.ino_for(&path_utils::join(&path, name)),
            };
            // Offset of the next entry; the buffer is full when add returns true
            if reply.add(entry_ino, (index + 1) as i64, file_type(entry.kind), &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        debug!("OPEN: ino={}, flags={:#x}", ino, flags);
        let path = match self.path_of(ino) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match sync_await(&self.runtime, self.operations.open(&path, flags)) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        debug!("CREATE: parent={}, name={:?}", parent, name);
        let path = match self.child_path(parent, name) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        let fh = match sync_await(&self.runtime, self.operations.create(&path)) {
            Ok(fh) => fh,
            Err(e) => return reply.error(e.errno()),
        };
        let ino = self.inodes.ino_for(&path);
        let attr = NodeAttributes::staged(0, None).to_file_attr(ino, req.uid(), req.gid());
        reply.created(&TTL, &attr, 0, fh, 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!("READ: ino={}, fh={}, offset={}, size={}", ino, fh, offset, size);
        match self
            .operations
            .read(fh, size as usize, offset.max(0) as u64)
        {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!("WRITE: ino={}, fh={}, offset={}, len={}", ino, fh, offset, data.len());
        match self.operations.write(fh, data, offset.max(0) as u64) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        debug!("RELEASE: ino={}, fh={}", ino, fh);
        match sync_await(&self.runtime, self.operations.release(fh)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("UNLINK: parent={}, name={:?}", parent, name);
        let path = match self.child_path(parent, name) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match sync_await(&self.runtime, self.operations.unlink(&path)) {
            Ok(()) => {
                self.inodes.forget_path(&path);
                reply.ok()
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        debug!("MKDIR: parent={}, name={:?}", parent, name);
        let path = match self.child_path(parent, name) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match sync_await(&self.runtime, self.operations.mkdir(&path)) {
            Ok(folder) => {
                let ino = self.inodes.ino_for(&path);
                let attr = NodeAttributes::from_entry(&folder).to_file_attr(ino, req.uid(), req.gid());
                reply.entry(&TTL, &attr, 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!("RMDIR: parent={}, name={:?}", parent, name);
        let path = match self.child_path(parent, name) {
            Ok(path) => path,
            Err(errno) => return reply.error(errno),
        };
        match sync_await(&self.runtime, self.operations.rmdir(&path)) {
            Ok(()) => {
                self.inodes.forget_path(&path);
                reply.ok()
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        debug!("STATFS");
        // The API exposes no quota; report a large, mostly free volume
        reply.statfs(
            1_000_000_000,
            500_000_000,
            500_000_000,
            1_000_000,
            500_000,
            crate::fuse::attributes::BLOCK_SIZE,
            MAX_NAME_LENGTH,
            0,
        );
    }
}

/// Mount `fs` at `mountpoint`, blocking until it is unmounted
pub fn mount_filesystem(fs: FileJumpFuse, mountpoint: &Path) -> Result<()> {
    let options = vec![
        MountOption::RW,
        MountOption::FSName("filejump".to_string()),
        MountOption::DefaultPermissions,
    ];

    info!("Mounting FileJump filesystem at: {}", mountpoint.display());
    fuser::mount2(fs, mountpoint, &options)
        .map_err(|e| anyhow::anyhow!("Failed to mount filesystem: {}", e))?;
    Ok(())
}
