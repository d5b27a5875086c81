//! Attributes reported for mount paths

use crate::filejump_service::models::Entry;
use fuser::{FileAttr, FileType};
use std::time::{SystemTime, UNIX_EPOCH};

pub const BLOCK_SIZE: u32 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    File,
}

/// Inode-independent attributes of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAttributes {
    pub kind: NodeKind,
    pub size: u64,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub crtime: SystemTime,
}

impl NodeAttributes {
    /// The mount root has no remote record
    pub fn root() -> Self {
        Self::directory(UNIX_EPOCH, UNIX_EPOCH)
    }

    fn directory(created: SystemTime, modified: SystemTime) -> Self {
        Self {
            kind: NodeKind::Directory,
            size: 0,
            atime: modified,
            mtime: modified,
            ctime: modified,
            crtime: created,
        }
    }

    /// Access, modification and change times all follow `updated_at`
    pub fn from_entry(entry: &Entry) -> Self {
        let modified = entry.modified_time();
        let created = entry.created_time();
        if entry.is_dir {
            return Self::directory(created, modified);
        }
        Self {
            kind: NodeKind::File,
            size: entry.size,
            atime: modified,
            mtime: modified,
            ctime: modified,
            crtime: created,
        }
    }

    /// A file open for writing: size from the staging copy
    pub fn staged(size: u64, entry: Option<&Entry>) -> Self {
        let now = SystemTime::now();
        let mut attributes = match entry {
            Some(entry) => Self::from_entry(entry),
            None => Self {
                kind: NodeKind::File,
                size: 0,
                atime: now,
                mtime: now,
                ctime: now,
                crtime: now,
            },
        };
        attributes.kind = NodeKind::File;
        attributes.size = size;
        attributes
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn to_file_attr(&self, ino: u64, uid: u32, gid: u32) -> FileAttr {
        let (kind, perm, nlink) = match self.kind {
            NodeKind::Directory => (FileType::Directory, 0o755, 2),
            NodeKind::File => (FileType::RegularFile, 0o644, 1),
        };
        FileAttr {
            ino,
            size: self.size,
            blocks: self.size.div_ceil(BLOCK_SIZE as u64),
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            crtime: self.crtime,
            kind,
            perm,
            nlink,
            uid,
            gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }
}
