//! Inode numbers for mount paths
//!
//! Remote ids are not stable across a replace (a re-upload gets a new id),
//! so inodes are keyed by path instead.

use crate::fuse::utils::ROOT_INO;
use crate::index::path_utils;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

struct Inodes {
    next: u64,
    by_path: HashMap<String, u64>,
    by_ino: HashMap<u64, String>,
}

pub struct InodeTable {
    inner: Mutex<Inodes>,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        let mut by_path = HashMap::new();
        let mut by_ino = HashMap::new();
        by_path.insert("/".to_string(), ROOT_INO);
        by_ino.insert(ROOT_INO, "/".to_string());
        Self {
            inner: Mutex::new(Inodes {
                next: ROOT_INO + 1,
                by_path,
                by_ino,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inodes> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Inode for `path`, assigning the next free number on first sight
    pub fn ino_for(&self, path: &str) -> u64 {
        let path = path_utils::normalize(path);
        let mut inodes = self.lock();
        if let Some(ino) = inodes.by_path.get(&path) {
            return *ino;
        }
        let ino = inodes.next;
        inodes.next += 1;
        inodes.by_path.insert(path.clone(), ino);
        inodes.by_ino.insert(ino, path);
        ino
    }

    pub fn path_of(&self, ino: u64) -> Option<String> {
        self.lock().by_ino.get(&ino).cloned()
    }

    /// Path of `name` inside the directory `parent`
    pub fn child_path(&self, parent: u64, name: &str) -> Option<String> {
        self.path_of(parent)
            .map(|parent_path| path_utils::join(&parent_path, name))
    }

    /// Forget `path` and everything below it
    pub fn forget_path(&self, path: &str) {
        let path = path_utils::normalize(path);
        if path == "/" {
            return;
        }
        let nested = format!("{}/", path);
        let mut inodes = self.lock();
        let removed: Vec<(String, u64)> = inodes
            .by_path
            .iter()
            .filter(|(cached, _)| **cached == path || cached.starts_with(&nested))
            .map(|(cached, ino)| (cached.clone(), *ino))
            .collect();
        for (cached, ino) in removed {
            inodes.by_path.remove(&cached);
            inodes.by_ino.remove(&ino);
        }
    }
}
