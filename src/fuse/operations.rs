//! Path-addressed filesystem operations
//!
//! Everything the kernel asks for is answered here in terms of mount paths
//! and handle ids. File content lives in staging copies while a file is
//! open; the remote copy is replaced on release.

use crate::config::ReplacePolicy;
use crate::error::{FsError, FsResult};
use crate::filejump_service::models::Entry;
use crate::fuse::attributes::{NodeAttributes, NodeKind};
use crate::fuse::file_handles::{FileHandle, FileHandleManager};
use crate::fuse::utils::OpenFlags;
use crate::index::path_utils;
use crate::index::DirectoryIndex;
use log::{debug, error, info, warn};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One line of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: NodeKind,
}

pub struct FileJumpOperations {
    index: Arc<DirectoryIndex>,
    handles: FileHandleManager,
    replace_policy: ReplacePolicy,
    cancel: CancellationToken,
}

impl FileJumpOperations {
    /// Creates the staging directory when missing
    pub fn new(
        index: Arc<DirectoryIndex>,
        staging_dir: impl Into<PathBuf>,
        replace_policy: ReplacePolicy,
    ) -> FsResult<Self> {
        let staging_dir = staging_dir.into();
        std::fs::create_dir_all(&staging_dir)?;
        Ok(Self {
            index,
            handles: FileHandleManager::new(staging_dir),
            replace_policy,
            cancel: CancellationToken::new(),
        })
    }

    pub fn index(&self) -> &Arc<DirectoryIndex> {
        &self.index
    }

    pub fn handles(&self) -> &FileHandleManager {
        &self.handles
    }

    /// Abort uploads in flight once the mount is going away. Every later
    /// write-back fails without touching the remote copy.
    pub fn cancel_uploads(&self) {
        self.cancel.cancel();
    }

    pub async fn get_attributes(&self, path: &str, fh: Option<u64>) -> FsResult<NodeAttributes> {
        if path_utils::is_root(path) {
            return Ok(NodeAttributes::root());
        }

        let staged = match fh {
            Some(fh) => self.handles.get(fh).ok().map(|handle| handle.staging_path),
            None => None,
        }
        .or_else(|| {
            self.handles
                .live_handle_for(&path_utils::normalize(path))
                .map(|handle| handle.staging_path)
        });
        if let Some(staging_path) = staged {
            if let Ok(metadata) = std::fs::metadata(&staging_path) {
                return Ok(NodeAttributes::staged(metadata.len(), None));
            }
        }

        let entry = self.index.find_file(path).await.ok_or(FsError::NotFound)?;
        Ok(NodeAttributes::from_entry(&entry))
    }

    /// Children of the folder at `path`, led by `.` and `..`
    pub async fn list_directory_entries(&self, path: &str) -> FsResult<Vec<DirectoryEntry>> {
        let id = self.index.resolve_path_to_id(path).await?;
        let children = self.index.list_directory(id).await;

        let mut entries = Vec::with_capacity(children.len() + 2);
        for dot in [".", ".."] {
            entries.push(DirectoryEntry {
                name: dot.to_string(),
                kind: NodeKind::Directory,
            });
        }
        entries.extend(children.into_iter().map(|entry| DirectoryEntry {
            kind: if entry.is_dir {
                NodeKind::Directory
            } else {
                NodeKind::File
            },
            name: entry.name,
        }));
        Ok(entries)
    }

    /// Stage a copy of `path` and hand out a handle for it
    pub async fn open(&self, path: &str, flags: i32) -> FsResult<u64> {
        let flags = OpenFlags::from_i32(flags);
        let path = path_utils::normalize(path);
        let (fh, staging_path) = self.handles.reserve();

        if flags.stages_empty() {
            File::create(&staging_path)?;
        } else {
            self.stage_remote_copy(&path, &staging_path).await?;
        }

        self.handles.register(FileHandle {
            id: fh,
            path,
            staging_path,
            dirty: false,
        });
        Ok(fh)
    }

    /// Download into the staging file, falling back to an empty one
    async fn stage_remote_copy(&self, path: &str, staging_path: &Path) -> FsResult<()> {
        match self.index.find_file(path).await {
            Some(entry) if !entry.is_dir => {
                if let Err(e) = self.index.download_file(entry.id, staging_path).await {
                    warn!("Failed to download {}; staging empty file: {}", path, e);
                    File::create(staging_path)?;
                }
            }
            _ => {
                debug!("{} has no remote content; staging empty file", path);
                File::create(staging_path)?;
            }
        }
        Ok(())
    }

    /// New empty file, dirty from the start so it reaches the server on release
    pub async fn create(&self, path: &str) -> FsResult<u64> {
        if self.index.find_file(path).await.is_some() {
            return Err(FsError::AlreadyExists);
        }
        let (fh, staging_path) = self.handles.reserve();
        File::create(&staging_path)?;
        self.handles.register(FileHandle {
            id: fh,
            path: path_utils::normalize(path),
            staging_path,
            dirty: true,
        });
        Ok(fh)
    }

    pub fn read(&self, fh: u64, size: usize, offset: u64) -> FsResult<Vec<u8>> {
        self.handles.read(fh, offset, size)
    }

    pub fn write(&self, fh: u64, data: &[u8], offset: u64) -> FsResult<usize> {
        self.handles.write(fh, offset, data)
    }

    pub fn truncate(&self, fh: u64, size: u64) -> FsResult<()> {
        self.handles.truncate(fh, size)
    }

    /// Resize `path`. Without a usable handle a short-lived one is opened
    /// and released, which writes the result back.
    pub async fn set_size(&self, path: &str, fh: Option<u64>, size: u64) -> FsResult<()> {
        let live = fh
            .and_then(|fh| self.handles.get(fh).ok())
            .or_else(|| self.handles.live_handle_for(&path_utils::normalize(path)));
        if let Some(handle) = live {
            return self.truncate(handle.id, size);
        }

        let flags = if size == 0 {
            libc::O_WRONLY | libc::O_TRUNC
        } else {
            libc::O_RDWR
        };
        let fh = self.open(path, flags).await?;
        if let Err(e) = self.truncate(fh, size) {
            let _ = self.release(fh).await;
            return Err(e);
        }
        self.release(fh).await
    }

    pub async fn unlink(&self, path: &str) -> FsResult<()> {
        let (parent_id, entry) = self.index.lookup(path).await.ok_or(FsError::NotFound)?;
        if !self.index.delete_entry(parent_id, entry.id).await {
            return Err(remote_failure(format!("failed to delete {}", path)));
        }
        Ok(())
    }

    pub async fn mkdir(&self, path: &str) -> FsResult<Entry> {
        let (parent, name) = path_utils::split_parent(path).ok_or(FsError::AlreadyExists)?;
        let parent_id = self.index.resolve_path_to_id(&parent).await?;
        let taken = self
            .index
            .list_directory(parent_id)
            .await
            .iter()
            .any(|entry| entry.name == name);
        if taken {
            return Err(FsError::AlreadyExists);
        }
        self.index.create_directory(parent_id, name).await
    }

    pub async fn rmdir(&self, path: &str) -> FsResult<()> {
        let (parent_id, entry) = self.index.lookup(path).await.ok_or(FsError::NotFound)?;
        if !entry.is_dir {
            return Err(FsError::NotDirectory);
        }
        if !self.index.list_directory(entry.id).await.is_empty() {
            return Err(FsError::NotEmpty);
        }
        if !self.index.delete_entry(parent_id, entry.id).await {
            return Err(remote_failure(format!("failed to delete {}", path)));
        }
        Ok(())
    }

    /// Close a handle. A dirty staging copy replaces the remote file first.
    /// The staging file is removed whatever the outcome.
    pub async fn release(&self, fh: u64) -> FsResult<()> {
        let handle = self.handles.take(fh)?;
        let result = if handle.dirty {
            self.replace_remote(&handle).await
        } else {
            Ok(())
        };

        if let Err(e) = std::fs::remove_file(&handle.staging_path) {
            debug!(
                "Could not remove staging file {}: {}",
                handle.staging_path.display(),
                e
            );
        }
        if let Err(e) = &result {
            error!("Failed to write back {}: {}", handle.path, e);
        }
        result
    }

    async fn replace_remote(&self, handle: &FileHandle) -> FsResult<()> {
        if self.cancel.is_cancelled() {
            return Err(remote_failure(format!(
                "upload of {} skipped: uploads are cancelled",
                handle.path
            )));
        }
        let (parent, name) = path_utils::split_parent(&handle.path).ok_or(FsError::NotFound)?;
        let parent_id = self.index.resolve_path_to_id(&parent).await?;
        let previous = self
            .index
            .lookup(&handle.path)
            .await
            .filter(|(_, entry)| !entry.is_dir)
            .map(|(_, entry)| entry.id);

        match self.replace_policy {
            ReplacePolicy::DeleteThenUpload => {
                if let Some(old_id) = previous {
                    if !self.index.delete_entry(parent_id, old_id).await {
                        warn!("Could not delete previous copy of {}", handle.path);
                    }
                }
                self.upload(handle, parent_id, name).await?;
            }
            ReplacePolicy::UploadThenDelete => {
                let uploaded = self.upload(handle, parent_id, name).await?;
                if let Some(old_id) = previous.filter(|old_id| *old_id != uploaded.id) {
                    if !self.index.delete_entry(parent_id, old_id).await {
                        warn!("Could not delete previous copy of {}", handle.path);
                    }
                }
            }
        }
        Ok(())
    }

    async fn upload(
        &self,
        handle: &FileHandle,
        parent_id: u64,
        name: &str,
    ) -> FsResult<Entry> {
        match self
            .index
            .upload_file(parent_id, name, &handle.staging_path, &self.cancel)
            .await
        {
            Ok(Some(entry)) => {
                info!("⬆️ Uploaded {} ({} bytes)", handle.path, entry.size);
                Ok(entry)
            }
            Ok(None) => {
                warn!("Upload of {} was cancelled", handle.path);
                Err(remote_failure(format!("upload of {} was cancelled", handle.path)))
            }
            Err(e) => Err(remote_failure(format!("upload of {} failed: {}", handle.path, e))),
        }
    }
}

fn remote_failure(message: String) -> FsError {
    FsError::Io(io::Error::other(message))
}
