//! Remote directory index
//!
//! Resolves mount paths to remote folder ids and caches folder listings.
//! All state sits behind one async mutex that stays locked while a cold
//! listing is fetched, so concurrent lookups of uncached folders queue up
//! behind each other.

use crate::error::{FsError, FsResult};
use crate::filejump_service::filejump_client::FileJumpClientTrait;
use crate::filejump_service::models::Entry;
use crate::index::path_utils;
use log::{debug, info, warn};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Number of folder listings kept in memory
pub const DEFAULT_LISTING_CAPACITY: usize = 20;

/// Number of resolved folder paths kept in memory
pub const DEFAULT_PATH_CAPACITY: usize = 1024;

/// Remembered child names per remembered path
const NAMES_PER_PATH: usize = 8;

/// Root folder id
pub const ROOT_ID: u64 = 0;

struct IndexState {
    listings: LruCache<u64, Vec<Entry>>,
    paths: LruCache<String, u64>,
    names: LruCache<u64, String>,
}

pub struct DirectoryIndex {
    client: Arc<dyn FileJumpClientTrait>,
    state: Mutex<IndexState>,
}

impl DirectoryIndex {
    pub fn new(client: Arc<dyn FileJumpClientTrait>) -> Self {
        Self::with_capacity(client, DEFAULT_LISTING_CAPACITY, DEFAULT_PATH_CAPACITY)
    }

    pub fn with_capacity(
        client: Arc<dyn FileJumpClientTrait>,
        listing_capacity: usize,
        path_capacity: usize,
    ) -> Self {
        Self {
            client,
            state: Mutex::new(IndexState {
                listings: LruCache::new(bounded(listing_capacity)),
                paths: LruCache::new(bounded(path_capacity)),
                names: LruCache::new(bounded(path_capacity.saturating_mul(NAMES_PER_PATH))),
            }),
        }
    }

    /// Id of the folder at `path`. `/` and the empty path are the root.
    pub async fn resolve_path_to_id(&self, path: &str) -> FsResult<u64> {
        let segments = path_utils::segments(path);
        if segments.is_empty() {
            return Ok(ROOT_ID);
        }

        let mut state = self.state.lock().await;

        // Start from the deepest ancestor already known
        let mut current = ROOT_ID;
        let mut resolved = 0;
        for depth in (1..=segments.len()).rev() {
            let prefix = format!("/{}", segments[..depth].join("/"));
            if let Some(id) = state.paths.get(&prefix) {
                current = *id;
                resolved = depth;
                break;
            }
        }

        for depth in resolved..segments.len() {
            let name = segments[depth];
            let children = self.list_locked(&mut state, current).await;
            let folder = children
                .iter()
                .find(|entry| entry.is_dir && entry.name == name)
                .map(|entry| entry.id);
            match folder {
                Some(id) => {
                    let prefix = format!("/{}", segments[..=depth].join("/"));
                    state.paths.push(prefix, id);
                    state.names.push(id, name.to_string());
                    current = id;
                }
                None => {
                    debug!("No folder named {} under {} while resolving {}", name, current, path);
                    return Err(FsError::NotFound);
                }
            }
        }
        Ok(current)
    }

    /// Children of folder `id`, served from the cache when present
    pub async fn list_directory(&self, id: u64) -> Vec<Entry> {
        let mut state = self.state.lock().await;
        self.list_locked(&mut state, id).await
    }

    async fn list_locked(&self, state: &mut IndexState, id: u64) -> Vec<Entry> {
        if let Some(cached) = state.listings.get(&id) {
            return cached.clone();
        }

        let (entries, complete) = self.fetch_all_pages(id).await;
        for entry in &entries {
            state.names.push(entry.id, entry.name.clone());
        }
        if complete {
            if let Some((evicted, _)) = state.listings.push(id, entries.clone()) {
                if evicted != id {
                    debug!("Evicted listing of folder {}", evicted);
                }
            }
        }
        entries
    }

    /// Walk the pages from 0 until the server stops announcing a next one.
    /// The flag is false when a page failed; entries gathered so far are kept.
    async fn fetch_all_pages(&self, id: u64) -> (Vec<Entry>, bool) {
        let mut entries = Vec::new();
        let mut page = 0;
        loop {
            match self.client.list_page(id, page).await {
                Ok(listing) => {
                    entries.extend(listing.data);
                    match listing.next_page {
                        Some(next) => page = next,
                        None => return (entries, true),
                    }
                }
                Err(e) => {
                    warn!("Failed to list folder {} (page {}): {}", id, page, e);
                    return (entries, false);
                }
            }
        }
    }

    /// Entry at `path`, or `None` when it or its parent cannot be found
    pub async fn find_file(&self, path: &str) -> Option<Entry> {
        self.lookup(path).await.map(|(_, entry)| entry)
    }

    /// Like `find_file`, also returning the id of the listing it came from
    pub async fn lookup(&self, path: &str) -> Option<(u64, Entry)> {
        let (parent, name) = path_utils::split_parent(path)?;
        let parent_id = self.resolve_path_to_id(&parent).await.ok()?;
        self.list_directory(parent_id)
            .await
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| (parent_id, entry))
    }

    /// Forget the cached listing of `id`
    pub async fn invalidate(&self, id: u64) {
        let mut state = self.state.lock().await;
        if state.listings.pop(&id).is_some() {
            debug!("Invalidated listing of folder {}", id);
        }
    }

    /// Cached name of an id seen in any listing
    pub async fn cached_name(&self, id: u64) -> Option<String> {
        self.state.lock().await.names.peek(&id).cloned()
    }

    pub async fn is_listing_cached(&self, id: u64) -> bool {
        self.state.lock().await.listings.contains(&id)
    }

    pub async fn create_directory(&self, parent_id: u64, name: &str) -> FsResult<Entry> {
        let folder = self.client.create_folder(parent_id, name).await?;

        let mut state = self.state.lock().await;
        state.listings.pop(&parent_id);
        state.names.push(folder.id, folder.name.clone());
        if let Some(parent_path) = path_of(&state, parent_id) {
            state
                .paths
                .push(path_utils::join(&parent_path, &folder.name), folder.id);
        }
        info!("📁 Created folder {} (id {})", folder.name, folder.id);
        Ok(folder)
    }

    /// Permanently delete `id`. False when the server refused.
    pub async fn delete_entry(&self, parent_id: u64, id: u64) -> bool {
        if let Err(e) = self.client.delete_entries(&[id]).await {
            warn!("Failed to delete entry {}: {}", id, e);
            return false;
        }

        let mut state = self.state.lock().await;
        state.listings.pop(&parent_id);
        state.listings.pop(&id);
        state.names.pop(&id);
        if let Some(path) = path_of(&state, id) {
            let nested = format!("{}/", path);
            let stale: Vec<String> = state
                .paths
                .iter()
                .filter(|(cached, _)| **cached == path || cached.starts_with(&nested))
                .map(|(cached, _)| cached.clone())
                .collect();
            for cached in stale {
                state.paths.pop(&cached);
            }
        }
        true
    }

    /// Upload a local file as `name` under `parent_id`.
    /// `Ok(None)` when the upload was cancelled.
    pub async fn upload_file(
        &self,
        parent_id: u64,
        name: &str,
        local_path: &Path,
        cancel: &CancellationToken,
    ) -> FsResult<Option<Entry>> {
        let uploaded = self
            .client
            .upload_file(parent_id, name, local_path, cancel)
            .await?;

        let touched = uploaded
            .as_ref()
            .map(|entry| entry.parent())
            .unwrap_or(parent_id);
        self.invalidate(touched).await;
        if touched != parent_id {
            self.invalidate(parent_id).await;
        }
        Ok(uploaded)
    }

    /// Write the content of entry `id` to `dest`
    pub async fn download_file(&self, id: u64, dest: &Path) -> FsResult<()> {
        let content = self.client.download(id).await?;
        tokio::fs::write(dest, &content).await?;
        debug!("Downloaded entry {} to {}", id, dest.display());
        Ok(())
    }
}

fn bounded(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

fn path_of(state: &IndexState, id: u64) -> Option<String> {
    if id == ROOT_ID {
        return Some("/".to_string());
    }
    state
        .paths
        .iter()
        .find(|(_, cached)| **cached == id)
        .map(|(path, _)| path.clone())
}
