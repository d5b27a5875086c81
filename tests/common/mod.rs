#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use filejump_fuse::error::RemoteError;
use filejump_fuse::filejump_service::filejump_client::FileJumpClientTrait;
use filejump_fuse::filejump_service::models::{Entry, ListPage};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

struct MockNode {
    entry: Entry,
    content: Vec<u8>,
}

struct MockState {
    nodes: BTreeMap<u64, MockNode>,
    next_id: u64,
    page_size: usize,
    should_fail_operations: Vec<String>,
}

/// In-memory FileJump account implementing FileJumpClientTrait
#[derive(Clone)]
pub struct MockFileJumpClient {
    state: Arc<Mutex<MockState>>,
    call_counter: Arc<Mutex<HashMap<String, usize>>>,
}

impl Default for MockFileJumpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFileJumpClient {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                nodes: BTreeMap::new(),
                next_id: 100,
                page_size: 1000,
                should_fail_operations: Vec::new(),
            })),
            call_counter: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Entries per listing page
    pub fn set_page_size(&self, page_size: usize) {
        self.state.lock().unwrap().page_size = page_size.max(1);
    }

    fn insert(&self, parent_id: u64, name: &str, is_dir: bool, content: &[u8]) -> Entry {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;

        let mut path = state
            .nodes
            .get(&parent_id)
            .map(|parent| parent.entry.path.clone())
            .unwrap_or_default();
        path.push(id);

        let now = Utc::now();
        let entry = Entry {
            id,
            parent_id: (parent_id != 0).then_some(parent_id),
            name: name.to_string(),
            path,
            size: if is_dir { 0 } else { content.len() as u64 },
            is_dir,
            created_at: now,
            updated_at: now,
        };
        state.nodes.insert(
            id,
            MockNode {
                entry: entry.clone(),
                content: content.to_vec(),
            },
        );
        entry
    }

    pub fn add_folder(&self, parent_id: u64, name: &str) -> Entry {
        self.insert(parent_id, name, true, &[])
    }

    pub fn add_file(&self, parent_id: u64, name: &str, content: &[u8]) -> Entry {
        self.insert(parent_id, name, false, content)
    }

    pub fn children_of(&self, parent_id: u64) -> Vec<Entry> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .values()
            .filter(|node| node.entry.parent() == parent_id)
            .map(|node| node.entry.clone())
            .collect()
    }

    pub fn content_of(&self, id: u64) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .get(&id)
            .map(|node| node.content.clone())
    }

    /// Make specific operations fail
    pub fn make_operation_fail(&self, operation: &str) {
        let mut state = self.state.lock().unwrap();
        if !state.should_fail_operations.iter().any(|op| op == operation) {
            state.should_fail_operations.push(operation.to_string());
        }
    }

    /// Make all operations succeed (clear failure list)
    pub fn clear_operation_failures(&self) {
        self.state.lock().unwrap().should_fail_operations.clear();
    }

    /// Get call count for a specific operation
    pub fn get_call_count(&self, operation: &str) -> usize {
        self.call_counter
            .lock()
            .unwrap()
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn reset_call_counters(&self) {
        self.call_counter.lock().unwrap().clear();
    }

    /// Count the call and report whether it should fail
    fn should_fail_operation(&self, operation: &str) -> bool {
        {
            let mut counter = self.call_counter.lock().unwrap();
            *counter.entry(operation.to_string()).or_insert(0) += 1;
        }
        let state = self.state.lock().unwrap();
        state.should_fail_operations.iter().any(|op| op == operation)
    }

    fn failure(operation: &str) -> RemoteError {
        RemoteError::Status {
            status: 500,
            body: format!("Mock {} failure", operation),
        }
    }
}

#[async_trait]
impl FileJumpClientTrait for MockFileJumpClient {
    async fn list_page(&self, parent_id: u64, page: u32) -> Result<ListPage, RemoteError> {
        if self.should_fail_operation("list_page") {
            return Err(Self::failure("list_page"));
        }
        let page_size = self.state.lock().unwrap().page_size;
        let children = self.children_of(parent_id);
        let start = page as usize * page_size;
        let data: Vec<Entry> = children.iter().skip(start).take(page_size).cloned().collect();
        let next_page = (start + page_size < children.len()).then_some(page + 1);
        Ok(ListPage { data, next_page })
    }

    async fn download(&self, id: u64) -> Result<Vec<u8>, RemoteError> {
        if self.should_fail_operation("download") {
            return Err(Self::failure("download"));
        }
        self.content_of(id).ok_or(RemoteError::Status {
            status: 404,
            body: String::new(),
        })
    }

    async fn delete_entries(&self, ids: &[u64]) -> Result<(), RemoteError> {
        if self.should_fail_operation("delete") {
            return Err(Self::failure("delete"));
        }
        let mut state = self.state.lock().unwrap();
        for id in ids {
            state.nodes.remove(id);
        }
        Ok(())
    }

    async fn create_folder(&self, parent_id: u64, name: &str) -> Result<Entry, RemoteError> {
        if self.should_fail_operation("create_folder") {
            return Err(Self::failure("create_folder"));
        }
        Ok(self.add_folder(parent_id, name))
    }

    async fn upload_file(
        &self,
        parent_id: u64,
        name: &str,
        local_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<Entry>, RemoteError> {
        if self.should_fail_operation("upload") {
            return Err(Self::failure("upload"));
        }
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let content = std::fs::read(local_path).map_err(RemoteError::Source)?;
        Ok(Some(self.add_file(parent_id, name, &content)))
    }
}
