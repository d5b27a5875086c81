use crate::auth::session::Session;
use crate::error::RemoteError;
use crate::filejump_service::http_client::{HttpClient, HttpResponse};
use crate::filejump_service::models::{
    CreateFolderRequest, CreateFolderResponse, DeleteRequest, Entry, ListPage, UploadResponse,
};
use crate::filejump_service::uploader::{FileUploader, UploadConfig};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Method;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Listing page size requested from the server
pub const PAGE_SIZE: u32 = 1000;

const LIST_PATH: &str = "api/v1/drive/file-entries";
const DELETE_PATH: &str = "api/v1/file-entries/delete";
const FOLDERS_PATH: &str = "api/v1/folders";
const UPLOADS_PATH: &str = "api/v1/uploads";
const UPLOAD_DESCRIPTION: &str = "Uploaded via API";

/// Trait defining the FileJump REST operations the index relies on
#[async_trait]
pub trait FileJumpClientTrait: Send + Sync {
    /// One page of the children of `parent_id` (0 is the root)
    async fn list_page(&self, parent_id: u64, page: u32) -> Result<ListPage, RemoteError>;

    /// Raw content of a file entry
    async fn download(&self, id: u64) -> Result<Vec<u8>, RemoteError>;

    /// Permanently delete entries
    async fn delete_entries(&self, ids: &[u64]) -> Result<(), RemoteError>;

    async fn create_folder(&self, parent_id: u64, name: &str) -> Result<Entry, RemoteError>;

    /// Upload `local_path` as `name` under `parent_id`.
    /// `Ok(None)` means the upload was cancelled.
    async fn upload_file(
        &self,
        parent_id: u64,
        name: &str,
        local_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<Entry>, RemoteError>;
}

/// FileJump API client backed by reqwest
pub struct FileJumpClient {
    http_client: HttpClient,
    uploader: FileUploader,
    session: Arc<Session>,
}

impl FileJumpClient {
    pub fn new(session: Arc<Session>, upload_config: UploadConfig) -> Self {
        Self {
            http_client: HttpClient::new(),
            uploader: FileUploader::with_reqwest(upload_config),
            session,
        }
    }

    fn build_list_query(parent_id: u64, page: u32) -> Vec<(&'static str, String)> {
        vec![
            ("perPage", PAGE_SIZE.to_string()),
            ("workspaceId", "0".to_string()),
            ("parentIds", parent_id.to_string()),
            ("page", page.to_string()),
        ]
    }

    /// Root folders are created without a parentId
    fn build_create_folder_body(parent_id: u64, name: &str) -> Result<Vec<u8>, RemoteError> {
        let request = CreateFolderRequest {
            name,
            parent_id: (parent_id != 0).then_some(parent_id),
        };
        Ok(serde_json::to_vec(&request)?)
    }

    fn build_upload_fields(parent_id: u64, name: &str) -> Vec<(String, String)> {
        let parent = if parent_id == 0 {
            "null".to_string()
        } else {
            parent_id.to_string()
        };
        vec![
            ("parentId".to_string(), parent),
            ("relativePath".to_string(), name.to_string()),
            ("description".to_string(), UPLOAD_DESCRIPTION.to_string()),
        ]
    }

    async fn send_json(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, RemoteError> {
        let url = self.session.endpoint(path, query)?;
        let auth_header = format!("Bearer {}", self.session.token());
        let mut headers = vec![
            ("Authorization", auth_header.as_str()),
            ("Accept", "application/json"),
        ];
        if body.is_some() {
            headers.push(("Content-Type", "application/json"));
        }
        self.http_client
            .request(method, url.as_str(), &headers, body)
            .await?
            .error_for_status()
    }
}

#[async_trait]
impl FileJumpClientTrait for FileJumpClient {
    async fn list_page(&self, parent_id: u64, page: u32) -> Result<ListPage, RemoteError> {
        let query = Self::build_list_query(parent_id, page);
        let response = self.send_json(Method::GET, LIST_PATH, &query, None).await?;
        let page_data: ListPage = response.json()?;
        debug!(
            "Listed page {} of folder {}: {} entries, next page {:?}",
            page,
            parent_id,
            page_data.data.len(),
            page_data.next_page
        );
        Ok(page_data)
    }

    async fn download(&self, id: u64) -> Result<Vec<u8>, RemoteError> {
        let path = format!("api/v1/file-entries/{}", id);
        let url = self.session.endpoint(&path, &[])?;
        let auth_header = format!("Bearer {}", self.session.token());
        let response = self
            .http_client
            .request(
                Method::GET,
                url.as_str(),
                &[("Authorization", auth_header.as_str())],
                None,
            )
            .await?
            .error_for_status()?;
        debug!("Downloaded entry {} ({} bytes)", id, response.body.len());
        Ok(response.body)
    }

    async fn delete_entries(&self, ids: &[u64]) -> Result<(), RemoteError> {
        let body = serde_json::to_vec(&DeleteRequest {
            entry_ids: ids.to_vec(),
            delete_forever: true,
        })?;
        self.send_json(Method::POST, DELETE_PATH, &[], Some(body))
            .await?;
        info!("Deleted entries {:?}", ids);
        Ok(())
    }

    async fn create_folder(&self, parent_id: u64, name: &str) -> Result<Entry, RemoteError> {
        let body = Self::build_create_folder_body(parent_id, name)?;
        let response = self
            .send_json(Method::POST, FOLDERS_PATH, &[], Some(body))
            .await?;
        let created: CreateFolderResponse = response.json()?;
        info!("Created folder {} (id {}) under {}", name, created.folder.id, parent_id);
        Ok(created.folder)
    }

    async fn upload_file(
        &self,
        parent_id: u64,
        name: &str,
        local_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<Entry>, RemoteError> {
        let url = self.session.endpoint(UPLOADS_PATH, &[])?;
        let fields = Self::build_upload_fields(parent_id, name);
        let body = self
            .uploader
            .upload_file(
                url.as_str(),
                &self.session.token(),
                &fields,
                local_path,
                name,
                cancel,
            )
            .await?;
        if body.is_empty() {
            return Ok(None);
        }
        let parsed: UploadResponse = serde_json::from_str(&body)?;
        Ok(parsed.file_entry)
    }
}
