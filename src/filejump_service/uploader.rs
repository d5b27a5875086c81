//! Streaming multipart upload
//!
//! The request body is produced lazily: text fields, then the file read from
//! disk in fixed-size chunks, then the closing boundary. Nothing larger than
//! one chunk is held in memory.

use crate::error::RemoteError;
use crate::filejump_service::http_client::{HttpResponse, USER_AGENT};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use log::{debug, info, warn};
use rand::Rng;
use reqwest::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

pub const CHUNK_SIZE: usize = 64 * 1024;
pub const EXPECTED_STATUS: u16 = 201;
const BOUNDARY_PREFIX: &str = "----WebKitFormBoundary";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

static MIME_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("zip", "application/zip"),
    ("rar", "application/x-rar-compressed"),
    ("7z", "application/x-7z-compressed"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
    ("avi", "video/x-msvideo"),
    ("mov", "video/quicktime"),
];

/// MIME type for a file name, by extension
pub fn mime_type_for(name: &str) -> &'static str {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return DEFAULT_MIME_TYPE;
    };
    let ext = ext.to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Fixed prefix followed by 16 random hex digits.
/// Content is never scanned for the boundary; a collision is left to chance.
pub fn generate_boundary() -> String {
    let mut rng = rand::rng();
    let mut boundary = String::with_capacity(BOUNDARY_PREFIX.len() + 16);
    boundary.push_str(BOUNDARY_PREFIX);
    for _ in 0..16 {
        let digit: u32 = rng.random_range(0..16);
        boundary.push(char::from_digit(digit, 16).unwrap_or('0'));
    }
    boundary
}

pub fn build_multipart_header(
    fields: &[(String, String)],
    file_name: &str,
    mime_type: &str,
    boundary: &str,
) -> String {
    let mut header = String::new();
    for (name, value) in fields {
        header.push_str(&format!("--{}\r\n", boundary));
        header.push_str(&format!(
            "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
            name
        ));
        header.push_str(value);
        header.push_str("\r\n");
    }
    header.push_str(&format!("--{}\r\n", boundary));
    header.push_str(&format!(
        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
        file_name
    ));
    header.push_str(&format!("Content-Type: {}\r\n\r\n", mime_type));
    header
}

pub fn build_multipart_footer(boundary: &str) -> String {
    format!("\r\n--{}--\r\n", boundary)
}

/// A multipart/form-data body backed by a file on disk
#[derive(Debug)]
pub struct MultipartBody {
    boundary: String,
    header: Bytes,
    footer: Bytes,
    file: File,
    file_size: u64,
    chunk_size: usize,
    cancel: CancellationToken,
}

impl MultipartBody {
    /// `remote_name` is the filename announced in the file part
    pub async fn open(
        file_path: &Path,
        remote_name: &str,
        fields: &[(String, String)],
        chunk_size: usize,
        cancel: CancellationToken,
    ) -> io::Result<Self> {
        let file = File::open(file_path).await?;
        let file_size = file.metadata().await?.len();
        let boundary = generate_boundary();
        let header =
            build_multipart_header(fields, remote_name, mime_type_for(remote_name), &boundary);
        let footer = build_multipart_footer(&boundary);
        Ok(Self {
            boundary,
            header: Bytes::from(header),
            footer: Bytes::from(footer),
            file,
            file_size,
            chunk_size: chunk_size.max(1),
            cancel,
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Declared before the first byte is sent
    pub fn content_length(&self) -> u64 {
        self.header.len() as u64 + self.file_size + self.footer.len() as u64
    }

    /// Header, file chunks, footer. Every chunk turns into an `Interrupted`
    /// error once the token is cancelled.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        let cancel = self.cancel;
        let header = stream::once(future::ready(Ok(self.header)));
        let content = ReaderStream::with_capacity(self.file, self.chunk_size);
        let footer = stream::once(future::ready(Ok(self.footer)));

        header.chain(content).chain(footer).map(move |chunk| {
            if cancel.is_cancelled() {
                Err(io::Error::new(io::ErrorKind::Interrupted, "upload cancelled"))
            } else {
                chunk
            }
        })
    }
}

/// One attempt of an upload
#[derive(Debug)]
pub struct UploadRequest {
    pub url: String,
    pub token: String,
    pub body: MultipartBody,
    pub timeout: Duration,
}

/// Sends a fully described multipart request
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send(&self, request: UploadRequest) -> Result<HttpResponse, RemoteError>;
}

/// Transport backed by reqwest. A fresh client per attempt carries the
/// attempt's connect and read timeouts.
#[derive(Debug, Default, Clone)]
pub struct ReqwestTransport;

#[async_trait]
impl UploadTransport for ReqwestTransport {
    async fn send(&self, request: UploadRequest) -> Result<HttpResponse, RemoteError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(request.timeout)
            .read_timeout(request.timeout)
            .build()?;

        let content_length = request.body.content_length();
        let content_type = request.body.content_type();
        debug!(
            "POST {} ({} bytes, timeout {:?})",
            request.url, content_length, request.timeout
        );

        let mut response = client
            .post(&request.url)
            .bearer_auth(&request.token)
            .header(ACCEPT, "*/*")
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, content_length)
            .body(Body::wrap_stream(request.body.into_stream()))
            .send()
            .await?;

        let status = response.status().as_u16();
        let mut collected = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            collected.extend_from_slice(&chunk);
        }
        Ok(HttpResponse {
            status,
            body: collected,
        })
    }
}

/// Upload tuning
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub chunk_size: usize,
    /// Timeout of the first attempt; multiplied by ten on every timeout
    pub initial_timeout: Duration,
    /// Once an attempt with a timeout above this fails, give up
    pub max_timeout: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            initial_timeout: Duration::from_secs(1),
            max_timeout: Duration::from_secs(10),
        }
    }
}

/// Streams files to the upload endpoint, retrying on timeouts
#[derive(Clone)]
pub struct FileUploader {
    transport: Arc<dyn UploadTransport>,
    config: UploadConfig,
}

impl FileUploader {
    pub fn new(transport: Arc<dyn UploadTransport>, config: UploadConfig) -> Self {
        Self { transport, config }
    }

    pub fn with_reqwest(config: UploadConfig) -> Self {
        Self::new(Arc::new(ReqwestTransport), config)
    }

    /// Upload `file_path` as the `file` part named `remote_name`.
    ///
    /// Returns the response body on HTTP 201. Returns an empty string when
    /// `cancel` fired before the request completed.
    pub async fn upload_file(
        &self,
        endpoint: &str,
        token: &str,
        fields: &[(String, String)],
        file_path: &Path,
        remote_name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, RemoteError> {
        let mut timeout = self.config.initial_timeout;
        loop {
            if cancel.is_cancelled() {
                info!("Upload of {} cancelled", file_path.display());
                return Ok(String::new());
            }

            let body = MultipartBody::open(
                file_path,
                remote_name,
                fields,
                self.config.chunk_size,
                cancel.clone(),
            )
            .await
            .map_err(RemoteError::Source)?;
            let request = UploadRequest {
                url: endpoint.to_string(),
                token: token.to_string(),
                body,
                timeout,
            };

            match self.transport.send(request).await {
                Ok(response) => {
                    if response.status != EXPECTED_STATUS {
                        warn!(
                            "Upload of {} returned status {}",
                            file_path.display(),
                            response.status
                        );
                        return Err(RemoteError::Status {
                            status: response.status,
                            body: response.text(),
                        });
                    }
                    info!("Uploaded {} as {}", file_path.display(), remote_name);
                    return Ok(response.text());
                }
                Err(_) if cancel.is_cancelled() => {
                    info!("Upload of {} cancelled", file_path.display());
                    return Ok(String::new());
                }
                Err(RemoteError::Timeout) => {
                    if timeout > self.config.max_timeout {
                        warn!(
                            "Upload of {} timed out; giving up after {:?}",
                            file_path.display(),
                            timeout
                        );
                        return Err(RemoteError::Timeout);
                    }
                    timeout *= 10;
                    info!(
                        "Upload of {} timed out; retrying with timeout {:?}",
                        file_path.display(),
                        timeout
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
