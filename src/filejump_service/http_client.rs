use crate::error::RemoteError;
use log::{debug, warn};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

pub const USER_AGENT: &str = "filejump-fuse/0.1";

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RemoteError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turn non-2xx responses into `RemoteError::Status`
    pub fn error_for_status(self) -> Result<Self, RemoteError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RemoteError::Status {
                status: self.status,
                body: self.text(),
            })
        }
    }
}

/// HTTP client for FileJump REST calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn request_builder(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.client.request(method, url)
    }

    /// Send a request and collect the body chunk by chunk
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, RemoteError> {
        debug!("{} {}", method, url);
        let mut builder = self.request_builder(method, url);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let mut response = builder.send().await?;
        let status = response.status().as_u16();
        let mut collected = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            collected.extend_from_slice(&chunk);
        }
        if !(200..300).contains(&status) {
            debug!("{} answered with status {}", url, status);
        }

        Ok(HttpResponse {
            status,
            body: collected,
        })
    }

    /// Body of the response, or an empty string when anything fails.
    /// An empty success body is indistinguishable from a failure here;
    /// use `request` when the difference matters.
    pub async fn generic_request(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> String {
        match self.request(method.clone(), url, headers, body).await {
            Ok(response) => response.text(),
            Err(e) => {
                warn!("{} {} failed: {}", method, url, e);
                String::new()
            }
        }
    }
}
