use crate::error::RemoteError;
use std::sync::RwLock;
use url::Url;

/// Base URL and bearer token shared by every REST call of a mount
#[derive(Debug)]
pub struct Session {
    base_url: String,
    token: RwLock<String>,
}

/// Append the trailing `/` relative endpoints are joined onto
pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

impl Session {
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            token: RwLock::new(token.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> String {
        match self.token.read() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn has_token(&self) -> bool {
        !self.token().is_empty()
    }

    /// Absolute URL of `path` (relative to the base) with query pairs appended
    pub fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, RemoteError> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| RemoteError::Protocol(format!("invalid base url {}: {}", self.base_url, e)))?;
        let mut url = base
            .join(path)
            .map_err(|e| RemoteError::Protocol(format!("invalid endpoint {}: {}", path, e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}
