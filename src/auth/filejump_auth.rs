use crate::auth::session::Session;
use crate::error::RemoteError;
use crate::filejump_service::http_client::HttpClient;
use crate::filejump_service::models::{LoginRequest, LoginResponse};
use log::{info, warn};
use reqwest::Method;
use std::sync::Arc;

/// Name under which the issued token shows up in the account's token list
const TOKEN_NAME: &str = "fuse3_token";

const LOGIN_PATH: &str = "api/v1/auth/login";

/// Exchanges account credentials for a bearer token
pub struct FileJumpAuth {
    http_client: HttpClient,
    session: Arc<Session>,
}

impl FileJumpAuth {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            http_client: HttpClient::new(),
            session,
        }
    }

    /// Log in and store the issued token in the session
    pub async fn login(&self, email: &str, password: &str) -> Result<String, RemoteError> {
        let url = self.session.endpoint(LOGIN_PATH, &[])?;
        let body = serde_json::to_vec(&LoginRequest {
            email,
            password,
            token_name: TOKEN_NAME,
        })?;

        info!("🔐 Logging in to {} as {}", self.session.base_url(), email);
        let response = self
            .http_client
            .request(
                Method::POST,
                url.as_str(),
                &[
                    ("Accept", "application/json"),
                    ("Content-Type", "application/json"),
                ],
                Some(body),
            )
            .await?
            .error_for_status()?;

        let parsed: LoginResponse = response.json()?;
        let token = parsed
            .user
            .and_then(|user| user.access_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                warn!("Login response carried no access token");
                RemoteError::Protocol("login response carries no access token".to_string())
            })?;

        self.session.set_token(token.clone());
        info!("✅ Login succeeded");
        Ok(token)
    }
}
