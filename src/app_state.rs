use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::auth::{FileJumpAuth, Session};
use crate::config::{Cli, Credentials, ProjectConfig, ReplacePolicy, Settings};
use crate::filejump_service::filejump_client::{FileJumpClient, FileJumpClientTrait};
use crate::fuse::FileJumpOperations;
use crate::index::DirectoryIndex;

/// Everything a mount needs, built once at startup and dropped at unmount
#[derive(Clone)]
pub struct MountContext {
    pub operations: Arc<FileJumpOperations>,
}

impl MountContext {
    /// Wire index and operations around an already authenticated client
    pub fn from_client(
        client: Arc<dyn FileJumpClientTrait>,
        settings: &Settings,
        staging_dir: PathBuf,
        replace_policy: ReplacePolicy,
    ) -> Result<Self> {
        let index = Arc::new(DirectoryIndex::with_capacity(
            client,
            settings.listing_cache_capacity,
            settings.path_cache_capacity,
        ));
        let operations = FileJumpOperations::new(index, &staging_dir, replace_policy)
            .with_context(|| format!("Failed to prepare staging dir {}", staging_dir.display()))?;
        Ok(Self {
            operations: Arc::new(operations),
        })
    }
}

/// Authenticate and build the mount context from the command line
pub async fn mount_context_factory(cli: &Cli, project_config: &ProjectConfig) -> Result<MountContext> {
    let server = cli.server_url()?;
    let session = Arc::new(Session::new(server, ""));

    match cli.credentials()? {
        Credentials::Token(token) => session.set_token(token),
        Credentials::Login { email, password } => {
            FileJumpAuth::new(session.clone())
                .login(&email, &password)
                .await
                .context("Failed to log in")?;
        }
    }
    info!("Using FileJump server {}", session.base_url());

    let settings = &project_config.settings;
    let client = Arc::new(FileJumpClient::new(
        session.clone(),
        (&settings.upload).into(),
    ));
    let staging_dir = cli
        .staging_dir
        .clone()
        .unwrap_or_else(|| project_config.default_staging_dir());
    let replace_policy = cli.replace_policy.unwrap_or(settings.replace_policy);

    MountContext::from_client(client, settings, staging_dir, replace_policy)
}
