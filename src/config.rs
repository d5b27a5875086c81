//! Command line and settings file

use crate::filejump_service::uploader::{UploadConfig, CHUNK_SIZE};
use crate::index::directory_index::DEFAULT_PATH_CAPACITY;
use crate::index::DEFAULT_LISTING_CAPACITY;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

static SETTINGS_FILE_NAME: &str = "settings.json";

/// How a dirty file replaces its remote copy on close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReplacePolicy {
    /// Delete the remote entry, then upload. A failed upload loses the old copy.
    #[default]
    DeleteThenUpload,
    /// Upload first and delete the previous entry only once that succeeded
    UploadThenDelete,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "filejump-fuse",
    version,
    about = "Mount a FileJump account as a FUSE filesystem"
)]
pub struct Cli {
    /// Mount point path
    pub mountpoint: PathBuf,

    /// FileJump server URL
    #[arg(long, env = "FILEJUMP_BASE_URL")]
    pub server: Option<String>,

    /// Bearer token; takes precedence over email and password
    #[arg(long, env = "FILEJUMP_AUTH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long)]
    pub user_email: Option<String>,

    #[arg(long, requires = "user_email")]
    pub password: Option<String>,

    /// Directory for staging copies of open files
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub replace_policy: Option<ReplacePolicy>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

/// How the mount authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Login { email: String, password: String },
}

impl Cli {
    pub fn server_url(&self) -> Result<&str> {
        self.server
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow!("no server given; pass --server or set FILEJUMP_BASE_URL"))
    }

    pub fn credentials(&self) -> Result<Credentials> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::Token(token.clone()));
        }
        match (&self.user_email, &self.password) {
            (Some(email), Some(password)) => Ok(Credentials::Login {
                email: email.clone(),
                password: password.clone(),
            }),
            _ => Err(anyhow!(
                "no credentials; pass --token (or FILEJUMP_AUTH_TOKEN) or --user-email with --password"
            )),
        }
    }
}

/// Project directories plus the loaded settings
pub struct ProjectConfig {
    pub settings: Settings,
    pub project_dirs: ProjectDirs,
}

impl ProjectConfig {
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("com", "filejump", "filejump-fuse")
            .ok_or_else(|| anyhow!("Failed to get project directories"))?;
        for dir in [
            project_dirs.config_dir(),
            project_dirs.cache_dir(),
            project_dirs.data_dir(),
        ] {
            if !dir.exists() {
                fs::create_dir_all(dir).context("Failed to create project directory")?;
            }
        }

        let settings = Settings::new(&project_dirs.config_dir().join(SETTINGS_FILE_NAME))?;
        Ok(Self {
            settings,
            project_dirs,
        })
    }

    pub fn default_staging_dir(&self) -> PathBuf {
        self.project_dirs.cache_dir().join("staging")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Folder listings kept in memory
    pub listing_cache_capacity: usize,
    /// Resolved folder paths kept in memory
    pub path_cache_capacity: usize,
    pub upload: UploadSettings,
    pub replace_policy: ReplacePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listing_cache_capacity: DEFAULT_LISTING_CAPACITY,
            path_cache_capacity: DEFAULT_PATH_CAPACITY,
            upload: UploadSettings::default(),
            replace_policy: ReplacePolicy::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UploadSettings {
    pub chunk_size: usize,
    pub initial_timeout: Duration,
    pub max_timeout: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            initial_timeout: Duration::from_secs(1),
            max_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&UploadSettings> for UploadConfig {
    fn from(settings: &UploadSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            initial_timeout: settings.initial_timeout,
            max_timeout: settings.max_timeout,
        }
    }
}

impl Settings {
    /// Load from `config_file_path`, writing defaults when it is missing.
    /// A file that exists but does not parse is an error and is left alone.
    pub fn new(config_file_path: &Path) -> Result<Self> {
        if !config_file_path.exists() {
            info!(
                "No settings at {} - creating default config",
                config_file_path.display()
            );
            let default = Self::default();
            default.save_to_file(config_file_path)?;
            return Ok(default);
        }
        Self::load_settings_from_file(config_file_path).with_context(|| {
            format!("Invalid settings file {}", config_file_path.display())
        })
    }

    pub fn load_settings_from_file(config_file_path: &Path) -> Result<Self> {
        if !config_file_path.exists() {
            return Err(anyhow!("Config file not found"));
        }
        let data = fs::read_to_string(config_file_path)?;
        let settings: Self = serde_json::from_str(&data)?;
        Ok(settings)
    }

    pub fn save_to_file(&self, config_file_path: &Path) -> Result<()> {
        if let Some(parent_path) = config_file_path.parent() {
            fs::create_dir_all(parent_path).context("Failed to create config directory")?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(config_file_path, data)?;
        Ok(())
    }
}
