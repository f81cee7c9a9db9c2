use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use super::{GatewayError, GatewaySnapshot};

pub const DEFAULT_CONFIG_PATH: &str = "./api.yaml";
pub const CONFIG_URL_ENV: &str = "CONFIG_URL";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("read config file failed: {0}")]
    Read(#[from] std::io::Error),
    #[error("parse config yaml failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("fetch config failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("fetch config failed: status {0}")]
    Status(u16),
}

/// Produces configuration snapshots for a [`super::ConfigStore`].
///
/// `Ok(None)` means no configuration was found; `Err` means one was found but is
/// structurally invalid.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self) -> Result<Option<GatewaySnapshot>, GatewayError>;
}

#[async_trait]
impl ConfigSource for GatewaySnapshot {
    async fn load(&self) -> Result<Option<GatewaySnapshot>, GatewayError> {
        Ok(Some(self.clone()))
    }
}

/// Reads `api.yaml`, falling back to a remote document when the file yields nothing.
#[derive(Clone, Debug)]
pub struct ConfigLoader {
    path: PathBuf,
    config_url: Option<String>,
    client: reqwest::Client,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config_url: None,
            client: reqwest::Client::new(),
        }
    }

    /// Like [`ConfigLoader::new`], taking the fallback URL from `CONFIG_URL`.
    pub fn from_env(path: impl Into<PathBuf>) -> Self {
        let loader = Self::new(path);
        match std::env::var(CONFIG_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => loader.with_config_url(url),
            _ => loader,
        }
    }

    pub fn with_config_url(mut self, url: impl Into<String>) -> Self {
        self.config_url = Some(url.into());
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config_url(&self) -> Option<&str> {
        self.config_url.as_deref()
    }

    /// The first non-empty YAML document from the file, then the URL.
    ///
    /// Never fails: unreadable or unparsable sources are logged and skipped.
    pub async fn load_document(&self) -> Option<serde_yaml::Value> {
        match self.read_file().await {
            Ok(Some(document)) => return Some(document),
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "config file is empty");
            }
            Err(ConfigLoadError::Read(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::error!(path = %self.path.display(), "config file not found");
            }
            Err(err) => {
                tracing::error!(path = %self.path.display(), error = %err, "config file unusable");
            }
        }

        let url = self.config_url.as_deref()?;
        match self.fetch(url).await {
            Ok(Some(document)) => Some(document),
            Ok(None) => {
                tracing::error!(url, "config url returned an empty document");
                None
            }
            Err(err) => {
                tracing::error!(url, error = %err, "fetch config from url failed");
                None
            }
        }
    }

    async fn read_file(&self) -> Result<Option<serde_yaml::Value>, ConfigLoadError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        parse_document(&raw)
    }

    async fn fetch(&self, url: &str) -> Result<Option<serde_yaml::Value>, ConfigLoadError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConfigLoadError::Status(status.as_u16()));
        }
        let raw = response.text().await?;
        parse_document(&raw)
    }
}

fn parse_document(raw: &str) -> Result<Option<serde_yaml::Value>, ConfigLoadError> {
    let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
    let empty = match &value {
        serde_yaml::Value::Null => true,
        serde_yaml::Value::Mapping(map) => map.is_empty(),
        serde_yaml::Value::Sequence(items) => items.is_empty(),
        _ => false,
    };
    Ok((!empty).then_some(value))
}

#[async_trait]
impl ConfigSource for ConfigLoader {
    async fn load(&self) -> Result<Option<GatewaySnapshot>, GatewayError> {
        let Some(document) = self.load_document().await else {
            return Ok(None);
        };
        GatewaySnapshot::from_yaml_value(document).map(Some)
    }
}
