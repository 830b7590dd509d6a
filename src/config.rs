use std::env;
use log::{debug, warn};
use serde::Deserialize;

pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";
pub const DEFAULT_HDFS_NAMENODE: &str = "localhost:9870";
/// Buffer size used by remote handles unless the caller passes another positive value.
pub const DEFAULT_REMOTE_BUFFER_SIZE: usize = 8192;

/// Settings for the remote object store clients.
///
/// Every field has a default, so a partial JSON document or an empty environment
/// still produces a usable configuration.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct MichiConfig {
    /// Base URL of the Google Cloud Storage JSON API (an emulator URL in tests).
    pub gcs_endpoint: String,
    /// Pre-issued bearer token. Token acquisition is left to the caller.
    pub gcs_token: Option<String>,
    /// Namenode authority for `hdfs:///path` style paths.
    pub hdfs_namenode: String,
    pub hdfs_user: Option<String>,
    /// `http` or `https` for the WebHDFS endpoint.
    pub webhdfs_scheme: String,
    pub remote_buffer_size: usize,
}

impl Default for MichiConfig {
    fn default() -> Self {
        Self {
            gcs_endpoint: DEFAULT_GCS_ENDPOINT.to_string(),
            gcs_token: None,
            hdfs_namenode: DEFAULT_HDFS_NAMENODE.to_string(),
            hdfs_user: None,
            webhdfs_scheme: "http".to_string(),
            remote_buffer_size: DEFAULT_REMOTE_BUFFER_SIZE,
        }
    }
}

impl MichiConfig {
    /// Read the `MICHI_*` environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = env::var("MICHI_GCS_ENDPOINT") {
            config.gcs_endpoint = endpoint;
        }
        config.gcs_token = env::var("MICHI_GCS_TOKEN").ok().filter(|token| !token.is_empty());
        if let Ok(namenode) = env::var("MICHI_HDFS_NAMENODE") {
            config.hdfs_namenode = namenode;
        }
        config.hdfs_user = env::var("MICHI_HDFS_USER").ok().filter(|user| !user.is_empty());
        if let Ok(scheme) = env::var("MICHI_WEBHDFS_SCHEME") {
            config.webhdfs_scheme = scheme;
        }
        if let Ok(size) = env::var("MICHI_REMOTE_BUFFER_SIZE") {
            match size.parse::<usize>() {
                Ok(size) if size > 0 => config.remote_buffer_size = size,
                _ => warn!("Ignore invalid MICHI_REMOTE_BUFFER_SIZE: {}", size),
            }
        }

        debug!("Loaded config from environment: {:?}", config.redacted());
        config
    }

    /// Parse a JSON document, missing fields fall back to the defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.gcs_token.is_some() {
            config.gcs_token = Some("***".to_string());
        }
        config
    }
}
