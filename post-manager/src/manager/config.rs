/*!
Configuration management for the post manager
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::manager::error::ManagerError;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Remote posts service
    pub api: ApiConfig,
    /// Durable queue storage
    pub storage: StorageConfig,
    /// Reconcile and refresh behavior
    pub reconcile: ReconcileConfig,
    /// Where reconcile reports go
    pub outputs: Vec<OutputConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the posts service, without the `/posts` suffix
    pub base_url: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding the key-value state
    pub state_db_path: PathBuf,
    /// Key the delete queue is stored under
    pub queue_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Interval between reconcile runs in watch mode, in milliseconds
    pub interval_ms: u64,
    /// What refresh does with queue entries reconcile could not drain
    pub refresh_policy: RefreshPolicy,
    /// In watch mode, turn every Nth tick into a full refresh (0 disables)
    pub refresh_every: u32,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Drop the whole queue once the fresh collection has been fetched
    #[default]
    ClearQueue,
    /// Keep entries whose remote delete has not succeeded yet
    KeepUnresolved,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Output plugin type
    pub plugin: OutputPlugin,
    /// Whether this output is enabled
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputPlugin {
    JsonLines { path: PathBuf },
    Webhook {
        url: String,
        auth_token: Option<String>,
        /// Per-delivery timeout; falls back to `api.timeout_ms`
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    Terminal { format: TerminalFormat },
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminalFormat {
    Plain,
    Colored,
    Json,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            reconcile: ReconcileConfig::default(),
            outputs: vec![OutputConfig {
                plugin: OutputPlugin::Terminal {
                    format: TerminalFormat::Colored,
                },
                enabled: true,
            }],
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: posts_api::DEFAULT_BASE_URL.to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_db_path: default_state_path(),
            queue_key: "deleteQueue".to_string(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            refresh_policy: RefreshPolicy::ClearQueue,
            refresh_every: 0,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ReconcileConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl ManagerConfig {
    /// Parse a TOML document; missing sections fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ManagerError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML config file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ManagerError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }
}

fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("post-manager").join("state.db"))
        .unwrap_or_else(|| PathBuf::from("./post_manager_state.db"))
}
