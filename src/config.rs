//! DeployDeck configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main DeployDeck configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployDeckConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Deployment execution configuration
    #[serde(default)]
    pub deploy: DeployConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS (empty = allow any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2111,
            cors_origins: Vec::new(),
        }
    }
}

/// Deployment execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Directory holding the deploy scripts and their shared/ helpers
    pub scripts_dir: PathBuf,

    /// Deploy script for standard projects
    pub script_name: String,

    /// Deploy script for customization projects
    pub customization_script_name: String,

    /// WSL user for Windows hosts
    pub wsl_user: String,

    /// Shell fragment run before the script (e.g. enabling a proxy)
    pub pre_command: Option<String>,

    /// Hard limit on a single deployment run, in seconds
    pub command_timeout_secs: u64,

    /// Capacity of each session's outbound message queue
    pub queue_capacity: usize,

    /// Idle interval before a keepalive frame is emitted, in seconds
    pub keepalive_secs: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("scripts"),
            script_name: "deploy.sh".to_string(),
            customization_script_name: "deploy-customization.sh".to_string(),
            wsl_user: "k8s".to_string(),
            pre_command: None,
            command_timeout_secs: 1800,
            queue_capacity: 100,
            keepalive_secs: 30,
        }
    }
}

impl DeployDeckConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }
}
