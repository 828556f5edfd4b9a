//! CLI configuration management.

use anyhow::{Context, Result};
use changegate_client::ClientConfig;
use changegate_engine::GateConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub authority: AuthorityConfig,
}

/// Callback server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json_logs: bool,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            json_logs: false,
        }
    }
}

/// Credentials and timeouts for calls to the change-management authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfig {
    #[serde(default = "default_tool_type")]
    pub tool_type: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_tool_type() -> String {
    "jenkins".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            tool_type: default_tool_type(),
            username: None,
            password: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl CliConfig {
    /// Load from `path`, or from the default location when none is given.
    ///
    /// A missing default file yields the default configuration; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path()?, false),
        };
        if !path.exists() {
            if explicit {
                anyhow::bail!("config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Default configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("dev", "changegate", "changegate")
            .context("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.yaml"))
    }

    /// HTTP client settings derived from the gate endpoints.
    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig {
            tool_id: self.gate.tool_id.clone(),
            tool_type: self.authority.tool_type.clone(),
            tracking_url: self.gate.tracking_url.clone(),
            change_control_url: self.gate.change_control_url.clone(),
            mapping_url: self.gate.mapping_url.clone(),
            ..Default::default()
        }
        .with_connect_timeout(Duration::from_secs(self.authority.connect_timeout_secs))
        .with_request_timeout(Duration::from_secs(self.authority.request_timeout_secs));

        if let Some(username) = &self.authority.username {
            client = client.with_credentials(
                username.clone(),
                self.authority.password.clone().unwrap_or_default(),
            );
        }
        client
    }

    /// Log filter implied by the gate's debug flag.
    pub fn log_level(&self) -> &'static str {
        if self.gate.debug { "debug" } else { "info" }
    }
}
