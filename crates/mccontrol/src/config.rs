use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RootError, RootResult};
use mccontrol_vault::SessionPolicy;

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body. The default fits a maximum-size file
    /// sent as base64 inside its JSON envelope.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    25575
}

fn default_max_body_bytes() -> usize {
    let file = mccontrol_files::MAX_FILE_SIZE as usize;
    file.div_ceil(3) * 4 + 1024 * 1024
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Session eviction policy. Both unset means sessions live until exit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sessions: Option<usize>,
}

impl SessionConfig {
    pub fn policy(&self) -> SessionPolicy {
        SessionPolicy {
            ttl: self.ttl_secs.map(Duration::from_secs),
            max_sessions: self.max_sessions,
        }
    }
}

/// Host collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostConfig {
    /// Delay between a restart request and the shutdown command.
    #[serde(default = "default_restart_delay")]
    pub restart_delay_ms: u64,

    #[serde(default = "default_queue_capacity")]
    pub command_queue_capacity: usize,

    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,

    #[serde(default = "default_metrics_capacity")]
    pub metrics_capacity: usize,

    #[serde(default = "default_log_flush_interval")]
    pub log_flush_interval_secs: u64,
}

fn default_restart_delay() -> u64 {
    1000
}

fn default_queue_capacity() -> usize {
    mccontrol_host::DEFAULT_QUEUE_CAPACITY
}

fn default_metrics_interval() -> u64 {
    1
}

fn default_metrics_capacity() -> usize {
    600
}

fn default_log_flush_interval() -> u64 {
    30
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: default_restart_delay(),
            command_queue_capacity: default_queue_capacity(),
            metrics_interval_secs: default_metrics_interval(),
            metrics_capacity: default_metrics_capacity(),
            log_flush_interval_secs: default_log_flush_interval(),
        }
    }
}

/// Top-level configuration, loaded from `plugins/MCControl/config.toml` by
/// default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Credentials, change log, combined log and host state live here.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Sandbox root for file operations. Unset means the working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_root: Option<PathBuf>,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub sessions: SessionConfig,

    #[serde(default)]
    pub host: HostConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("plugins/MCControl")
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            server_root: None,
            http: HttpConfig::default(),
            sessions: SessionConfig::default(),
            host: HostConfig::default(),
        }
    }
}

impl ControlConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: ControlConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> RootResult<()> {
        if self.http.port == 0 {
            return Err(RootError::Config("http.port must be > 0".into()));
        }
        if self.http.bind.parse::<IpAddr>().is_err() {
            return Err(RootError::Config(format!(
                "http.bind must be an IP address, got '{}'",
                self.http.bind
            )));
        }
        if self.http.max_body_bytes == 0 {
            return Err(RootError::Config("http.max_body_bytes must be > 0".into()));
        }
        if self.sessions.ttl_secs == Some(0) {
            return Err(RootError::Config("sessions.ttl_secs must be > 0".into()));
        }
        if self.sessions.max_sessions == Some(0) {
            return Err(RootError::Config("sessions.max_sessions must be > 0".into()));
        }
        let host = &self.host;
        let zero = [
            ("host.command_queue_capacity", host.command_queue_capacity == 0),
            ("host.metrics_interval_secs", host.metrics_interval_secs == 0),
            ("host.metrics_capacity", host.metrics_capacity == 0),
            ("host.log_flush_interval_secs", host.log_flush_interval_secs == 0),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(RootError::Config(format!("{} must be > 0", name)));
        }
        Ok(())
    }

    /// Sandbox root: the configured one, or the process working directory.
    pub fn resolved_server_root(&self) -> RootResult<PathBuf> {
        match &self.server_root {
            Some(root) => Ok(root.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    pub fn default_config_path() -> PathBuf {
        default_data_dir().join("config.toml")
    }
}
