use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Name of the bridge shared by every container on the host
pub const DEFAULT_BRIDGE_NAME: &str = "eni-br0";
/// MTU of both veth ends
pub const DEFAULT_MTU: u32 = 1500;
/// Where diagnostics are written unless `ECS_CNI_LOG_FILE` says otherwise
pub const DEFAULT_LOG_FILE: &str = "/var/log/ecs/ecs-cni-bridge-plugin.log";
/// Environment variable overriding the log file location
pub const LOG_FILE_ENV: &str = "ECS_CNI_LOG_FILE";

/// CNI versions this plugin accepts
pub const SUPPORTED_VERSIONS: &[&str] = &["0.3.0"];
/// Version assumed when a configuration does not declare one
pub const IMPLICIT_VERSION: &str = "0.1.0";

/// Host-side settings of the plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    /// Bridge device every host veth is enslaved to
    pub bridge_name: String,
    /// MTU for the veth pair
    pub mtu: u32,
    /// Path of the diagnostic log
    pub log_file: PathBuf,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            bridge_name: DEFAULT_BRIDGE_NAME.to_string(),
            mtu: DEFAULT_MTU,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl PluginConfig {
    /// Defaults, with the log file relocated by `ECS_CNI_LOG_FILE` when set
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`PluginConfig::from_env`], reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = lookup(LOG_FILE_ENV).filter(|path| !path.is_empty()) {
            config.log_file = PathBuf::from(path);
        }
        config
    }
}

/// Network configuration handed to the plugin on stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConf {
    /// CNI specification version
    #[serde(rename = "cniVersion", default)]
    pub cni_version: String,
    /// Name of the network
    #[serde(default)]
    pub name: String,
    /// Type of CNI plugin
    #[serde(rename = "type", default)]
    pub plugin_type: String,
}

impl NetConf {
    /// Parse NetConf from bytes
    pub fn parse(bytes: &[u8]) -> Result<Self, ConfigError> {
        let mut conf: NetConf = serde_json::from_slice(bytes)?;

        if conf.cni_version.is_empty() {
            conf.cni_version = IMPLICIT_VERSION.to_string();
        }

        if !SUPPORTED_VERSIONS.contains(&conf.cni_version.as_str()) {
            return Err(ConfigError::IncompatibleVersion {
                version: conf.cni_version,
                supported: SUPPORTED_VERSIONS,
            });
        }

        Ok(conf)
    }

    /// Create a configuration for the bridge network
    pub fn new_default(name: &str) -> Self {
        Self {
            cni_version: SUPPORTED_VERSIONS[0].to_string(),
            name: name.to_string(),
            plugin_type: "bridge".to_string(),
        }
    }
}
