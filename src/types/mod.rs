use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::SUPPORTED_VERSIONS;
use crate::error::{BridgeError, ConfigError, CODE_PLUGIN_FAILURE};

/// CNI command arguments
#[derive(Debug, Clone)]
pub struct CmdArgs {
    /// Container ID
    pub container_id: String,
    /// Network namespace path
    pub netns: String,
    /// Interface name
    pub ifname: String,
    /// Arguments
    pub args: HashMap<String, String>,
    /// Path
    pub path: String,
    /// Standard input data
    pub stdin_data: Vec<u8>,
}

/// Result of a successful ADD (CNI 0.3.0)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Result {
    /// CNI specification version
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    /// Interfaces created or used
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<Interface>,
}

/// Interface information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    /// Interface name
    pub name: String,
    /// MAC address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    /// Sandbox path (network namespace)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

impl Result {
    /// Create a new empty result
    pub fn new(cni_version: &str) -> Self {
        Self {
            cni_version: cni_version.to_string(),
            interfaces: Vec::new(),
        }
    }

    /// Add an interface to the result
    pub fn add_interface(&mut self, interface: Interface) {
        self.interfaces.push(interface);
    }

    /// Print result as JSON
    pub fn print(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        println!("{}", json);
        Ok(())
    }
}

/// Error payload written for the runtime when a command fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    pub code: u32,
    pub msg: String,
    #[serde(default)]
    pub details: String,
}

impl Error {
    /// Build the payload from an error chain. The code comes from the first
    /// plugin error found in the chain.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let code = err
            .chain()
            .find_map(|cause| {
                cause
                    .downcast_ref::<BridgeError>()
                    .map(BridgeError::code)
                    .or_else(|| cause.downcast_ref::<ConfigError>().map(ConfigError::code))
            })
            .unwrap_or(CODE_PLUGIN_FAILURE);

        Self {
            cni_version: SUPPORTED_VERSIONS[0].to_string(),
            code,
            msg: err.to_string(),
            details: format!("{:#}", err),
        }
    }
}

/// Reply to `CNI_COMMAND=VERSION`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    #[serde(rename = "supportedVersions")]
    pub supported_versions: Vec<String>,
}

impl Default for PluginInfo {
    fn default() -> Self {
        Self {
            cni_version: SUPPORTED_VERSIONS[0].to_string(),
            supported_versions: SUPPORTED_VERSIONS.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// Build information printed by `--version`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    #[serde(rename = "gitShortHash")]
    pub git_short_hash: String,
    pub dirty: bool,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_short_hash: option_env!("BRIDGE_CNI_GIT_HASH")
                .unwrap_or("unknown")
                .to_string(),
            dirty: option_env!("BRIDGE_CNI_GIT_DIRTY").is_some_and(|d| d == "true"),
        }
    }
}
