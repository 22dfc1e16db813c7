use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::io::{self, Read};
use std::sync::Arc;
use tokio::runtime::Builder;

use crate::config::PluginConfig;
use crate::error::ConfigError;
use crate::link::{IpLinkDirectory, LinkDirectory};
use crate::netns::{NetNs, NsWorker};
use crate::plugin::BridgePlugin;
use crate::types::{CmdArgs, PluginInfo};

/// Build command arguments from an environment lookup.
///
/// With `strict` unset, missing variables become empty strings; DEL is
/// answered whatever the runtime passes.
pub fn args_from<F>(lookup: F, strict: bool, stdin_data: Vec<u8>) -> Result<CmdArgs, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |name: &'static str| match lookup(name) {
        Some(value) if !value.is_empty() => Ok(value),
        _ if strict => Err(ConfigError::MissingEnv(name)),
        _ => Ok(String::new()),
    };

    Ok(CmdArgs {
        container_id: required("CNI_CONTAINERID")?,
        netns: required("CNI_NETNS")?,
        ifname: required("CNI_IFNAME")?,
        args: parse_cni_args(&lookup("CNI_ARGS").unwrap_or_default()),
        path: required("CNI_PATH")?,
        stdin_data,
    })
}

/// Parse command arguments from environment
pub fn parse_args() -> Result<CmdArgs> {
    // Read stdin data
    let mut stdin_data = Vec::new();
    io::stdin()
        .read_to_end(&mut stdin_data)
        .context("Failed to read from stdin")?;

    let args = args_from(|name| env::var(name).ok(), true, stdin_data)?;
    Ok(args)
}

/// Parse CNI_ARGS string into key-value pairs
fn parse_cni_args(args_str: &str) -> HashMap<String, String> {
    let mut args = HashMap::new();

    if !args_str.is_empty() {
        for pair in args_str.split(';') {
            if let Some(idx) = pair.find('=') {
                let key = pair[..idx].to_string();
                let value = pair[idx + 1..].to_string();
                args.insert(key, value);
            }
        }
    }

    args
}

/// Execute the add command
pub fn cmd_add<D: LinkDirectory>(plugin: &BridgePlugin<D>) -> Result<()> {
    let args = parse_args()?;

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    let result = runtime.block_on(plugin.add_network::<NetNs>(&args))?;

    // Output result as JSON
    result.print()?;

    Ok(())
}

/// Execute the delete command
pub fn cmd_del<D: LinkDirectory>(plugin: &BridgePlugin<D>) -> Result<()> {
    let args = args_from(|name| env::var(name).ok(), false, Vec::new())?;
    plugin.del_network(&args)?;
    Ok(())
}

/// Print the CNI versions this plugin speaks
pub fn cmd_version() -> Result<()> {
    println!("{}", serde_json::to_string(&PluginInfo::default())?);
    Ok(())
}

/// Main entry point for the CNI plugin
pub fn run_cni(config: PluginConfig, worker: NsWorker) -> Result<()> {
    // Get command from environment
    let cmd = env::var("CNI_COMMAND").map_err(|_| ConfigError::MissingEnv("CNI_COMMAND"))?;

    let plugin = BridgePlugin::new(config, Arc::new(IpLinkDirectory::new()), worker);

    // Execute the appropriate command
    match cmd.as_str() {
        "ADD" => cmd_add(&plugin),
        "DEL" => cmd_del(&plugin),
        "VERSION" => cmd_version(),
        _ => anyhow::bail!("Unknown CNI command: {}", cmd),
    }
}
