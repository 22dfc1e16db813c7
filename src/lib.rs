//! Bridge CNI plugin
//!
//! Attaches a container network namespace to a shared Linux bridge:
//! - Ensures the bridge exists, really is a bridge, and is up
//! - Creates a veth pair inside the container namespace
//! - Brings the host end back and enslaves it to the bridge
//!
//! DEL is accepted and does nothing.

pub mod commands;
pub mod config;
pub mod error;
pub mod link;
pub mod logger;
pub mod netns;
pub mod plugin;
pub mod types;

// Re-export commonly used items
pub use commands::{cmd_add, cmd_del, cmd_version, run_cni};
pub use config::{NetConf, PluginConfig};
pub use error::BridgeError;
pub use plugin::BridgePlugin;
