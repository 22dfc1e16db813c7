//! Access to the kernel's table of network devices.
//!
//! Every operation acts on the network namespace of the calling thread.

pub mod ip;

use crate::error::LinkError;

pub use ip::IpLinkDirectory;

/// Device types the plugin cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Bridge,
    Veth,
    /// A virtual device of another kind
    Other(String),
    /// A device without link info, e.g. a physical NIC or loopback
    Device,
}

impl LinkKind {
    pub fn from_info_kind(kind: Option<&str>) -> Self {
        match kind {
            Some("bridge") => LinkKind::Bridge,
            Some("veth") => LinkKind::Veth,
            Some(other) => LinkKind::Other(other.to_string()),
            None => LinkKind::Device,
        }
    }
}

/// Snapshot of a network device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub index: u32,
    pub name: String,
    pub kind: LinkKind,
    pub mtu: u32,
    /// Administratively up
    pub up: bool,
    /// Name of the device this one is enslaved to
    pub master: Option<String>,
}

/// Query and mutate network devices.
///
/// Implementations must report an already taken name on creation as
/// [`LinkError::Exists`] and an unknown device as [`LinkError::NotFound`].
pub trait LinkDirectory: Send + Sync + 'static {
    /// Create a bridge device
    fn add_bridge(&self, name: &str) -> Result<(), LinkError>;

    /// Create a veth pair with both ends at `mtu`
    fn add_veth(&self, name: &str, peer: &str, mtu: u32) -> Result<(), LinkError>;

    /// Find a device by name
    fn link_by_name(&self, name: &str) -> Result<Link, LinkError>;

    /// Set a device administratively up
    fn set_up(&self, name: &str) -> Result<(), LinkError>;

    /// Enslave a device to `master`
    fn set_master(&self, name: &str, master: &str) -> Result<(), LinkError>;

    /// Move a device into the namespace at `netns`
    fn set_netns(&self, name: &str, netns: &str) -> Result<(), LinkError>;
}
