use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::bridge::Bridge;
use crate::error::{BridgeError, LinkError, Step};
use crate::link::{Link, LinkDirectory};
use crate::netns::{host_netns_path, NetNamespace, NsWorker};

/// How many random host-side names to try before giving up
const MAX_NAME_ATTEMPTS: usize = 10;

/// Connects a container namespace to the bridge with a veth pair.
pub struct VethAttacher<D> {
    links: Arc<D>,
    mtu: u32,
}

impl<D: LinkDirectory> VethAttacher<D> {
    pub fn new(links: Arc<D>, mtu: u32) -> Self {
        Self { links, mtu }
    }

    /// Create the pair inside `netns` with the container end named `ifname`,
    /// bring the host end back to the host namespace and enslave it to
    /// `bridge`. Returns the host end.
    ///
    /// The namespace handle is released on the worker once the pair is set
    /// up or the first step fails. Devices created before a failure are left
    /// behind.
    pub async fn attach<N: NetNamespace>(
        &self,
        worker: &NsWorker,
        bridge: &Bridge,
        netns: N,
        ifname: &str,
    ) -> Result<Link, BridgeError> {
        let path = netns.path().to_string();
        let links = Arc::clone(&self.links);
        let container_ifname = ifname.to_string();
        let mtu = self.mtu;
        let host_ns = host_netns_path();

        let host_name = worker
            .run(move || {
                netns.run(|| setup_veth(links.as_ref(), &container_ifname, mtu, &host_ns))
            })
            .await
            .and_then(|entered| entered)
            .map_err(BridgeError::namespace(&path))??;

        debug!("Host end of {} in {} is {}", ifname, path, host_name);

        let mut host = self
            .links
            .link_by_name(&host_name)
            .map_err(BridgeError::kernel(Step::LookupHostVeth))?;

        self.links
            .set_up(&host.name)
            .map_err(BridgeError::kernel(Step::EnableHostVeth))?;
        host.up = true;

        self.links
            .set_master(&host.name, bridge.name())
            .map_err(BridgeError::kernel(Step::SetMaster))?;
        host.master = Some(bridge.name().to_string());

        info!(
            "Attached {} to bridge {} for {} in {}",
            host.name,
            bridge.name(),
            ifname,
            path
        );
        Ok(host)
    }
}

/// Runs inside the target namespace. Returns the host end's name.
fn setup_veth<D: LinkDirectory>(
    links: &D,
    ifname: &str,
    mtu: u32,
    host_ns: &str,
) -> Result<String, BridgeError> {
    let peer = create_pair(links, ifname, mtu)?;

    links
        .set_up(ifname)
        .map_err(BridgeError::kernel(Step::EnableContainerVeth))?;

    links
        .set_netns(&peer, host_ns)
        .map_err(BridgeError::kernel(Step::MoveHostVeth))?;

    Ok(peer)
}

fn create_pair<D: LinkDirectory>(links: &D, ifname: &str, mtu: u32) -> Result<String, BridgeError> {
    let mut tried = String::new();

    for _ in 0..MAX_NAME_ATTEMPTS {
        let peer = random_veth_name();
        match links.add_veth(ifname, &peer, mtu) {
            Ok(()) => return Ok(peer),
            Err(LinkError::Exists(_)) if links.link_by_name(&peer).is_ok() => {
                debug!("Veth name {} is taken, picking another", peer);
                tried = peer;
            }
            Err(LinkError::Exists(_)) => {
                return Err(BridgeError::kernel(Step::CreateVeth)(LinkError::NameTaken(
                    ifname.to_string(),
                )))
            }
            Err(e) => return Err(BridgeError::kernel(Step::CreateVeth)(e)),
        }
    }

    Err(BridgeError::kernel(Step::CreateVeth)(LinkError::Exists(tried)))
}

/// `veth` followed by 8 random hex digits
pub fn random_veth_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("veth{}", &id[..8])
}
