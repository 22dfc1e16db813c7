pub mod bridge;
pub mod veth;

use std::sync::Arc;
use tracing::info;

use crate::config::{NetConf, PluginConfig};
use crate::error::BridgeError;
use crate::link::LinkDirectory;
use crate::netns::{NetNamespace, NsWorker};
use crate::types::{CmdArgs, Interface, Result as CniResult};

pub use bridge::{Bridge, BridgeEnsurer};
pub use veth::VethAttacher;

/// Bridge plugin implementation
pub struct BridgePlugin<D> {
    /// Host-side settings
    config: PluginConfig,
    /// Device table the plugin works on
    links: Arc<D>,
    /// Pinned thread for namespace-scoped work
    worker: NsWorker,
}

impl<D: LinkDirectory> BridgePlugin<D> {
    /// Create a new bridge plugin
    pub fn new(config: PluginConfig, links: Arc<D>, worker: NsWorker) -> Self {
        Self {
            config,
            links,
            worker,
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Attach the container namespace named by `args` to the bridge
    pub async fn add_network<N: NetNamespace>(
        &self,
        args: &CmdArgs,
    ) -> Result<CniResult, BridgeError> {
        let conf = NetConf::parse(&args.stdin_data)?;
        info!(
            "ADD container {} ifname {} netns {} network {}",
            args.container_id, args.ifname, args.netns, conf.name
        );

        let bridge = BridgeEnsurer::new(Arc::clone(&self.links))
            .ensure_bridge(&self.config.bridge_name)?;

        let netns = N::open(&args.netns).map_err(BridgeError::namespace(&args.netns))?;

        let host = VethAttacher::new(Arc::clone(&self.links), self.config.mtu)
            .attach(&self.worker, &bridge, netns, &args.ifname)
            .await?;

        let mut result = CniResult::new(&conf.cni_version);
        result.add_interface(Interface {
            name: bridge.name().to_string(),
            mac: None,
            sandbox: None,
        });
        result.add_interface(Interface {
            name: host.name,
            mac: None,
            sandbox: None,
        });
        result.add_interface(Interface {
            name: args.ifname.clone(),
            mac: None,
            sandbox: Some(args.netns.clone()),
        });

        Ok(result)
    }

    /// Detach is a no-op and always succeeds. No device is ever removed by
    /// this plugin; the pair goes away when the container namespace does.
    pub fn del_network(&self, args: &CmdArgs) -> Result<(), BridgeError> {
        info!(
            "DEL container {} ifname {}: nothing to do",
            args.container_id, args.ifname
        );
        Ok(())
    }
}
