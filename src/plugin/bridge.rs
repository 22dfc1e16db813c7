use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{BridgeError, LinkError, Step};
use crate::link::{Link, LinkDirectory, LinkKind};

/// A device verified to be a bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bridge {
    link: Link,
}

impl Bridge {
    pub fn name(&self) -> &str {
        &self.link.name
    }

    pub fn link(&self) -> &Link {
        &self.link
    }
}

/// Makes sure the shared bridge exists and is up.
///
/// Safe to run from any number of concurrent invocations: a bridge created
/// by someone else in the meantime is simply adopted.
pub struct BridgeEnsurer<D> {
    links: Arc<D>,
}

impl<D: LinkDirectory> BridgeEnsurer<D> {
    pub fn new(links: Arc<D>) -> Self {
        Self { links }
    }

    pub fn ensure_bridge(&self, name: &str) -> Result<Bridge, BridgeError> {
        match self.links.add_bridge(name) {
            Ok(()) => info!("Created bridge {}", name),
            Err(LinkError::Exists(_)) => debug!("Bridge {} already exists", name),
            Err(e) => return Err(BridgeError::kernel(Step::CreateBridge)(e)),
        }

        // The device may have vanished since it was created.
        let mut link = self
            .links
            .link_by_name(name)
            .map_err(BridgeError::kernel(Step::LookupBridge))?;

        if link.kind != LinkKind::Bridge {
            return Err(BridgeError::TypeConflict(name.to_string()));
        }

        self.links
            .set_up(name)
            .map_err(BridgeError::kernel(Step::EnableBridge))?;
        link.up = true;

        Ok(Bridge { link })
    }
}
