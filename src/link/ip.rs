use serde::Deserialize;
use std::process::{Command, Output};
use tracing::debug;

use super::{Link, LinkDirectory, LinkKind};
use crate::error::LinkError;

/// Link directory backed by the iproute2 `ip` tool.
///
/// `ip` is forked from the calling thread, so it inherits that thread's
/// network namespace.
#[derive(Debug, Clone)]
pub struct IpLinkDirectory {
    program: String,
}

impl Default for IpLinkDirectory {
    fn default() -> Self {
        Self {
            program: "ip".to_string(),
        }
    }
}

impl IpLinkDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different `ip` binary
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output, LinkError> {
        debug!("Running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program).args(args).output()?;

        if output.status.success() {
            return Ok(output);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify_failure(args, stderr))
    }
}

/// Map `ip` diagnostics onto the errors callers match on. `subject` is the
/// device the command is about.
fn classify_failure(args: &[&str], stderr: String) -> LinkError {
    let subject = device_argument(args);

    if stderr.contains("File exists") {
        LinkError::Exists(subject)
    } else if stderr.contains("Cannot find device") || stderr.contains("does not exist") {
        LinkError::NotFound(subject)
    } else {
        LinkError::Command {
            args: args.join(" "),
            stderr,
        }
    }
}

fn device_argument(args: &[&str]) -> String {
    args.windows(2)
        .find(|pair| pair[0] == "dev" || pair[0] == "name")
        .or_else(|| args.windows(2).find(|pair| pair[0] == "add"))
        .map(|pair| pair[1].to_string())
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct IpLink {
    ifindex: u32,
    ifname: String,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    mtu: u32,
    master: Option<String>,
    linkinfo: Option<IpLinkInfo>,
}

#[derive(Debug, Deserialize)]
struct IpLinkInfo {
    info_kind: Option<String>,
}

impl From<IpLink> for Link {
    fn from(link: IpLink) -> Self {
        let kind = LinkKind::from_info_kind(
            link.linkinfo
                .as_ref()
                .and_then(|info| info.info_kind.as_deref()),
        );

        Link {
            index: link.ifindex,
            up: link.flags.iter().any(|flag| flag == "UP"),
            name: link.ifname,
            kind,
            mtu: link.mtu,
            master: link.master,
        }
    }
}

/// Decode the output of `ip -d -j link show dev <name>`
fn parse_link(name: &str, stdout: &[u8]) -> Result<Link, LinkError> {
    let links: Vec<IpLink> = serde_json::from_slice(stdout)?;
    links
        .into_iter()
        .next()
        .map(Link::from)
        .ok_or_else(|| LinkError::NotFound(name.to_string()))
}

impl LinkDirectory for IpLinkDirectory {
    fn add_bridge(&self, name: &str) -> Result<(), LinkError> {
        self.run(&["link", "add", "name", name, "type", "bridge"])?;
        Ok(())
    }

    fn add_veth(&self, name: &str, peer: &str, mtu: u32) -> Result<(), LinkError> {
        let mtu = mtu.to_string();
        self.run(&[
            "link", "add", "name", name, "mtu", &mtu, "type", "veth", "peer", "name", peer,
            "mtu", &mtu,
        ])?;
        Ok(())
    }

    fn link_by_name(&self, name: &str) -> Result<Link, LinkError> {
        let output = self.run(&["-d", "-j", "link", "show", "dev", name])?;
        parse_link(name, &output.stdout)
    }

    fn set_up(&self, name: &str) -> Result<(), LinkError> {
        self.run(&["link", "set", "dev", name, "up"])?;
        Ok(())
    }

    fn set_master(&self, name: &str, master: &str) -> Result<(), LinkError> {
        self.run(&["link", "set", "dev", name, "master", master])?;
        Ok(())
    }

    fn set_netns(&self, name: &str, netns: &str) -> Result<(), LinkError> {
        self.run(&["link", "set", "dev", name, "netns", netns])?;
        Ok(())
    }
}
