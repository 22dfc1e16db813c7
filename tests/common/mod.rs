// File: tests/common/mod.rs
//
// In-memory link directory and namespace handles. Each namespace gets its own
// device table; the namespace a thread is "in" is tracked per thread, the
// same way the kernel does it.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Mutex, OnceLock};

use bridge_cni::error::{LinkError, NsError};
use bridge_cni::link::{Link, LinkDirectory, LinkKind};
use bridge_cni::netns::NetNamespace;

pub const HOST: &str = "host";

/// Fault target matching any device name
pub const ANY: &str = "*";

thread_local! {
    static CURRENT_NS: RefCell<String> = RefCell::new(HOST.to_string());
}

/// Namespace the calling thread is in
pub fn current_ns() -> String {
    CURRENT_NS.with(|ns| ns.borrow().clone())
}

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    AddBridge,
    AddVeth,
    LinkByName,
    SetUp,
    SetMaster,
    SetNetns,
}

#[derive(Default)]
struct World {
    namespaces: HashMap<String, Vec<Link>>,
    faults: HashSet<(Op, String)>,
    mutations: usize,
    next_index: u32,
    squatted_peers: usize,
    peers_tried: Vec<String>,
}

impl World {
    fn check(&self, op: Op, name: &str) -> Result<(), LinkError> {
        let hit = |target: &str| self.faults.contains(&(op, target.to_string()));
        if hit(name) || hit(ANY) {
            return Err(LinkError::Command {
                args: format!("{op:?} {name}"),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn table(&mut self, ns: &str) -> &mut Vec<Link> {
        self.namespaces.entry(ns.to_string()).or_default()
    }

    fn find(&mut self, ns: &str, name: &str) -> Result<&mut Link, LinkError> {
        self.table(ns)
            .iter_mut()
            .find(|link| link.name == name)
            .ok_or_else(|| LinkError::NotFound(name.to_string()))
    }

    fn insert(&mut self, ns: &str, name: &str, kind: LinkKind, mtu: u32) -> Result<(), LinkError> {
        if self.table(ns).iter().any(|link| link.name == name) {
            return Err(LinkError::Exists(name.to_string()));
        }
        self.next_index += 1;
        let index = self.next_index;
        self.table(ns).push(Link {
            index,
            name: name.to_string(),
            kind,
            mtu,
            up: false,
            master: None,
        });
        Ok(())
    }
}

/// Fake device table shared by every namespace
#[derive(Default)]
pub struct FakeLinks {
    world: Mutex<World>,
}

impl FakeLinks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` on device `name` fail. [`ANY`] matches every device.
    pub fn fail(&self, op: Op, name: &str) {
        self.world.lock().unwrap().faults.insert((op, name.to_string()));
    }

    /// Place a device directly, bypassing the fault table
    pub fn insert(&self, ns: &str, name: &str, kind: LinkKind, up: bool) {
        let mut world = self.world.lock().unwrap();
        world.insert(ns, name, kind, 1500).unwrap();
        world.find(ns, name).unwrap().up = up;
    }

    pub fn devices(&self, ns: &str) -> Vec<Link> {
        self.world.lock().unwrap().table(ns).clone()
    }

    pub fn device(&self, ns: &str, name: &str) -> Option<Link> {
        self.devices(ns).into_iter().find(|link| link.name == name)
    }

    /// Have the next `count` veth peer names already be taken in the
    /// namespace the pair is created in
    pub fn squat_peer_names(&self, count: usize) {
        self.world.lock().unwrap().squatted_peers = count;
    }

    /// Every peer name `add_veth` was asked for, in order
    pub fn peers_tried(&self) -> Vec<String> {
        self.world.lock().unwrap().peers_tried.clone()
    }

    /// Successful state changes so far
    pub fn mutations(&self) -> usize {
        self.world.lock().unwrap().mutations
    }
}

impl LinkDirectory for FakeLinks {
    fn add_bridge(&self, name: &str) -> Result<(), LinkError> {
        let mut world = self.world.lock().unwrap();
        world.check(Op::AddBridge, name)?;
        world.insert(&current_ns(), name, LinkKind::Bridge, 1500)?;
        world.mutations += 1;
        Ok(())
    }

    fn add_veth(&self, name: &str, peer: &str, mtu: u32) -> Result<(), LinkError> {
        let mut world = self.world.lock().unwrap();
        world.check(Op::AddVeth, name)?;
        let ns = current_ns();
        world.peers_tried.push(peer.to_string());
        if world.squatted_peers > 0 {
            world.squatted_peers -= 1;
            world.insert(&ns, peer, LinkKind::Device, 1500)?;
        }
        if world.find(&ns, peer).is_ok() {
            return Err(LinkError::Exists(peer.to_string()));
        }
        world.insert(&ns, name, LinkKind::Veth, mtu)?;
        world.insert(&ns, peer, LinkKind::Veth, mtu)?;
        world.mutations += 1;
        Ok(())
    }

    fn link_by_name(&self, name: &str) -> Result<Link, LinkError> {
        let mut world = self.world.lock().unwrap();
        world.check(Op::LinkByName, name)?;
        world.find(&current_ns(), name).map(|link| link.clone())
    }

    fn set_up(&self, name: &str) -> Result<(), LinkError> {
        let mut world = self.world.lock().unwrap();
        world.check(Op::SetUp, name)?;
        world.find(&current_ns(), name)?.up = true;
        world.mutations += 1;
        Ok(())
    }

    fn set_master(&self, name: &str, master: &str) -> Result<(), LinkError> {
        let mut world = self.world.lock().unwrap();
        world.check(Op::SetMaster, name)?;
        let ns = current_ns();
        world.find(&ns, master)?;
        world.find(&ns, name)?.master = Some(master.to_string());
        world.mutations += 1;
        Ok(())
    }

    fn set_netns(&self, name: &str, netns: &str) -> Result<(), LinkError> {
        let mut world = self.world.lock().unwrap();
        world.check(Op::SetNetns, name)?;
        let from = current_ns();
        let to = if netns.starts_with("/proc/") {
            HOST.to_string()
        } else {
            netns.to_string()
        };

        let link = world.find(&from, name)?.clone();
        if world.table(&to).iter().any(|other| other.name == name) {
            return Err(LinkError::Exists(name.to_string()));
        }
        world.table(&from).retain(|other| other.name != name);
        world.table(&to).push(link);
        world.mutations += 1;
        Ok(())
    }
}

fn handles() -> &'static Mutex<HashMap<String, usize>> {
    static HANDLES: OnceLock<Mutex<HashMap<String, usize>>> = OnceLock::new();
    HANDLES.get_or_init(Default::default)
}

/// Handles currently open on `path`
pub fn open_handles(path: &str) -> usize {
    handles().lock().unwrap().get(path).copied().unwrap_or(0)
}

/// Namespace locator for a fake namespace called `name`
pub fn netns_path(name: &str) -> String {
    format!("/var/run/netns/{name}")
}

/// Locator that opens but refuses to be entered
pub const DENIED_NS: &str = "/var/run/netns/denied";

/// Fake namespace handle. Only `/var/run/netns/*` paths exist.
#[derive(Debug)]
pub struct FakeNs {
    path: String,
}

impl NetNamespace for FakeNs {
    fn open(path: &str) -> Result<Self, NsError> {
        if !path.starts_with("/var/run/netns/") {
            return Err(NsError::Open {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such namespace"),
            });
        }
        *handles().lock().unwrap().entry(path.to_string()).or_default() += 1;
        Ok(Self {
            path: path.to_string(),
        })
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn run<T>(&self, f: impl FnOnce() -> T) -> Result<T, NsError> {
        if self.path == DENIED_NS {
            return Err(NsError::Enter(nix::Error::EPERM));
        }

        let previous = CURRENT_NS.with(|ns| ns.replace(self.path.clone()));
        let _restore = Restore(previous);
        Ok(f())
    }
}

impl Drop for FakeNs {
    fn drop(&mut self) {
        if let Some(count) = handles().lock().unwrap().get_mut(&self.path) {
            *count -= 1;
        }
    }
}

struct Restore(String);

impl Drop for Restore {
    fn drop(&mut self) {
        let previous = std::mem::take(&mut self.0);
        CURRENT_NS.with(|ns| *ns.borrow_mut() = previous);
    }
}

pub fn conf_bytes() -> Vec<u8> {
    br#"{"cniVersion":"0.3.0","name":"ecs-bridge","type":"bridge"}"#.to_vec()
}
