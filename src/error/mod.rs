use std::fmt;
use std::io;
use thiserror::Error;

/// CNI error code for incompatible configuration versions
pub const CODE_INCOMPATIBLE_VERSION: u32 = 1;
/// CNI error code for missing or invalid environment variables
pub const CODE_INVALID_ENVIRONMENT: u32 = 4;
/// CNI error code for undecodable network configuration
pub const CODE_DECODING_FAILURE: u32 = 6;
/// CNI error code for failures specific to this plugin
pub const CODE_PLUGIN_FAILURE: u32 = 100;

/// Errors surfaced by the bridge plugin
///
/// The first failure aborts the invocation. Nothing is retried and devices
/// already created are left in place.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Input could not be decoded or is not acceptable
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A device holding the bridge name is not a bridge
    #[error("{0} is not a bridge device")]
    TypeConflict(String),

    /// A link operation failed
    #[error("{step}: {source}")]
    KernelOp {
        step: Step,
        #[source]
        source: LinkError,
    },

    /// The target namespace could not be entered
    #[error("failed to switch to network namespace {path}: {source}")]
    NamespaceSwitch {
        path: String,
        #[source]
        source: NsError,
    },
}

impl BridgeError {
    pub(crate) fn kernel(step: Step) -> impl FnOnce(LinkError) -> Self {
        move |source| BridgeError::KernelOp { step, source }
    }

    pub(crate) fn namespace(path: &str) -> impl FnOnce(NsError) -> Self + '_ {
        move |source| BridgeError::NamespaceSwitch {
            path: path.to_string(),
            source,
        }
    }

    /// CNI error code reported to the runtime
    pub fn code(&self) -> u32 {
        match self {
            BridgeError::Config(e) => e.code(),
            _ => CODE_PLUGIN_FAILURE,
        }
    }
}

/// Configuration and invocation errors. Raised before any link is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse network configuration: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("incompatible CNI versions: config is {version}, plugin supports {supported:?}")]
    IncompatibleVersion {
        version: String,
        supported: &'static [&'static str],
    },

    #[error("{0} not found in environment")]
    MissingEnv(&'static str),
}

impl ConfigError {
    pub fn code(&self) -> u32 {
        match self {
            ConfigError::Decode(_) => CODE_DECODING_FAILURE,
            ConfigError::IncompatibleVersion { .. } => CODE_INCOMPATIBLE_VERSION,
            ConfigError::MissingEnv(_) => CODE_INVALID_ENVIRONMENT,
        }
    }
}

/// Kernel steps that can fail during ADD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateBridge,
    LookupBridge,
    EnableBridge,
    CreateVeth,
    EnableContainerVeth,
    MoveHostVeth,
    LookupHostVeth,
    EnableHostVeth,
    SetMaster,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let context = match self {
            Step::CreateBridge => "error creating bridge",
            Step::LookupBridge => "error looking up bridge device",
            Step::EnableBridge => "failed to enable bridge device",
            Step::CreateVeth => "failed to create veth pair",
            Step::EnableContainerVeth => "failed to enable container veth",
            Step::MoveHostVeth => "failed to move veth to host namespace",
            Step::LookupHostVeth => "failed to look up host veth",
            Step::EnableHostVeth => "failed to enable host veth",
            Step::SetMaster => "failed to attach veth to bridge",
        };
        f.write_str(context)
    }
}

/// Failures reported by a link directory
#[derive(Debug, Error)]
pub enum LinkError {
    /// A device with this name already exists
    #[error("device {0} already exists")]
    Exists(String),

    #[error("device {0} does not exist")]
    NotFound(String),

    /// The container interface name is already in use inside the namespace
    #[error("container veth name provided ({0}) already exists")]
    NameTaken(String),

    #[error("`ip {args}` failed: {stderr}")]
    Command { args: String, stderr: String },

    #[error("failed to run ip: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decode link details: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Namespace switching failures
#[derive(Debug, Error)]
pub enum NsError {
    #[error("failed to open network namespace {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("setns failed: {0}")]
    Enter(#[source] nix::Error),

    #[error("namespace worker thread is gone")]
    WorkerGone,
}
