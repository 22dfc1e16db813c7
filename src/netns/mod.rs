//! Network namespace handles and the thread that is allowed to switch them.
//!
//! Namespace membership is a property of the calling thread. All switching
//! happens on one dedicated OS thread owned by [`NsWorker`]; nothing else is
//! ever scheduled onto it.

use nix::sched::{setns, CloneFlags};
use std::fs::File;
use std::io;
use std::os::unix::io::AsRawFd;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::error::NsError;

/// Namespace of the calling thread, as opposed to `/proc/self` which names
/// the thread group leader
const THREAD_NETNS: &str = "/proc/thread-self/ns/net";

/// Locator of the host namespace.
///
/// The pinned worker never switches the process leader thread, so the
/// leader's namespace is the host namespace for the whole invocation.
pub fn host_netns_path() -> String {
    format!("/proc/{}/ns/net", std::process::id())
}

/// An open handle to a network namespace. Dropping it releases the handle.
pub trait NetNamespace: Send + Sized + 'static {
    /// Open the namespace at `path`
    fn open(path: &str) -> Result<Self, NsError>;

    /// Path the handle was opened from
    fn path(&self) -> &str;

    /// Run `f` with the calling thread switched into this namespace. The
    /// original namespace is restored before returning, whatever `f` does.
    fn run<T>(&self, f: impl FnOnce() -> T) -> Result<T, NsError>;
}

/// Handle to a namespace file such as `/var/run/netns/<name>` or
/// `/proc/<pid>/ns/net`
#[derive(Debug)]
pub struct NetNs {
    path: String,
    file: File,
}

impl NetNamespace for NetNs {
    fn open(path: &str) -> Result<Self, NsError> {
        let file = File::open(path).map_err(|source| NsError::Open {
            path: path.to_string(),
            source,
        })?;
        Ok(Self {
            path: path.to_string(),
            file,
        })
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn run<T>(&self, f: impl FnOnce() -> T) -> Result<T, NsError> {
        let guard = NsGuard::enter(&self.file)?;
        trace!("Entered network namespace {}", self.path);

        let result = f();

        drop(guard);
        trace!("Left network namespace {}", self.path);
        Ok(result)
    }
}

/// Restores the thread's original namespace when dropped
struct NsGuard {
    original: File,
}

impl NsGuard {
    fn enter(target: &File) -> Result<Self, NsError> {
        let original = File::open(THREAD_NETNS).map_err(|source| NsError::Open {
            path: THREAD_NETNS.to_string(),
            source,
        })?;

        setns(target.as_raw_fd(), CloneFlags::CLONE_NEWNET).map_err(NsError::Enter)?;

        Ok(Self { original })
    }
}

impl Drop for NsGuard {
    fn drop(&mut self) {
        if let Err(e) = setns(self.original.as_raw_fd(), CloneFlags::CLONE_NEWNET) {
            // A thread left in the wrong namespace must not run anything else.
            // Unwinding ends the worker thread.
            if !thread::panicking() {
                panic!("failed to restore network namespace: {e}");
            }
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// The OS thread that performs namespace-scoped work.
///
/// Spawned once at process start and kept for the life of the process. Jobs
/// are handed over through a single-slot channel and run one at a time.
#[derive(Debug)]
pub struct NsWorker {
    jobs: mpsc::Sender<Job>,
}

impl NsWorker {
    pub fn spawn() -> io::Result<Self> {
        let (jobs, mut queue) = mpsc::channel::<Job>(1);

        thread::Builder::new()
            .name("netns-worker".to_string())
            .spawn(move || {
                while let Some(job) = queue.blocking_recv() {
                    job();
                }
                debug!("Namespace worker stopped");
            })?;

        Ok(Self { jobs })
    }

    /// Run `f` on the worker thread and wait for its result
    pub async fn run<T, F>(&self, f: F) -> Result<T, NsError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let job: Job = Box::new(move || {
            let _ = reply.send(f());
        });

        self.jobs.send(job).await.map_err(|_| NsError::WorkerGone)?;
        result.await.map_err(|_| NsError::WorkerGone)
    }
}
