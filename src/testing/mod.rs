//! Test doubles for exercising the orchestration without touching the
//! host's mount tables, export tables, or name service.

use crate::config::types::{AccessMode, OverlayError, Result};
use crate::exec::command::ClusterCommands;
use crate::kernel::namespace::JobNamespace;
use crate::role::HostResolver;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A namespace token for tests that drive the mount executor directly.
/// Real callers obtain one through [`JobNamespace::enter`].
pub fn namespace_token() -> JobNamespace {
    JobNamespace { _sealed: () }
}

/// Everything a [`RecordingCommands`] was asked to do, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandCall {
    Mount {
        head: Ipv4Addr,
        directory: PathBuf,
        mode: AccessMode,
    },
    Unmount(PathBuf),
    MakePrivate(PathBuf),
    MountPointProbe(PathBuf),
    ReloadExports,
    ExpandNodeList(String),
}

/// Recording stand-in for the external command capability.
#[derive(Default)]
pub struct RecordingCommands {
    calls: Mutex<Vec<CommandCall>>,
    mount_points: Vec<PathBuf>,
    failing_mounts: Vec<PathBuf>,
    fail_reload: bool,
    expanded_nodes: Vec<String>,
}

impl RecordingCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths the mountpoint probe should report as active mount points.
    pub fn with_mount_points(mut self, paths: &[PathBuf]) -> Self {
        self.mount_points = paths.to_vec();
        self
    }

    /// Make mounting of the given directory fail.
    pub fn failing_mount_of(mut self, path: &Path) -> Self {
        self.failing_mounts.push(path.to_path_buf());
        self
    }

    /// Make every export-table reload fail.
    pub fn failing_reload(mut self) -> Self {
        self.fail_reload = true;
        self
    }

    /// Node names returned by node-list expansion.
    pub fn with_expanded_nodes(mut self, nodes: &[&str]) -> Self {
        self.expanded_nodes = nodes.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<CommandCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: CommandCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ClusterCommands for RecordingCommands {
    fn mount_from_head(&self, head: Ipv4Addr, directory: &Path, mode: AccessMode) -> Result<()> {
        self.record(CommandCall::Mount {
            head,
            directory: directory.to_path_buf(),
            mode,
        });
        if self.failing_mounts.iter().any(|p| p == directory) {
            return Err(OverlayError::Mount(format!(
                "injected mount failure for {}",
                directory.display()
            )));
        }
        Ok(())
    }

    fn unmount(&self, directory: &Path) -> Result<()> {
        self.record(CommandCall::Unmount(directory.to_path_buf()));
        Ok(())
    }

    fn make_private(&self, directory: &Path) -> Result<()> {
        self.record(CommandCall::MakePrivate(directory.to_path_buf()));
        Ok(())
    }

    fn is_mount_point(&self, directory: &Path) -> Result<bool> {
        self.record(CommandCall::MountPointProbe(directory.to_path_buf()));
        Ok(self.mount_points.iter().any(|p| p == directory))
    }

    fn reload_exports(&self) -> Result<()> {
        self.record(CommandCall::ReloadExports);
        if self.fail_reload {
            return Err(OverlayError::Command(
                "injected export reload failure".to_string(),
            ));
        }
        Ok(())
    }

    fn expand_node_list(&self, compact: &str) -> Result<Vec<String>> {
        self.record(CommandCall::ExpandNodeList(compact.to_string()));
        Ok(self.expanded_nodes.clone())
    }
}

/// Resolver answering every lookup with a fixed address list.
pub struct StaticResolver {
    addrs: Option<Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn with_addrs(addrs: Vec<IpAddr>) -> Self {
        Self { addrs: Some(addrs) }
    }

    /// Resolver whose lookups always fail.
    pub fn failing() -> Self {
        Self { addrs: None }
    }
}

impl HostResolver for StaticResolver {
    fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        match &self.addrs {
            Some(addrs) => Ok(addrs.clone()),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such host: {}", host),
            )),
        }
    }
}
