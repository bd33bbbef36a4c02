//! External command capability.
//!
//! Mount, unmount, mount-propagation changes, export-table reloads, and
//! node-list expansion are host operations with a success/failure
//! contract, not logic this crate owns. They sit behind one trait so
//! the planners and executors can be exercised without real filesystem
//! or network side effects.

use crate::config::overlay::OverlayConfig;
use crate::config::types::{AccessMode, OverlayError, Result};
use log::debug;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait ClusterCommands {
    /// NFS-mount `directory` from the head onto the same local path.
    fn mount_from_head(&self, head: Ipv4Addr, directory: &Path, mode: AccessMode) -> Result<()>;

    /// Unmount a local path. Callers may invoke this on paths that are
    /// not currently mounted; such failures are theirs to ignore.
    fn unmount(&self, directory: &Path) -> Result<()>;

    /// Mark a mount point private so mount events stop propagating.
    fn make_private(&self, directory: &Path) -> Result<()>;

    /// Whether the path is currently an active mount point.
    fn is_mount_point(&self, directory: &Path) -> Result<bool>;

    /// Reload the host's export table from its fragment files.
    fn reload_exports(&self) -> Result<()>;

    /// Expand the scheduler's compact node-list notation into one
    /// name per node.
    fn expand_node_list(&self, compact: &str) -> Result<Vec<String>>;
}

/// Production implementation shelling out to the host's tools.
pub struct SystemCommands {
    mount_bin: PathBuf,
    mountpoint_bin: PathBuf,
    exportfs_bin: PathBuf,
    scontrol_bin: PathBuf,
    nfs_options: String,
}

impl SystemCommands {
    pub fn new(config: &OverlayConfig) -> Self {
        Self {
            mount_bin: config.mount_bin.clone(),
            mountpoint_bin: config.mountpoint_bin.clone(),
            exportfs_bin: config.exportfs_bin.clone(),
            scontrol_bin: config.scontrol_bin.clone(),
            nfs_options: config.nfs_options.clone(),
        }
    }

    fn run_checked(&self, program: &Path, args: &[&str]) -> Result<()> {
        debug!("running {} {}", program.display(), args.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| {
                OverlayError::Command(format!("failed to spawn {}: {}", program.display(), e))
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(OverlayError::Command(format!(
                "{} {} exited with {}",
                program.display(),
                args.join(" "),
                status
            )))
        }
    }
}

impl ClusterCommands for SystemCommands {
    fn mount_from_head(&self, head: Ipv4Addr, directory: &Path, mode: AccessMode) -> Result<()> {
        let options = format!("{},{}", mode.option_flag(), self.nfs_options);
        let source = format!("{}:{}", head, directory.display());
        let target = directory.display().to_string();
        self.run_checked(
            &self.mount_bin,
            &["-t", "nfs", "-o", &options, &source, &target],
        )
        .map_err(|e| OverlayError::Mount(e.to_string()))
    }

    fn unmount(&self, directory: &Path) -> Result<()> {
        nix::mount::umount(directory).map_err(|e| {
            OverlayError::Command(format!("umount {} failed: {}", directory.display(), e))
        })
    }

    fn make_private(&self, directory: &Path) -> Result<()> {
        let target = directory.display().to_string();
        self.run_checked(&self.mount_bin, &["--make-private", &target])
    }

    fn is_mount_point(&self, directory: &Path) -> Result<bool> {
        let target = directory.display().to_string();
        let status = Command::new(&self.mountpoint_bin)
            .args(["-q", &target])
            .status()
            .map_err(|e| {
                OverlayError::Command(format!(
                    "failed to spawn {}: {}",
                    self.mountpoint_bin.display(),
                    e
                ))
            })?;
        Ok(status.success())
    }

    fn reload_exports(&self) -> Result<()> {
        self.run_checked(&self.exportfs_bin, &["-ra"])
    }

    fn expand_node_list(&self, compact: &str) -> Result<Vec<String>> {
        let output = Command::new(&self.scontrol_bin)
            .args(["show", "hostname", compact])
            .output()
            .map_err(|e| {
                OverlayError::Command(format!(
                    "failed to spawn {}: {}",
                    self.scontrol_bin.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(OverlayError::Command(format!(
                "node-list expansion of '{}' exited with {}",
                compact, output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
