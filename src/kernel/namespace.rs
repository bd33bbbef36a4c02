//! Private mount namespace for one job step.
//!
//! All mounts made for a job are confined to a mount namespace scoped
//! to the job's process tree, so concurrent jobs on the same node
//! never observe each other's mount tables and everything unwinds
//! automatically when the last job process exits.

use crate::config::types::{OverlayError, Result};
use crate::exec::command::ClusterCommands;
use log::info;
use std::path::Path;

/// Proof that the calling process entered a private mount namespace.
///
/// Created once per job step and threaded through the mount executor;
/// remote mounts cannot be attempted without one.
pub struct JobNamespace {
    pub(crate) _sealed: (),
}

impl JobNamespace {
    /// Unshare the mount namespace and mark the root subtree private,
    /// so subsequent mount events neither leak out nor bleed in.
    pub fn enter(commands: &dyn ClusterCommands) -> Result<Self> {
        Self::unshare_mounts()?;
        commands
            .make_private(Path::new("/"))
            .map_err(|e| OverlayError::Namespace(format!("mount --make-private / failed: {}", e)))?;
        info!("entered private mount namespace for this job step");
        Ok(Self { _sealed: () })
    }

    #[cfg(target_os = "linux")]
    fn unshare_mounts() -> Result<()> {
        use nix::sched::{unshare, CloneFlags};

        unshare(CloneFlags::CLONE_NEWNS)
            .map_err(|e| OverlayError::Namespace(format!("unshare(CLONE_NEWNS) failed: {}", e)))
    }

    #[cfg(not(target_os = "linux"))]
    fn unshare_mounts() -> Result<()> {
        Err(OverlayError::Namespace(
            "mount namespaces require Linux".to_string(),
        ))
    }
}
