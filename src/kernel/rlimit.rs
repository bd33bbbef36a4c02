//! Process resource limits required for NFS client operation.

use crate::config::types::{OverlayError, Result};
use log::debug;

/// Raise the locked-memory limit to unlimited for the job's process
/// tree. Failure is fatal to the job step.
pub fn raise_memlock_limit() -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        use nix::sys::resource::{setrlimit, Resource, RLIM_INFINITY};

        setrlimit(Resource::RLIMIT_MEMLOCK, RLIM_INFINITY, RLIM_INFINITY)
            .map_err(|e| OverlayError::Config(format!("setrlimit for memlock failed: {}", e)))?;
        debug!("memlock limit raised to unlimited");
        Ok(())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Err(OverlayError::Config(
            "memlock limit control requires Linux".to_string(),
        ))
    }
}
