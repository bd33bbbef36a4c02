//! Remote mount execution, non-head nodes only.

use crate::config::overlay::OverlayConfig;
use crate::config::types::{ApprovedMount, Result};
use crate::exec::command::ClusterCommands;
use crate::kernel::namespace::JobNamespace;
use crate::safety::pathbuilder::PathBuilder;
use log::{debug, info};
use std::net::Ipv4Addr;
use std::time::Duration;

pub struct MountExecutor<'a> {
    config: &'a OverlayConfig,
}

impl<'a> MountExecutor<'a> {
    pub fn new(config: &'a OverlayConfig) -> Self {
        Self { config }
    }

    /// Fixed delay before mounting, as a coarse ordering device
    /// against the head's export publication. Not a handshake; can
    /// race under load.
    pub fn wait_for_exports(&self) {
        debug!(
            "waiting {}s for the head to publish exports",
            self.config.worker_delay_secs
        );
        std::thread::sleep(Duration::from_secs(self.config.worker_delay_secs));
    }

    /// Mount every approved directory from the head, in policy order.
    ///
    /// Requires proof that the private mount namespace was entered.
    /// For each directory: ensure the mount point exists, mark it
    /// private if it is already an active mount point, then NFS-mount
    /// it. The first failure aborts the remaining sequence.
    pub fn mount_all(
        &self,
        _namespace: &JobNamespace,
        head: Ipv4Addr,
        approved: &[ApprovedMount],
        builder: &PathBuilder,
        commands: &dyn ClusterCommands,
    ) -> Result<()> {
        for mount in approved {
            builder.ensure_path(&mount.path)?;

            // An existing mount point would propagate mount events
            // across namespace boundaries unless made private first.
            if commands.is_mount_point(&mount.path)? {
                commands.make_private(&mount.path)?;
            }

            commands.mount_from_head(head, &mount.path, mount.mode)?;
            info!(
                "mounted {}:{} ({:?})",
                head,
                mount.path.display(),
                mount.mode
            );
        }
        Ok(())
    }
}

/// Append the configured entry to the propagated library search path
/// if it is not already present. Reading the current value is purely
/// informational; absence is treated as empty.
pub fn extend_library_path(entry: &str) {
    let current = std::env::var("LD_LIBRARY_PATH").unwrap_or_default();
    if current.split(':').any(|part| part == entry) {
        return;
    }

    let updated = if current.is_empty() {
        entry.to_string()
    } else {
        format!("{}:{}", current, entry)
    };
    std::env::set_var("LD_LIBRARY_PATH", updated);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::policy::MountPolicy;
    use crate::config::types::AccessMode;
    use crate::testing::{namespace_token, CommandCall, RecordingCommands};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> OverlayConfig {
        OverlayConfig {
            scratch_prefix: format!("{}/dirs2del_", dir.path().display()),
            read_only_base: vec![dir.path().join("ro")],
            read_write_base: vec![dir.path().join("rw")],
            forbidden: vec![],
            worker_delay_secs: 0,
            ..OverlayConfig::default()
        }
    }

    fn head() -> Ipv4Addr {
        Ipv4Addr::new(10, 4, 5, 20)
    }

    #[test]
    fn test_mounts_in_policy_order() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let approved = MountPolicy::from_config(&config).approved("").unwrap();
        let builder = PathBuilder::new(&config, 1);
        let commands = RecordingCommands::new();

        MountExecutor::new(&config)
            .mount_all(&namespace_token(), head(), &approved, &builder, &commands)
            .unwrap();

        let mounts: Vec<(PathBuf, AccessMode)> = commands
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                CommandCall::Mount { directory, mode, .. } => Some((directory, mode)),
                _ => None,
            })
            .collect();
        assert_eq!(
            mounts,
            vec![
                (dir.path().join("ro"), AccessMode::ReadOnly),
                (dir.path().join("rw"), AccessMode::ReadWrite),
            ]
        );
        // mount points were created on the way
        assert!(dir.path().join("ro").is_dir());
        assert!(dir.path().join("rw").is_dir());
    }

    #[test]
    fn test_existing_mount_point_made_private_first() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let approved = MountPolicy::from_config(&config).approved("").unwrap();
        let builder = PathBuilder::new(&config, 1);
        let commands = RecordingCommands::new().with_mount_points(&[dir.path().join("ro")]);

        MountExecutor::new(&config)
            .mount_all(&namespace_token(), head(), &approved, &builder, &commands)
            .unwrap();

        let calls = commands.calls();
        let private_pos = calls
            .iter()
            .position(|c| matches!(c, CommandCall::MakePrivate(p) if p == &dir.path().join("ro")))
            .expect("existing mount point must be made private");
        let mount_pos = calls
            .iter()
            .position(|c| matches!(c, CommandCall::Mount { directory, .. } if directory == &dir.path().join("ro")))
            .unwrap();
        assert!(private_pos < mount_pos);
    }

    #[test]
    fn test_first_mount_failure_aborts_sequence() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let approved = MountPolicy::from_config(&config).approved("").unwrap();
        let builder = PathBuilder::new(&config, 1);
        let commands = RecordingCommands::new().failing_mount_of(&dir.path().join("ro"));

        let result = MountExecutor::new(&config).mount_all(
            &namespace_token(),
            head(),
            &approved,
            &builder,
            &commands,
        );
        assert!(result.is_err());

        // nothing after the failed mount was attempted
        let mounts = commands
            .calls()
            .into_iter()
            .filter(|call| matches!(call, CommandCall::Mount { .. }))
            .count();
        assert_eq!(mounts, 1);
    }

    #[test]
    fn test_extend_library_path_is_idempotent() {
        // process-global env var; exercise both arms in one test
        std::env::remove_var("LD_LIBRARY_PATH");
        extend_library_path("/usr/local/lib");
        assert_eq!(std::env::var("LD_LIBRARY_PATH").unwrap(), "/usr/local/lib");

        extend_library_path("/usr/local/lib");
        assert_eq!(std::env::var("LD_LIBRARY_PATH").unwrap(), "/usr/local/lib");

        extend_library_path("/opt/lib");
        assert_eq!(
            std::env::var("LD_LIBRARY_PATH").unwrap(),
            "/usr/local/lib:/opt/lib"
        );
    }
}
