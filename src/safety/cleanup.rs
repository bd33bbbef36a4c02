//! Job teardown driven by the durable rollback log.
//!
//! Mounts made inside the job's private namespace vanish with its last
//! process; what remains are the empty directories used as mount
//! points and, on the head, the host-durable export fragment. Both are
//! reconstructed from what was logged, never re-derived from policy.

use crate::config::overlay::OverlayConfig;
use crate::config::types::Result;
use crate::exec::command::ClusterCommands;
use crate::exec::exports::descriptor_path;
use crate::safety::pathbuilder::RollbackLog;
use log::{debug, info, warn};

pub struct JobCleanup<'a> {
    config: &'a OverlayConfig,
}

impl<'a> JobCleanup<'a> {
    pub fn new(config: &'a OverlayConfig) -> Self {
        Self { config }
    }

    /// Replay the node's rollback log for a job, then retract the
    /// job's export fragment if this node holds one.
    ///
    /// Idempotent: a second run for an already-cleaned job id finds
    /// neither log nor descriptor and does nothing.
    pub fn run(&self, job_id: u32, commands: &dyn ClusterCommands) -> Result<()> {
        self.remove_created_mount_points(job_id, commands)?;
        self.retract_exports(job_id, commands)?;
        Ok(())
    }

    fn remove_created_mount_points(
        &self,
        job_id: u32,
        commands: &dyn ClusterCommands,
    ) -> Result<()> {
        let log = RollbackLog::for_job(&self.config.scratch_prefix, job_id);
        let paths = match log.read()? {
            Some(paths) => paths,
            None => {
                debug!("no rollback log for job {}, nothing to clean", job_id);
                return Ok(());
            }
        };

        info!(
            "removing {} mount-point directories for job {}",
            paths.len(),
            job_id
        );
        for path in &paths {
            // Unmount unconditionally; a path that was never mounted
            // simply fails here and that is fine.
            if let Err(e) = commands.unmount(path) {
                debug!("unmount of {} skipped: {}", path.display(), e);
            }
            if let Err(e) = std::fs::remove_dir(path) {
                debug!("removal of {} skipped: {}", path.display(), e);
            }
        }

        log.remove()
    }

    fn retract_exports(&self, job_id: u32, commands: &dyn ClusterCommands) -> Result<()> {
        let descriptor = descriptor_path(self.config, job_id);
        if !descriptor.exists() {
            return Ok(());
        }

        info!(
            "retracting export fragment {} for job {}",
            descriptor.display(),
            job_id
        );
        std::fs::remove_file(&descriptor)?;
        if let Err(e) = commands.reload_exports() {
            warn!("export-table reload after retraction failed: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CommandCall, RecordingCommands};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> OverlayConfig {
        OverlayConfig {
            scratch_prefix: format!("{}/dirs2del_", dir.path().display()),
            exports_dir: dir.path().join("exports.d"),
            ..OverlayConfig::default()
        }
    }

    fn write_log(config: &OverlayConfig, job_id: u32, paths: &[PathBuf]) {
        let log = RollbackLog::for_job(&config.scratch_prefix, job_id);
        let mut file = std::fs::File::create(log.path()).unwrap();
        for path in paths {
            writeln!(file, "{}", path.display()).unwrap();
        }
    }

    #[test]
    fn test_removes_logged_directories_and_log() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let targets: Vec<PathBuf> = ["d1", "d2", "d3"]
            .iter()
            .map(|name| dir.path().join(name))
            .collect();
        for target in &targets {
            std::fs::create_dir(target).unwrap();
        }
        write_log(&config, 4242, &targets);

        let commands = RecordingCommands::new();
        JobCleanup::new(&config).run(4242, &commands).unwrap();

        for target in &targets {
            assert!(!target.exists(), "{} should be removed", target.display());
        }
        let unmounts: Vec<_> = commands
            .calls()
            .into_iter()
            .filter(|call| matches!(call, CommandCall::Unmount(_)))
            .collect();
        assert_eq!(unmounts.len(), 3);

        let log = RollbackLog::for_job(&config.scratch_prefix, 4242);
        assert!(log.read().unwrap().is_none(), "log file must be deleted");
    }

    #[test]
    fn test_rerun_is_noop() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        write_log(&config, 4242, &[dir.path().join("gone")]);

        let commands = RecordingCommands::new();
        let cleanup = JobCleanup::new(&config);
        cleanup.run(4242, &commands).unwrap();
        cleanup.run(4242, &commands).unwrap();

        // Only the first run saw the log.
        let unmounts = commands
            .calls()
            .into_iter()
            .filter(|call| matches!(call, CommandCall::Unmount(_)))
            .count();
        assert_eq!(unmounts, 1);
    }

    #[test]
    fn test_head_retracts_descriptor_and_reloads() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::create_dir(&config.exports_dir).unwrap();
        let descriptor = descriptor_path(&config, 4242);
        std::fs::write(&descriptor, "/opt\tn2(ro)\n").unwrap();

        let commands = RecordingCommands::new();
        JobCleanup::new(&config).run(4242, &commands).unwrap();

        assert!(!descriptor.exists());
        assert!(commands
            .calls()
            .contains(&CommandCall::ReloadExports));
    }

    #[test]
    fn test_reload_failure_is_non_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::create_dir(&config.exports_dir).unwrap();
        std::fs::write(descriptor_path(&config, 7), "").unwrap();

        let commands = RecordingCommands::new().failing_reload();
        assert!(JobCleanup::new(&config).run(7, &commands).is_ok());
    }
}
