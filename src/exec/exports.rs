//! Export planning, head side only.
//!
//! Writes one job-scoped export fragment binding every approved
//! directory to every other node in the job, then reloads the host's
//! export table once. The fragment is host-durable state and is
//! retracted later by cleanup, not by process exit.

use crate::config::overlay::OverlayConfig;
use crate::config::types::{ApprovedMount, JobContext, OverlayError, Result};
use crate::exec::command::ClusterCommands;
use log::{info, warn};
use nix::sys::stat::Mode;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Location of the export fragment for a job.
pub fn descriptor_path(config: &OverlayConfig, job_id: u32) -> PathBuf {
    config.exports_dir.join(format!("cc_{}.exports", job_id))
}

pub struct ExportPlanner<'a> {
    config: &'a OverlayConfig,
}

impl<'a> ExportPlanner<'a> {
    pub fn new(config: &'a OverlayConfig) -> Self {
        Self { config }
    }

    /// Write the job's export fragment and reload the export table.
    ///
    /// One rule per (directory, node) pair, excluding the head's own
    /// name. Re-invocation for the same job id overwrites the prior
    /// fragment. Reload failure is logged and the job proceeds
    /// best-effort.
    ///
    /// An empty node list is fatal; a zero-rule fragment exports
    /// nothing while the job proceeds.
    pub fn publish(
        &self,
        ctx: &JobContext,
        self_name: &str,
        approved: &[ApprovedMount],
        commands: &dyn ClusterCommands,
    ) -> Result<()> {
        if ctx.nodes.is_empty() {
            return Err(OverlayError::Export(format!(
                "job {} has no expanded node list to export to",
                ctx.job_id
            )));
        }

        self.ensure_exports_dir()?;

        let descriptor = descriptor_path(self.config, ctx.job_id);
        let mut file = File::create(&descriptor)?;
        let mut rules = 0usize;

        for mount in approved {
            for node in &ctx.nodes {
                if node == self_name {
                    continue;
                }
                writeln!(
                    file,
                    "{}\t{}({},{})",
                    mount.path.display(),
                    node,
                    mount.mode.option_flag(),
                    self.config.export_options
                )?;
                rules += 1;
            }
        }

        info!(
            "wrote {} export rules to {} for job {}",
            rules,
            descriptor.display(),
            ctx.job_id
        );

        if let Err(e) = commands.reload_exports() {
            warn!("export-table reload failed, proceeding best-effort: {}", e);
        }
        Ok(())
    }

    /// The export-fragment directory is created if absent but never
    /// recorded for rollback; it belongs to the host, not the job.
    fn ensure_exports_dir(&self) -> Result<()> {
        if self.config.exports_dir.exists() {
            return Ok(());
        }
        nix::unistd::mkdir(&self.config.exports_dir, Mode::from_bits_truncate(0o755)).map_err(
            |e| {
                OverlayError::Export(format!(
                    "failed to create {}: {}",
                    self.config.exports_dir.display(),
                    e
                ))
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::policy::MountPolicy;
    use crate::testing::{CommandCall, RecordingCommands};
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> OverlayConfig {
        OverlayConfig {
            exports_dir: dir.path().join("exports.d"),
            ..OverlayConfig::default()
        }
    }

    fn ctx(job_id: u32, submit_host: &str, nodes: &[&str]) -> JobContext {
        JobContext {
            job_id,
            user: "alice".to_string(),
            submit_host: submit_host.to_string(),
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            optional_mounts: String::new(),
        }
    }

    #[test]
    fn test_head_never_exports_to_itself() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let approved = MountPolicy::from_config(&config).approved("").unwrap();
        let ctx = ctx(17, "n1", &["n1", "n2", "n3"]);

        let commands = RecordingCommands::new();
        ExportPlanner::new(&config)
            .publish(&ctx, "n1", &approved, &commands)
            .unwrap();

        let contents = std::fs::read_to_string(descriptor_path(&config, 17)).unwrap();
        assert!(!contents.contains("n1("), "head must not be a target");
        // every approved dir exported to both other nodes
        assert_eq!(contents.lines().count(), approved.len() * 2);
    }

    #[test]
    fn test_descriptor_format_and_single_reload() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let policy = MountPolicy::from_config(&OverlayConfig {
            read_only_base: vec!["/opt".into()],
            read_write_base: vec!["/home".into()],
            ..config.clone()
        });
        let approved = policy.approved("").unwrap();
        let ctx = ctx(4242, "n1", &["n1", "n2"]);

        let commands = RecordingCommands::new();
        ExportPlanner::new(&config)
            .publish(&ctx, "n1", &approved, &commands)
            .unwrap();

        let contents = std::fs::read_to_string(descriptor_path(&config, 4242)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "/opt\tn2(ro,async,root_squash,no_subtree_check)",
                "/home\tn2(rw,async,root_squash,no_subtree_check)",
            ]
        );

        let reloads = commands
            .calls()
            .into_iter()
            .filter(|call| matches!(call, CommandCall::ReloadExports))
            .count();
        assert_eq!(reloads, 1);
    }

    #[test]
    fn test_reinvocation_overwrites_descriptor() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let approved = MountPolicy::from_config(&config).approved("").unwrap();
        let commands = RecordingCommands::new();
        let planner = ExportPlanner::new(&config);

        planner
            .publish(&ctx(5, "n1", &["n1", "n2", "n3"]), "n1", &approved, &commands)
            .unwrap();
        let first = std::fs::read_to_string(descriptor_path(&config, 5)).unwrap();

        planner
            .publish(&ctx(5, "n1", &["n1", "n2"]), "n1", &approved, &commands)
            .unwrap();
        let second = std::fs::read_to_string(descriptor_path(&config, 5)).unwrap();

        assert!(first.lines().count() > second.lines().count());
    }

    #[test]
    fn test_empty_node_list_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let approved = MountPolicy::from_config(&config).approved("").unwrap();
        let commands = RecordingCommands::new();

        let result = ExportPlanner::new(&config).publish(
            &ctx(9, "n1", &[]),
            "n1",
            &approved,
            &commands,
        );
        assert!(matches!(result, Err(crate::config::types::OverlayError::Export(_))));

        // no descriptor written, no reload attempted
        assert!(!descriptor_path(&config, 9).exists());
        assert!(commands.calls().is_empty());
    }

    #[test]
    fn test_reload_failure_is_non_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let approved = MountPolicy::from_config(&config).approved("").unwrap();
        let commands = RecordingCommands::new().failing_reload();

        let result = ExportPlanner::new(&config).publish(
            &ctx(6, "n1", &["n1", "n2"]),
            "n1",
            &approved,
            &commands,
        );
        assert!(result.is_ok());
    }
}
