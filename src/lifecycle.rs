//! The four lifecycle entry points invoked by the external scheduling
//! runtime: job init, post-option-parsing, job exit, and job epilog.
//!
//! Post-option-parsing is where the overlay is built: the node infers
//! its role from the submit host's network identity, then either
//! publishes exports (head) or privately mounts the approved set from
//! the head (worker). The epilog tears down whatever the rollback log
//! and export fragment say was built.

use crate::config::overlay::OverlayConfig;
use crate::config::policy::MountPolicy;
use crate::config::types::{JobContext, Result};
use crate::exec::command::ClusterCommands;
use crate::exec::exports::ExportPlanner;
use crate::exec::mounts::{extend_library_path, MountExecutor};
use crate::kernel::namespace::JobNamespace;
use crate::role::{HeadRole, HostResolver, RoleResolver};
use crate::safety::cleanup::JobCleanup;
use crate::safety::pathbuilder::PathBuilder;
use log::{debug, info};

/// Job start. Nothing to do yet; kept for hook symmetry with the
/// runtime's dispatch table.
pub fn job_init() -> Result<()> {
    Ok(())
}

/// Job exit on the local node. Mounts made in the job's private
/// namespace have already unwound with its last process.
pub fn job_exit() -> Result<()> {
    Ok(())
}

/// Build the overlay for one job step.
pub fn post_option_parsing(
    config: &OverlayConfig,
    ctx: &JobContext,
    resolver: &dyn HostResolver,
    commands: &dyn ClusterCommands,
) -> Result<()> {
    debug!(
        "job {} (user {}): submit host '{}', {} nodes",
        ctx.job_id,
        ctx.user,
        ctx.submit_host,
        ctx.nodes.len()
    );

    let approved = MountPolicy::from_config(config).approved(&ctx.optional_mounts)?;
    let role = RoleResolver::new(config).resolve_role(resolver, &ctx.submit_host)?;

    match role {
        HeadRole::Local => {
            // Head nodes export and stop; they never mount from themselves.
            ExportPlanner::new(config).publish(ctx, &ctx.submit_host, &approved, commands)
        }
        HeadRole::Remote(head) => {
            let executor = MountExecutor::new(config);
            executor.wait_for_exports();

            let namespace = JobNamespace::enter(commands)?;
            let builder = PathBuilder::new(config, ctx.job_id);
            executor.mount_all(&namespace, head, &approved, &builder, commands)?;

            extend_library_path(&config.library_path_entry);
            info!("overlay ready for job {}", ctx.job_id);
            Ok(())
        }
    }
}

/// Tear down whatever this node durably recorded for the job.
pub fn job_epilog(
    config: &OverlayConfig,
    job_id: u32,
    commands: &dyn ClusterCommands,
) -> Result<()> {
    JobCleanup::new(config).run(job_id, commands)
}
