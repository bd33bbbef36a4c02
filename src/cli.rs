//! Binary surface: the four lifecycle hooks as subcommands, plus the
//! adapter that builds a [`JobContext`] from the scheduler-provided
//! environment.

use crate::config::overlay::OverlayConfig;
use crate::config::types::JobContext;
use crate::exec::command::{ClusterCommands, SystemCommands};
use crate::kernel::rlimit::raise_memlock_limit;
use crate::lifecycle;
use crate::role::DnsResolver;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::warn;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ccmount", version, about = "Per-job private cluster filesystem overlay")]
struct Cli {
    /// Path to a JSON configuration file; built-in defaults otherwise
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Job start hook
    Init,
    /// Build the overlay once job options are final
    PostOpt,
    /// Job exit hook on the local node
    Exit,
    /// Tear down the job's overlay state on this node
    Epilog,
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = OverlayConfig::load(cli.config.as_deref())?;
    let commands = SystemCommands::new(&config);

    match cli.command {
        Commands::Init => lifecycle::job_init()?,
        Commands::PostOpt => {
            raise_memlock_limit()?;
            let ctx = job_context_from_env(&commands)?;
            lifecycle::post_option_parsing(&config, &ctx, &DnsResolver, &commands)?;
        }
        Commands::Exit => lifecycle::job_exit()?,
        Commands::Epilog => {
            let job_id = job_id_from_env()?;
            lifecycle::job_epilog(&config, job_id, &commands)?;
        }
    }
    Ok(())
}

fn job_id_from_env() -> Result<u32> {
    let raw = std::env::var("SLURM_JOB_ID").context("SLURM_JOB_ID is not set")?;
    raw.parse()
        .with_context(|| format!("SLURM_JOB_ID '{}' is not a job id", raw))
}

/// Assemble the per-job facts from the scheduler's environment.
///
/// The submit host and node list are informational for some roles, so
/// their absence is logged rather than fatal here; downstream steps
/// that genuinely need them fail on their own terms.
fn job_context_from_env(commands: &dyn ClusterCommands) -> Result<JobContext> {
    let job_id = job_id_from_env()?;

    let submit_host = std::env::var("SLURM_SUBMIT_HOST").unwrap_or_else(|_| {
        warn!("SLURM_SUBMIT_HOST is not set");
        String::new()
    });

    let nodes = match std::env::var("SLURM_NODELIST") {
        Ok(compact) => commands
            .expand_node_list(&compact)
            .with_context(|| format!("failed to expand node list '{}'", compact))?,
        Err(_) => {
            warn!("SLURM_NODELIST is not set");
            Vec::new()
        }
    };

    let user = lookup_current_user()?;
    let optional_mounts = std::env::var("CCMOUNTS").unwrap_or_default();

    Ok(JobContext {
        job_id,
        user,
        submit_host,
        nodes,
        optional_mounts,
    })
}

/// Resolve the job's owning user from the local account database.
/// An unresolvable uid aborts the hook.
fn lookup_current_user() -> Result<String> {
    let uid = nix::unistd::Uid::effective();
    let user = nix::unistd::User::from_uid(uid)
        .with_context(|| format!("account lookup for uid {} failed", uid))?;
    owning_user_name(uid, user)
}

fn owning_user_name(uid: nix::unistd::Uid, user: Option<nix::unistd::User>) -> Result<String> {
    user.map(|user| user.name).ok_or_else(|| {
        anyhow::anyhow!("uid {} has no entry in the local account database", uid)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolvable_uid_is_fatal() {
        let result = owning_user_name(nix::unistd::Uid::from_raw(65533), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_current_user_resolves() {
        // the test process itself always has an account entry
        let name = lookup_current_user().unwrap();
        assert!(!name.is_empty());
    }
}
