//! ccmount: an ephemeral, per-job, cluster-wide filesystem overlay.
//!
//! When a batch job starts, the node that submitted it (the "head")
//! exports a policy-approved set of its directories over a private
//! network; every other node in the job privately mounts them for the
//! job's lifetime, and everything is torn down when the job ends.
//!
//! # Architecture
//!
//! - [`role`]: head discovery from the submit host's network identity
//! - [`config`]: overlay configuration, mount policy, core types
//! - [`exec`]: the external command capability, export planning, and
//!   mount execution
//! - [`kernel`]: private mount namespaces and resource limits
//! - [`safety`]: rollback-logged path creation and log-driven cleanup
//! - [`lifecycle`]: the four entry points invoked by the scheduling
//!   runtime
//! - [`testing`]: doubles for exercising orchestration without host
//!   side effects

pub mod cli;
pub mod config;
pub mod exec;
pub mod kernel;
pub mod lifecycle;
pub mod role;
pub mod safety;
pub mod testing;
