//! Kernel primitives
//!
//! Mount-namespace isolation and process resource limits.

pub mod namespace;
pub mod rlimit;
