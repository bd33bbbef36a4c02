//! Configuration and policy
//!
//! Static overlay configuration, directory classification, and shared
//! core types.

pub mod overlay;
pub mod policy;
pub mod types;
