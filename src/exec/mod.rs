//! Execution control
//!
//! The external command capability, head-side export planning, and
//! worker-side mount execution.

pub mod command;
pub mod exports;
pub mod mounts;
