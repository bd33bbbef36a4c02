//! Safety and teardown
//!
//! Exact rollback recording during setup and log-driven cleanup at
//! job end.

pub mod cleanup;
pub mod pathbuilder;
