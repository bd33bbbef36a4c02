//! Core types shared across the overlay system.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OverlayError>;

/// Errors raised while building or tearing down a job overlay
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("host resolution error: {0}")]
    Resolution(String),

    #[error("no usable head address for '{0}'")]
    NoHeadFound(String),

    #[error("mount policy error: {0}")]
    Policy(String),

    #[error("path creation error: {0}")]
    PathCreation(String),

    #[error("namespace isolation error: {0}")]
    Namespace(String),

    #[error("mount error: {0}")]
    Mount(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("external command error: {0}")]
    Command(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Access mode granted to an exported or mounted directory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

impl AccessMode {
    /// The mount/export option spelling for this mode
    pub fn option_flag(self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "ro",
            AccessMode::ReadWrite => "rw",
        }
    }
}

/// Policy classification of a directory
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectoryCategory {
    /// Never exported or mounted
    Forbidden,
    /// Fixed set, mounted read-only from the head
    ReadOnlyBase,
    /// Fixed set, mounted read-write from the head
    ReadWriteBase,
    /// User-requested extra directory, mounted read-write
    Optional,
}

/// A directory approved by policy for export and mounting
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovedMount {
    pub path: PathBuf,
    pub mode: AccessMode,
    pub category: DirectoryCategory,
}

/// Per-job facts supplied by the external scheduling runtime.
///
/// Read-only to this system; scoped to one job step on one node. The node
/// list arrives already expanded from the scheduler's compact notation.
#[derive(Clone, Debug)]
pub struct JobContext {
    pub job_id: u32,
    pub user: String,
    pub submit_host: String,
    pub nodes: Vec<String>,
    pub optional_mounts: String,
}
