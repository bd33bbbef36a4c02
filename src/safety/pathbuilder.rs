//! Idempotent mount-point creation with exact rollback recording.
//!
//! Every directory actually created here (and only those) is appended
//! to the job's rollback log, deepest-first, so teardown can remove
//! them top-down without re-deriving anything from policy.

use crate::config::overlay::OverlayConfig;
use crate::config::types::{OverlayError, Result};
use log::{debug, error};
use nix::sys::stat::Mode;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Per-node, per-job record of directories created for mount points.
///
/// Plain text, one absolute path per line, stored at
/// `<scratch_prefix><job_id>` in a location unshared across job
/// namespaces. Written incrementally during setup, consumed exactly
/// once at teardown.
pub struct RollbackLog {
    path: PathBuf,
}

impl RollbackLog {
    pub fn for_job(scratch_prefix: &str, job_id: u32) -> Self {
        Self {
            path: PathBuf::from(format!("{}{}", scratch_prefix, job_id)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append paths in the order given; callers pass deepest-first.
    pub fn append(&self, created: &[PathBuf]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        for path in created {
            writeln!(file, "{}", path.display())?;
        }
        Ok(())
    }

    /// Read all recorded paths, or `None` when no log exists for the
    /// job (nothing was created, or it was already cleaned up).
    pub fn read(&self) -> Result<Option<Vec<PathBuf>>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(PathBuf::from)
                    .collect(),
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the log file; absence is not an error.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Recursive directory creator that records exactly what it creates.
pub struct PathBuilder {
    log: RollbackLog,
    max_path_len: usize,
}

impl PathBuilder {
    pub fn new(config: &OverlayConfig, job_id: u32) -> Self {
        Self {
            log: RollbackLog::for_job(&config.scratch_prefix, job_id),
            max_path_len: config.max_path_len,
        }
    }

    pub fn log(&self) -> &RollbackLog {
        &self.log
    }

    /// Create every missing component of an absolute path with mode
    /// 0755, from the root downward.
    ///
    /// Pre-existing components are never recorded. On the first
    /// filesystem failure, whatever was already created is flushed to
    /// the rollback log before the error propagates. Invoking this on
    /// a fully-realized path performs no mutation and logs nothing.
    pub fn ensure_path(&self, path: &Path) -> Result<()> {
        if !path.is_absolute() {
            return Err(OverlayError::PathCreation(format!(
                "'{}' is not an absolute path",
                path.display()
            )));
        }
        if path.as_os_str().len() > self.max_path_len {
            return Err(OverlayError::PathCreation(format!(
                "'{}' exceeds the maximum path length of {} bytes",
                path.display(),
                self.max_path_len
            )));
        }

        let mut created: Vec<PathBuf> = Vec::new();
        let mut current = PathBuf::from("/");
        let mut failure: Option<OverlayError> = None;

        for component in path.components().skip(1) {
            current.push(component);
            if current.exists() {
                continue;
            }

            match nix::unistd::mkdir(&current, Mode::from_bits_truncate(0o755)) {
                Ok(()) => {
                    debug!("created mount-point directory {}", current.display());
                    created.push(current.clone());
                }
                // Lost a race with a concurrent creator; the directory
                // pre-exists from our perspective and is not ours to remove.
                Err(nix::errno::Errno::EEXIST) => {}
                Err(e) => {
                    failure = Some(OverlayError::PathCreation(format!(
                        "failed to create '{}': {}",
                        current.display(),
                        e
                    )));
                    break;
                }
            }
        }

        // Deepest-first, so cleanup's top-down walk never hits a
        // non-empty directory from an undeleted child.
        created.reverse();

        match failure {
            None => {
                if !created.is_empty() {
                    self.log.append(&created)?;
                }
                Ok(())
            }
            Some(err) => {
                if !created.is_empty() {
                    if let Err(log_err) = self.log.append(&created) {
                        error!(
                            "failed to record {} created directories in {}: {}",
                            created.len(),
                            self.log.path().display(),
                            log_err
                        );
                    }
                }
                Err(err)
            }
        }
    }
}
