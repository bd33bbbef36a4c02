//! Mount policy: classification of directories and validation of the
//! user-supplied optional mount list.

use crate::config::overlay::OverlayConfig;
use crate::config::types::{
    AccessMode, ApprovedMount, DirectoryCategory, OverlayError, Result,
};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Holds the three fixed directory sets and the optional-list bound.
///
/// The fixed sets are invariant for the process lifetime; the optional
/// set is derived per job from the raw scheduler-supplied string.
pub struct MountPolicy {
    forbidden: Vec<PathBuf>,
    read_only_base: Vec<PathBuf>,
    read_write_base: Vec<PathBuf>,
    max_optional: usize,
}

impl MountPolicy {
    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            forbidden: config.forbidden.clone(),
            read_only_base: config.read_only_base.clone(),
            read_write_base: config.read_write_base.clone(),
            max_optional: config.max_optional_mounts,
        }
    }

    /// Classify a directory against the fixed sets.
    pub fn categorize(&self, path: &Path) -> Option<DirectoryCategory> {
        if self.forbidden.iter().any(|p| p == path) {
            Some(DirectoryCategory::Forbidden)
        } else if self.read_only_base.iter().any(|p| p == path) {
            Some(DirectoryCategory::ReadOnlyBase)
        } else if self.read_write_base.iter().any(|p| p == path) {
            Some(DirectoryCategory::ReadWriteBase)
        } else {
            None
        }
    }

    /// Build the full approved mount sequence for a job: the read-only
    /// base set, then the read-write base set, then the accepted
    /// optional entries, each tagged with its access mode.
    pub fn approved(&self, optional_raw: &str) -> Result<Vec<ApprovedMount>> {
        let mut approved = Vec::new();

        for path in &self.read_only_base {
            approved.push(ApprovedMount {
                path: path.clone(),
                mode: AccessMode::ReadOnly,
                category: DirectoryCategory::ReadOnlyBase,
            });
        }
        for path in &self.read_write_base {
            approved.push(ApprovedMount {
                path: path.clone(),
                mode: AccessMode::ReadWrite,
                category: DirectoryCategory::ReadWriteBase,
            });
        }
        for path in self.accepted_optional(optional_raw)? {
            approved.push(ApprovedMount {
                path,
                mode: AccessMode::ReadWrite,
                category: DirectoryCategory::Optional,
            });
        }

        Ok(approved)
    }

    /// Filter the raw optional-mount string into the accepted,
    /// order-preserving sequence of extra directories.
    ///
    /// Entries are separated by spaces, commas, or tabs. A non-absolute
    /// entry aborts all remaining processing; an entry matching any
    /// fixed set is skipped but still consumes budget; entries past the
    /// maximum count are dropped with a warning.
    pub fn accepted_optional(&self, raw: &str) -> Result<Vec<PathBuf>> {
        let mut accepted: Vec<PathBuf> = Vec::new();
        let mut processed = 0usize;

        for entry in raw.split([' ', ',', '\t']).filter(|s| !s.is_empty()) {
            processed += 1;
            if processed > self.max_optional {
                warn!(
                    "max number of optional mounts ({}) exceeded, dropping remaining entries",
                    self.max_optional
                );
                break;
            }

            let path = Path::new(entry);
            if !path.is_absolute() {
                return Err(OverlayError::Policy(format!(
                    "optional mount '{}' is not an absolute path",
                    entry
                )));
            }

            match self.categorize(path) {
                Some(category) => {
                    debug!(
                        "skipping optional mount {} (already {:?})",
                        path.display(),
                        category
                    );
                }
                None => accepted.push(path.to_path_buf()),
            }
        }

        Ok(accepted)
    }
}
