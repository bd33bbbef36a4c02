//! Static overlay configuration.
//!
//! All fixed values live here as injectable configuration rather than
//! hard-coded globals, so tests can substitute alternate policies and
//! scratch locations. Defaults match the production cluster profile.

use crate::config::types::{OverlayError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverlayConfig {
    /// Directories never exported or mounted
    pub forbidden: Vec<PathBuf>,
    /// Directories mounted read-only from the head
    pub read_only_base: Vec<PathBuf>,
    /// Directories mounted read-write from the head
    pub read_write_base: Vec<PathBuf>,
    /// Maximum accepted entries in the user-supplied optional list
    pub max_optional_mounts: usize,
    /// Maximum byte length of any mount-point path
    pub max_path_len: usize,
    /// Cluster subnet on which mounts occur; only the first three octets
    /// participate in head discovery
    pub private_network: Ipv4Addr,
    /// Loopback alias identifying the local node as the submit host
    pub self_alias: Ipv4Addr,
    /// Rollback-log filename prefix; the job id is appended. Must point
    /// into a location unshared across job namespaces on the node.
    pub scratch_prefix: String,
    /// Directory receiving per-job export fragments
    pub exports_dir: PathBuf,
    /// Options appended to every export rule after the access flag
    pub export_options: String,
    /// NFS mount options appended after the access flag
    pub nfs_options: String,
    /// Seconds a worker waits before mounting, as a coarse ordering
    /// device against the head's export publication
    pub worker_delay_secs: u64,
    /// Entry appended to the propagated library search path on workers
    pub library_path_entry: String,
    pub mount_bin: PathBuf,
    pub mountpoint_bin: PathBuf,
    pub exportfs_bin: PathBuf,
    pub scontrol_bin: PathBuf,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            forbidden: ["/", "/dev", "/lib", "/lib64", "/proc", "/tmp", "/var"]
                .iter()
                .map(PathBuf::from)
                .collect(),
            read_only_base: vec![PathBuf::from("/opt"), PathBuf::from("/usr")],
            read_write_base: vec![PathBuf::from("/home")],
            max_optional_mounts: 8,
            max_path_len: 512,
            private_network: Ipv4Addr::new(10, 4, 5, 0),
            self_alias: Ipv4Addr::new(127, 0, 1, 1),
            scratch_prefix: "/tmp/dirs2del_".to_string(),
            exports_dir: PathBuf::from("/etc/exports.d"),
            export_options: "async,root_squash,no_subtree_check".to_string(),
            nfs_options: "vers=3,async,fsc,noatime,tcp,rsize=1048576,wsize=1048576".to_string(),
            worker_delay_secs: 1,
            library_path_entry: "/usr/local/lib".to_string(),
            mount_bin: PathBuf::from("/bin/mount"),
            mountpoint_bin: PathBuf::from("/bin/mountpoint"),
            exportfs_bin: PathBuf::from("/usr/sbin/exportfs"),
            scontrol_bin: PathBuf::from("/usr/bin/scontrol"),
        }
    }
}

impl OverlayConfig {
    /// Load configuration from a JSON file, or fall back to defaults
    /// when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    OverlayError::Config(format!(
                        "failed to read config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                serde_json::from_str(&raw).map_err(|e| {
                    OverlayError::Config(format!(
                        "failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
            None => {
                debug!("no config file given, using built-in defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Verify the three fixed directory sets do not overlap.
    pub fn validate(&self) -> Result<()> {
        let sets = [
            ("forbidden", &self.forbidden),
            ("read_only_base", &self.read_only_base),
            ("read_write_base", &self.read_write_base),
        ];

        for (i, (name_a, set_a)) in sets.iter().enumerate() {
            for (name_b, set_b) in sets.iter().skip(i + 1) {
                if let Some(dup) = set_a.iter().find(|p| set_b.contains(p)) {
                    return Err(OverlayError::Config(format!(
                        "directory {} appears in both {} and {}",
                        dup.display(),
                        name_a,
                        name_b
                    )));
                }
            }
        }

        if self.max_optional_mounts == 0 {
            return Err(OverlayError::Config(
                "max_optional_mounts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = OverlayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_optional_mounts, 8);
        assert_eq!(config.private_network, Ipv4Addr::new(10, 4, 5, 0));
    }

    #[test]
    fn test_overlapping_sets_rejected() {
        let mut config = OverlayConfig::default();
        config.read_only_base.push(PathBuf::from("/home"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = OverlayConfig::load(None).unwrap();
        assert_eq!(config.read_write_base, vec![PathBuf::from("/home")]);
    }

    #[test]
    fn test_load_from_json_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_optional_mounts": 3, "worker_delay_secs": 0}}"#
        )
        .unwrap();

        let config = OverlayConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.max_optional_mounts, 3);
        assert_eq!(config.worker_delay_secs, 0);
        // untouched fields keep their defaults
        assert_eq!(config.read_only_base.len(), 2);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(OverlayConfig::load(Some(file.path())).is_err());
    }
}
