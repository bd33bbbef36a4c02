//! Per-job head discovery from network identity.
//!
//! The head is not statically configured: it is whichever machine
//! submitted this particular job, so its address is rediscovered per
//! job from the scheduler-supplied submit-host name.

use crate::config::overlay::OverlayConfig;
use crate::config::types::{OverlayError, Result};
use log::{debug, info};
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

/// Role of the local node within one job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeadRole {
    /// The local node is the head; it exports, never mounts
    Local,
    /// Another node is the head, reachable at this private address
    Remote(Ipv4Addr),
}

/// Network name resolution, injectable so role inference can be tested
/// without a resolver on the host.
pub trait HostResolver {
    fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// Production resolver backed by the system's name service.
pub struct DnsResolver;

impl HostResolver for DnsResolver {
    fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        Ok((host, 0u16)
            .to_socket_addrs()?
            .map(|addr| addr.ip())
            .collect())
    }
}

/// Infers head identity from the submit host's resolved addresses.
pub struct RoleResolver {
    private_prefix: [u8; 3],
    self_alias: Ipv4Addr,
}

impl RoleResolver {
    pub fn new(config: &OverlayConfig) -> Self {
        let octets = config.private_network.octets();
        Self {
            private_prefix: [octets[0], octets[1], octets[2]],
            self_alias: config.self_alias,
        }
    }

    /// Decide whether the local node is the head for this job.
    ///
    /// Any resolved address equal to the configured self alias means
    /// the submit host is this machine. Otherwise the first IPv4
    /// address on the configured private network is the head.
    pub fn resolve_role(
        &self,
        resolver: &dyn HostResolver,
        submit_host: &str,
    ) -> Result<HeadRole> {
        let addrs = resolver.resolve(submit_host).map_err(|e| {
            OverlayError::Resolution(format!(
                "unable to resolve submit host '{}': {}",
                submit_host, e
            ))
        })?;
        debug!("submit host '{}' resolved to {:?}", submit_host, addrs);

        let v4: Vec<Ipv4Addr> = addrs
            .iter()
            .filter_map(|addr| match addr {
                IpAddr::V4(v4) => Some(*v4),
                IpAddr::V6(_) => None,
            })
            .collect();

        if v4.iter().any(|addr| *addr == self.self_alias) {
            info!("submit host '{}' is this node; acting as head", submit_host);
            return Ok(HeadRole::Local);
        }

        match v4
            .iter()
            .find(|addr| addr.octets()[..3] == self.private_prefix)
        {
            Some(head) => {
                info!("head for this job is {} ('{}')", head, submit_host);
                Ok(HeadRole::Remote(*head))
            }
            None => Err(OverlayError::NoHeadFound(submit_host.to_string())),
        }
    }
}
