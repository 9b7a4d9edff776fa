//! Target and local-host resolution.

use crate::{Family, NameService, TraceError};
use std::collections::{BTreeSet, HashMap};
use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;
use tracing::debug;

/// The address sets a trace run works from.
///
/// Built once per invocation and immutable afterwards.
#[derive(Debug, Clone)]
pub struct HostResolution {
    /// Local addresses partitioned by family, link-local IPv6 excluded.
    pub local_addrs: HashMap<Family, BTreeSet<IpAddr>>,
    /// Remote addresses partitioned by family, resolver order preserved.
    pub remote_addrs: HashMap<Family, Vec<IpAddr>>,
    /// Reverse/canonical name of the target. `None` when only
    /// address-only resolution succeeded.
    pub display_name: Option<String>,
}

impl HostResolution {
    /// Families for which a trace can run: both a local and a remote
    /// address must exist. IPv4 sorts before IPv6.
    pub fn traceable_families(&self) -> Vec<Family> {
        [Family::Ipv4, Family::Ipv6]
            .into_iter()
            .filter(|family| {
                let has_local = self
                    .local_addrs
                    .get(family)
                    .is_some_and(|addrs| !addrs.is_empty());
                let has_remote = self
                    .remote_addrs
                    .get(family)
                    .is_some_and(|addrs| !addrs.is_empty());
                has_local && has_remote
            })
            .collect()
    }

    /// The address traced for a family: the first one the resolver
    /// returned. Remaining candidates are never probed.
    pub fn destination(&self, family: Family) -> Option<IpAddr> {
        self.remote_addrs
            .get(&family)
            .and_then(|addrs| addrs.first().copied())
    }
}

/// Returns true for link-local IPv6 addresses (fe80::/10).
fn is_link_local_v6(addr: &Ipv6Addr) -> bool {
    (0xfe80..=0xfebf).contains(&addr.segments()[0])
}

/// Turns a target string into the address sets of a trace run.
pub struct Resolver<N> {
    names: Arc<N>,
}

impl<N: NameService> Resolver<N> {
    pub fn new(names: Arc<N>) -> Self {
        Self { names }
    }

    /// Resolves `target` and the local host into a [`HostResolution`].
    ///
    /// Full name resolution is attempted first; a failure there falls
    /// back to address-only resolution with no display name. Only when
    /// both fail does the run abort with [`TraceError::NameNotFound`].
    pub async fn resolve(&self, target: &str) -> Result<HostResolution, TraceError> {
        let mut local_addrs: HashMap<Family, BTreeSet<IpAddr>> = HashMap::new();
        for addr in self.names.local_addrs()? {
            if let IpAddr::V6(v6) = addr {
                if is_link_local_v6(&v6) {
                    continue;
                }
            }
            local_addrs.entry(Family::of(addr)).or_default().insert(addr);
        }

        let (remote, display_name) = match self.names.lookup_entry(target).await {
            Ok(entry) => {
                let name = Some(entry.name).filter(|name| !name.is_empty());
                (entry.addrs, name)
            }
            Err(err) => {
                debug!(target, error = %err, "full resolution failed, trying address-only");
                match self.names.lookup_addrs(target).await {
                    Ok(addrs) => (addrs, None),
                    Err(_) => {
                        return Err(TraceError::NameNotFound {
                            target: target.to_string(),
                        })
                    }
                }
            }
        };

        let mut remote_addrs: HashMap<Family, Vec<IpAddr>> = HashMap::new();
        for addr in remote {
            remote_addrs.entry(Family::of(addr)).or_default().push(addr);
        }

        debug!(
            target,
            display_name = ?display_name,
            remote_v4 = remote_addrs.get(&Family::Ipv4).map_or(0, Vec::len),
            remote_v6 = remote_addrs.get(&Family::Ipv6).map_or(0, Vec::len),
            "target resolved"
        );

        Ok(HostResolution {
            local_addrs,
            remote_addrs,
            display_name,
        })
    }
}
