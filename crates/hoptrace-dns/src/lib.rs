//! System name resolution backed by hickory-resolver, plus local
//! interface address enumeration.

use async_trait::async_trait;
use hickory_resolver::config::LookupIpStrategy;
use hickory_resolver::system_conf::read_system_conf;
use hickory_resolver::TokioAsyncResolver;
use hoptrace_core::{HostEntry, NameService, TraceError, TraceResult};
use pnet::datalink;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// Upper bound on any single forward or reverse lookup. Keeps a stalled
/// name server from blocking a trace indefinitely.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Name service over the system's configured DNS resolver.
pub struct SystemNameService {
    resolver: TokioAsyncResolver,
}

impl SystemNameService {
    /// Builds a resolver from the system DNS configuration.
    pub fn new() -> TraceResult<Self> {
        let (config, mut opts) = read_system_conf().map_err(|err| {
            TraceError::Internal(format!("failed to read DNS configuration: {err}"))
        })?;
        opts.timeout = LOOKUP_TIMEOUT;
        opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        })
    }

    async fn reverse_name(&self, addr: IpAddr) -> Option<String> {
        let lookup = self.resolver.reverse_lookup(addr).await.ok()?;
        lookup
            .iter()
            .next()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
    }
}

#[async_trait]
impl NameService for SystemNameService {
    async fn lookup_entry(&self, target: &str) -> Result<HostEntry, TraceError> {
        // A literal address resolves fully only if it has a PTR record;
        // otherwise the caller falls back to address-only resolution.
        if let Ok(addr) = target.parse::<IpAddr>() {
            let name = self
                .reverse_name(addr)
                .await
                .ok_or_else(|| TraceError::NameNotFound {
                    target: target.to_string(),
                })?;
            return Ok(HostEntry {
                name,
                addrs: vec![addr],
            });
        }

        let lookup = self.resolver.lookup_ip(target).await.map_err(|err| {
            debug!(target, error = %err, "forward lookup failed");
            TraceError::NameNotFound {
                target: target.to_string(),
            }
        })?;
        let addrs: Vec<IpAddr> = lookup.iter().collect();
        if addrs.is_empty() {
            return Err(TraceError::NameNotFound {
                target: target.to_string(),
            });
        }

        Ok(HostEntry {
            name: target.to_string(),
            addrs,
        })
    }

    async fn lookup_addrs(&self, target: &str) -> Result<Vec<IpAddr>, TraceError> {
        if let Ok(addr) = target.parse::<IpAddr>() {
            return Ok(vec![addr]);
        }

        let lookup =
            self.resolver
                .lookup_ip(target)
                .await
                .map_err(|_| TraceError::NameNotFound {
                    target: target.to_string(),
                })?;
        Ok(lookup.iter().collect())
    }

    async fn reverse_lookup(&self, addr: IpAddr) -> Option<String> {
        self.reverse_name(addr).await
    }

    fn local_addrs(&self) -> Result<Vec<IpAddr>, TraceError> {
        let mut addrs = Vec::new();
        for iface in datalink::interfaces() {
            if !iface.is_up() || iface.is_loopback() {
                continue;
            }
            addrs.extend(iface.ips.iter().map(|network| network.ip()));
        }
        debug!(count = addrs.len(), "enumerated local addresses");
        Ok(addrs)
    }
}
