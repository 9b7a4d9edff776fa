//! Core types for hop discovery.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Number of echo probes sent per hop before the hop is reported.
pub const PROBES_PER_HOP: usize = 3;

/// Size of the echo request payload in bytes.
pub const PAYLOAD_SIZE: usize = 32;

/// Address family of a traced path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    /// Returns the family an address belongs to.
    pub fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::Ipv4,
            IpAddr::V6(_) => Family::Ipv6,
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::Ipv4 => write!(f, "IPv4"),
            Family::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Outcome of a single echo probe attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeResult {
    /// A reply arrived within the timeout: either a TTL-exceeded
    /// diagnostic from an intermediate router or an echo reply from the
    /// destination itself. `responder` is the source of the reply.
    Reply { responder: IpAddr, rtt: Duration },
    /// No reply arrived within the timeout. A valid protocol outcome,
    /// not an error.
    Timeout,
}

impl ProbeResult {
    /// The replying address, if any.
    pub fn responder(&self) -> Option<IpAddr> {
        match self {
            ProbeResult::Reply { responder, .. } => Some(*responder),
            ProbeResult::Timeout => None,
        }
    }
}

/// Report for a single hop index (TTL value).
///
/// Emitted once per TTL and never mutated afterwards. `responder` is set
/// iff at least one attempt replied, taking the last reply's source;
/// `is_destination` iff the responder equals the traced destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopReport {
    /// 1-based hop index, at most the trace's hop ceiling.
    pub hop: u8,
    /// All probe attempts for this hop, in send order.
    pub attempts: Vec<ProbeResult>,
    /// Source of the last reply, if any attempt replied.
    pub responder: Option<IpAddr>,
    /// Reverse-DNS name of the responder, when available.
    pub hostname: Option<String>,
    /// Whether the responder is the traced destination.
    pub is_destination: bool,
}

/// The product of full (forward + reverse) resolution of a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// Display name associated with the target.
    pub name: String,
    /// Resolved addresses, resolver order preserved.
    pub addrs: Vec<IpAddr>,
}

/// Parameters for a hop trace.
#[derive(Debug, Clone)]
pub struct TraceParams {
    /// Hop ceiling; the trace ends after this many hops even if the
    /// destination was never reached.
    pub max_hops: u8,
    /// Timeout for each probe attempt.
    pub probe_timeout: Duration,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            max_hops: 30,
            probe_timeout: Duration::from_millis(5000),
        }
    }
}

impl TraceParams {
    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), crate::TraceError> {
        if self.max_hops == 0 {
            return Err(crate::TraceError::InvalidMaxHops {
                max_hops: self.max_hops,
            });
        }
        Ok(())
    }
}
