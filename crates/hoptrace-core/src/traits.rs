//! Capability traits for echo probing and name resolution.
//!
//! Both capabilities are injected into the resolver and tracer so they
//! can run against deterministic fakes in tests instead of real network
//! calls.

use crate::{HostEntry, ProbeResult, TraceError};
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

/// Echo probe capability consumed by the hop tracer.
#[async_trait]
pub trait EchoProber: Send {
    /// Performs one probe attempt: sends an echo request toward
    /// `destination` with the given TTL and blocks until a reply arrives
    /// or `timeout` elapses.
    ///
    /// Both TTL-exceeded diagnostics and final echo replies are reported
    /// as [`ProbeResult::Reply`]; the caller decides what the responder
    /// means. Returns `Err` only for failures of the probe transport
    /// itself, never for timeouts.
    async fn probe(
        &mut self,
        destination: IpAddr,
        ttl: u8,
        timeout: Duration,
    ) -> Result<ProbeResult, TraceError>;
}

/// System name resolution capability consumed by the resolver and tracer.
#[async_trait]
pub trait NameService: Send + Sync {
    /// Full resolution of a target: a forward lookup for a hostname, a
    /// reverse lookup for an address literal. Fails when no name can be
    /// associated with the target.
    async fn lookup_entry(&self, target: &str) -> Result<HostEntry, TraceError>;

    /// Address-only resolution, acquiring no hostname.
    async fn lookup_addrs(&self, target: &str) -> Result<Vec<IpAddr>, TraceError>;

    /// Reverse lookup of a single address. Failure is not an error; it
    /// degrades to `None`.
    async fn reverse_lookup(&self, addr: IpAddr) -> Option<String>;

    /// Addresses bound to the local machine's interfaces.
    fn local_addrs(&self) -> Result<Vec<IpAddr>, TraceError>;
}
