//! Echo probing over raw ICMP sockets.

use crate::packet::{build_echo_request, parse_reply_v4, parse_reply_v6, EchoReply};
use async_trait::async_trait;
use hoptrace_core::{EchoProber, Family, ProbeResult, TraceError, TraceResult, PAYLOAD_SIZE};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time;
use tracing::trace;

/// Global echo ID counter so concurrent probers use distinct identifiers.
static ECHO_IDENT_COUNTER: AtomicU16 = AtomicU16::new(1);

/// Gets the next unique echo identifier.
fn next_echo_ident() -> u16 {
    ECHO_IDENT_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Echo probe capability over a raw ICMP or ICMPv6 socket.
///
/// The socket is opened for one address family at construction and
/// released when the prober is dropped, scoping it to a single trace.
/// Raw sockets require elevated privileges on most systems.
pub struct IcmpProber {
    socket: UdpSocket,
    family: Family,
    /// Echo identifier for this prober's lifetime.
    ident: u16,
    /// Sequence number of the most recent probe.
    seq: u16,
    /// Read buffer.
    buffer: Vec<u8>,
}

impl IcmpProber {
    /// Opens a raw ICMP socket for `family`.
    pub fn new(family: Family) -> TraceResult<Self> {
        let (domain, protocol) = match family {
            Family::Ipv4 => (Domain::IPV4, Protocol::ICMPV4),
            Family::Ipv6 => (Domain::IPV6, Protocol::ICMPV6),
        };
        let socket =
            Socket::new(domain, Type::RAW, Some(protocol)).map_err(TraceError::SocketCreation)?;
        socket
            .set_nonblocking(true)
            .map_err(TraceError::SocketCreation)?;
        let socket =
            UdpSocket::from_std(socket.into()).map_err(TraceError::SocketCreation)?;

        Ok(Self {
            socket,
            family,
            ident: next_echo_ident(),
            seq: 0,
            buffer: vec![0u8; 1500],
        })
    }

    /// Sets the TTL (v4) or unicast hop limit (v6) for the next probe.
    fn set_ttl(&self, ttl: u8) -> std::io::Result<()> {
        match self.family {
            Family::Ipv4 => self.socket.set_ttl(ttl as u32),
            Family::Ipv6 => SockRef::from(&self.socket).set_unicast_hops_v6(ttl as u32),
        }
    }
}

#[async_trait]
impl EchoProber for IcmpProber {
    async fn probe(
        &mut self,
        destination: IpAddr,
        ttl: u8,
        timeout: Duration,
    ) -> Result<ProbeResult, TraceError> {
        if Family::of(destination) != self.family {
            return Err(TraceError::FamilyMismatch {
                destination,
                family: self.family,
            });
        }

        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;

        self.set_ttl(ttl).map_err(TraceError::SendFailed)?;
        let request = build_echo_request(self.family, self.ident, seq, PAYLOAD_SIZE)?;

        trace!(ttl, ident = self.ident, seq, "sending echo request");
        self.socket
            .send_to(&request, SocketAddr::new(destination, 0))
            .await
            .map_err(TraceError::SendFailed)?;

        let sent_at = Instant::now();
        let deadline = sent_at + timeout;

        // Raw sockets see every ICMP message on the host; keep reading
        // until our reply shows up or the deadline passes.
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(ProbeResult::Timeout);
            }

            let (len, from) =
                match time::timeout(remaining, self.socket.recv_from(&mut self.buffer)).await {
                    Ok(received) => received.map_err(TraceError::ReceiveFailed)?,
                    Err(_) => return Ok(ProbeResult::Timeout),
                };

            let reply = match self.family {
                Family::Ipv4 => parse_reply_v4(&self.buffer[..len], destination),
                Family::Ipv6 => parse_reply_v6(&self.buffer[..len], destination),
            };

            match reply {
                Some(EchoReply { ident, seq: reply_seq })
                    if ident == self.ident && reply_seq == seq =>
                {
                    return Ok(ProbeResult::Reply {
                        responder: from.ip(),
                        rtt: sent_at.elapsed(),
                    });
                }
                Some(other) => {
                    trace!(
                        ident = other.ident,
                        seq = other.seq,
                        from = %from.ip(),
                        "ignoring reply to a different probe"
                    );
                }
                None => trace!(from = %from.ip(), "ignoring unrelated packet"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_echo_ident_uniqueness() {
        let a = next_echo_ident();
        let b = next_echo_ident();
        let c = next_echo_ident();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[tokio::test]
    #[ignore] // requires raw socket privileges
    async fn probes_localhost() {
        let mut prober = IcmpProber::new(Family::Ipv4).expect("raw socket");
        let result = prober
            .probe(IpAddr::V4(Ipv4Addr::LOCALHOST), 1, Duration::from_secs(1))
            .await
            .expect("probe");

        match result {
            ProbeResult::Reply { responder, .. } => {
                assert_eq!(responder, IpAddr::V4(Ipv4Addr::LOCALHOST));
            }
            ProbeResult::Timeout => panic!("no echo reply from localhost"),
        }
    }

    #[tokio::test]
    #[ignore] // requires raw socket privileges
    async fn rejects_cross_family_destination() {
        let mut prober = IcmpProber::new(Family::Ipv4).expect("raw socket");
        let err = prober
            .probe("::1".parse().unwrap(), 1, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TraceError::FamilyMismatch { .. }));
    }
}
