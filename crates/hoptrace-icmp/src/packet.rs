//! ICMP echo packet construction and reply parsing using pnet.

use hoptrace_core::{Family, TraceError};
use pnet::packet::icmp::{self, echo_request::MutableEchoRequestPacket, IcmpCode, IcmpPacket, IcmpType, IcmpTypes};
use pnet::packet::icmpv6::{Icmpv6Packet, Icmpv6Types};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::{MutablePacket, Packet};
use std::net::IpAddr;

/// ICMP header size in bytes, fixed for echo messages.
pub const ICMP_HEADER_LEN: usize = 8;

/// ICMPv6 Echo Request type value.
const ICMPV6_ECHO_REQUEST: u8 = 128;

/// Identification of the probe a received packet answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoReply {
    /// Identifier of the original echo request.
    pub ident: u16,
    /// Sequence number of the original echo request.
    pub seq: u16,
}

/// Builds an echo request with a patterned payload of `payload_len`
/// bytes.
///
/// The ICMPv4 and ICMPv6 echo headers share one layout, so a single
/// builder covers both; only the type value differs. The v4 checksum is
/// computed here, the v6 checksum is filled in by the kernel on raw
/// ICMPv6 sockets.
pub fn build_echo_request(
    family: Family,
    ident: u16,
    seq: u16,
    payload_len: usize,
) -> Result<Vec<u8>, TraceError> {
    let mut buf = vec![0u8; ICMP_HEADER_LEN + payload_len];
    {
        let mut packet = MutableEchoRequestPacket::new(&mut buf)
            .ok_or_else(|| TraceError::Internal("failed to create echo request".to_string()))?;
        match family {
            Family::Ipv4 => packet.set_icmp_type(IcmpTypes::EchoRequest),
            Family::Ipv6 => packet.set_icmp_type(IcmpType::new(ICMPV6_ECHO_REQUEST)),
        }
        packet.set_icmp_code(IcmpCode::new(0));
        packet.set_identifier(ident);
        packet.set_sequence_number(seq);
        for (i, byte) in packet.payload_mut().iter_mut().enumerate() {
            *byte = (i & 0xff) as u8;
        }
    }

    if family == Family::Ipv4 {
        let view = IcmpPacket::new(&buf)
            .ok_or_else(|| TraceError::Internal("failed to view echo request".to_string()))?;
        let sum = icmp::checksum(&view);
        let mut packet = MutableEchoRequestPacket::new(&mut buf)
            .ok_or_else(|| TraceError::Internal("failed to create echo request".to_string()))?;
        packet.set_checksum(sum);
    }

    Ok(buf)
}

/// Parses a datagram received on a raw ICMPv4 socket (the IP header is
/// included). Returns the probe identification it answers, or `None`
/// for packets that are not echo traffic attributable to a probe toward
/// `destination`.
pub fn parse_reply_v4(buf: &[u8], destination: IpAddr) -> Option<EchoReply> {
    let ip = Ipv4Packet::new(buf)?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    let message = ip.payload();
    let icmp = IcmpPacket::new(message)?;
    match icmp.get_icmp_type() {
        IcmpTypes::EchoReply => echo_fields(message),
        IcmpTypes::TimeExceeded => {
            // 4 unused bytes after the checksum, then the invoking datagram.
            embedded_v4(message.get(ICMP_HEADER_LEN..)?, destination)
        }
        _ => None,
    }
}

/// Parses a message received on a raw ICMPv6 socket (the kernel strips
/// the IPv6 header).
pub fn parse_reply_v6(buf: &[u8], destination: IpAddr) -> Option<EchoReply> {
    let icmp = Icmpv6Packet::new(buf)?;
    match icmp.get_icmpv6_type() {
        Icmpv6Types::EchoReply => echo_fields(buf),
        Icmpv6Types::TimeExceeded => embedded_v6(buf.get(ICMP_HEADER_LEN..)?, destination),
        _ => None,
    }
}

/// The original datagram embedded in a v4 TTL-exceeded diagnostic. Only
/// echo requests we sent toward `destination` count.
fn embedded_v4(buf: &[u8], destination: IpAddr) -> Option<EchoReply> {
    let ip = Ipv4Packet::new(buf)?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return None;
    }
    if IpAddr::V4(ip.get_destination()) != destination {
        return None;
    }
    let message = ip.payload();
    let icmp = IcmpPacket::new(message)?;
    if icmp.get_icmp_type() != IcmpTypes::EchoRequest {
        return None;
    }
    echo_fields(message)
}

/// The original datagram embedded in a v6 time-exceeded diagnostic.
fn embedded_v6(buf: &[u8], destination: IpAddr) -> Option<EchoReply> {
    let ip = Ipv6Packet::new(buf)?;
    if ip.get_next_header() != IpNextHeaderProtocols::Icmpv6 {
        return None;
    }
    if IpAddr::V6(ip.get_destination()) != destination {
        return None;
    }
    let message = ip.payload();
    let icmp = Icmpv6Packet::new(message)?;
    if icmp.get_icmpv6_type() != Icmpv6Types::EchoRequest {
        return None;
    }
    echo_fields(message)
}

/// Identifier and sequence of an echo message: bytes 4..8 of the header
/// for both ICMP and ICMPv6.
fn echo_fields(message: &[u8]) -> Option<EchoReply> {
    if message.len() < ICMP_HEADER_LEN {
        return None;
    }
    Some(EchoReply {
        ident: u16::from_be_bytes([message[4], message[5]]),
        seq: u16::from_be_bytes([message[6], message[7]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::packet::ipv4::MutableIpv4Packet;
    use pnet::packet::ipv6::MutableIpv6Packet;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const IDENT: u16 = 0xabcd;
    const SEQ: u16 = 7;

    fn v4(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn v6(s: &str) -> Ipv6Addr {
        s.parse().unwrap()
    }

    /// Wraps an ICMP message in an IPv4 header the way a raw socket
    /// delivers it.
    fn ipv4_datagram(src: Ipv4Addr, dst: Ipv4Addr, message: &[u8]) -> Vec<u8> {
        let len = 20 + message.len();
        let mut buf = vec![0u8; len];
        {
            let mut ip = MutableIpv4Packet::new(&mut buf).unwrap();
            ip.set_version(4);
            ip.set_header_length(5);
            ip.set_total_length(len as u16);
            ip.set_ttl(64);
            ip.set_next_level_protocol(IpNextHeaderProtocols::Icmp);
            ip.set_source(src);
            ip.set_destination(dst);
        }
        buf[20..].copy_from_slice(message);
        buf
    }

    fn ipv6_datagram(src: Ipv6Addr, dst: Ipv6Addr, message: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; 40 + message.len()];
        {
            let mut ip = MutableIpv6Packet::new(&mut buf).unwrap();
            ip.set_version(6);
            ip.set_payload_length(message.len() as u16);
            ip.set_next_header(IpNextHeaderProtocols::Icmpv6);
            ip.set_hop_limit(64);
            ip.set_source(src);
            ip.set_destination(dst);
        }
        buf[40..].copy_from_slice(message);
        buf
    }

    /// An echo reply shares the echo request layout; only the type
    /// differs.
    fn echo_reply_message(family: Family) -> Vec<u8> {
        let mut message = build_echo_request(family, IDENT, SEQ, 32).unwrap();
        message[0] = match family {
            Family::Ipv4 => 0,
            Family::Ipv6 => 129,
        };
        message
    }

    fn time_exceeded_message(type_value: u8, embedded: &[u8]) -> Vec<u8> {
        let mut message = vec![0u8; ICMP_HEADER_LEN + embedded.len()];
        message[0] = type_value;
        message[ICMP_HEADER_LEN..].copy_from_slice(embedded);
        message
    }

    #[test]
    fn test_build_echo_request_v4() {
        let packet = build_echo_request(Family::Ipv4, IDENT, SEQ, 32).unwrap();
        assert_eq!(packet.len(), ICMP_HEADER_LEN + 32);
        assert_eq!(packet[0], 8); // Echo Request
        assert_eq!(packet[1], 0); // Code
        assert_ne!(u16::from_be_bytes([packet[2], packet[3]]), 0); // checksum
        assert_eq!(u16::from_be_bytes([packet[4], packet[5]]), IDENT);
        assert_eq!(u16::from_be_bytes([packet[6], packet[7]]), SEQ);
    }

    #[test]
    fn test_build_echo_request_v6() {
        let packet = build_echo_request(Family::Ipv6, IDENT, SEQ, 32).unwrap();
        assert_eq!(packet.len(), ICMP_HEADER_LEN + 32);
        assert_eq!(packet[0], 128); // ICMPv6 Echo Request
        assert_eq!(u16::from_be_bytes([packet[4], packet[5]]), IDENT);
    }

    #[test]
    fn test_parse_echo_reply_v4() {
        let dest = v4("203.0.113.9");
        let datagram = ipv4_datagram(dest, v4("10.0.0.5"), &echo_reply_message(Family::Ipv4));

        let reply = parse_reply_v4(&datagram, IpAddr::V4(dest)).unwrap();
        assert_eq!(reply, EchoReply { ident: IDENT, seq: SEQ });
    }

    #[test]
    fn test_parse_time_exceeded_v4() {
        let dest = v4("203.0.113.9");
        let original = build_echo_request(Family::Ipv4, IDENT, SEQ, 32).unwrap();
        let embedded = ipv4_datagram(v4("10.0.0.5"), dest, &original);
        let diagnostic = ipv4_datagram(
            v4("192.0.2.1"),
            v4("10.0.0.5"),
            &time_exceeded_message(11, &embedded),
        );

        let reply = parse_reply_v4(&diagnostic, IpAddr::V4(dest)).unwrap();
        assert_eq!(reply, EchoReply { ident: IDENT, seq: SEQ });
    }

    #[test]
    fn test_time_exceeded_for_other_destination_is_ignored() {
        let original = build_echo_request(Family::Ipv4, IDENT, SEQ, 32).unwrap();
        let embedded = ipv4_datagram(v4("10.0.0.5"), v4("198.51.100.200"), &original);
        let diagnostic = ipv4_datagram(
            v4("192.0.2.1"),
            v4("10.0.0.5"),
            &time_exceeded_message(11, &embedded),
        );

        assert_eq!(
            parse_reply_v4(&diagnostic, IpAddr::V4(v4("203.0.113.9"))),
            None
        );
    }

    #[test]
    fn test_parse_echo_reply_v6() {
        let dest = v6("2001:db8::9");
        let reply = parse_reply_v6(&echo_reply_message(Family::Ipv6), IpAddr::V6(dest)).unwrap();
        assert_eq!(reply, EchoReply { ident: IDENT, seq: SEQ });
    }

    #[test]
    fn test_parse_time_exceeded_v6() {
        let dest = v6("2001:db8::9");
        let original = build_echo_request(Family::Ipv6, IDENT, SEQ, 32).unwrap();
        let embedded = ipv6_datagram(v6("2001:db8::5"), dest, &original);
        let diagnostic = time_exceeded_message(3, &embedded);

        let reply = parse_reply_v6(&diagnostic, IpAddr::V6(dest)).unwrap();
        assert_eq!(reply, EchoReply { ident: IDENT, seq: SEQ });
    }

    #[test]
    fn test_truncated_packets_are_ignored() {
        assert_eq!(parse_reply_v4(&[0u8; 4], IpAddr::V4(v4("203.0.113.9"))), None);
        assert_eq!(parse_reply_v6(&[0u8; 2], IpAddr::V6(v6("2001:db8::9"))), None);
    }

    #[test]
    fn test_non_echo_traffic_is_ignored() {
        let dest = v4("203.0.113.9");
        // Destination unreachable (type 3) carries no echo answer.
        let message = time_exceeded_message(3, &[0u8; 28]);
        let datagram = ipv4_datagram(v4("192.0.2.1"), v4("10.0.0.5"), &message);
        assert_eq!(parse_reply_v4(&datagram, IpAddr::V4(dest)), None);
    }
}
