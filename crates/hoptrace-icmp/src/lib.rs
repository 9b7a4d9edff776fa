//! ICMP echo probing over raw sockets.

mod packet;
mod prober;

pub use packet::{build_echo_request, parse_reply_v4, parse_reply_v6, EchoReply};
pub use prober::IcmpProber;
