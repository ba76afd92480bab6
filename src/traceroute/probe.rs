use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use pnet::packet::icmp::IcmpTypes;
use pnet::packet::icmpv6::Icmpv6Types;
use socket2::{Domain, Protocol};

pub use engine::ProbeEngine;
pub use generator::EchoRequestGenerator;
pub use parser::{IcmpReply, IcmpReplyParser};

pub mod engine;
pub mod generator;
pub mod parser;

/// The address family a trace runs over.
///
/// Both families share the same probing loop; they only differ in the ICMP type codes,
/// the name of the IP header field carrying the hop limit and how wide addresses are
/// printed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProbeFamily {
    V4,
    V6,
}

impl ProbeFamily {
    pub fn for_ipv6(ipv6: bool) -> Self {
        if ipv6 {
            ProbeFamily::V6
        } else {
            ProbeFamily::V4
        }
    }

    pub fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => ProbeFamily::V4,
            IpAddr::V6(_) => ProbeFamily::V6,
        }
    }

    pub fn matches(&self, address: &IpAddr) -> bool {
        Self::of(address) == *self
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProbeFamily::V4 => "IPv4",
            ProbeFamily::V6 => "IPv6",
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            ProbeFamily::V4 => "ICMP",
            ProbeFamily::V6 => "ICMP6",
        }
    }

    /// Name of the header field that expires the probe on its way to the target.
    pub fn hop_limit_field(&self) -> &'static str {
        match self {
            ProbeFamily::V4 => "TTL",
            ProbeFamily::V6 => "HopLimit",
        }
    }

    pub fn echo_request_type(&self) -> u8 {
        match self {
            ProbeFamily::V4 => IcmpTypes::EchoRequest.0,
            ProbeFamily::V6 => Icmpv6Types::EchoRequest.0,
        }
    }

    pub fn echo_reply_type(&self) -> u8 {
        match self {
            ProbeFamily::V4 => IcmpTypes::EchoReply.0,
            ProbeFamily::V6 => Icmpv6Types::EchoReply.0,
        }
    }

    pub fn time_exceeded_type(&self) -> u8 {
        match self {
            ProbeFamily::V4 => IcmpTypes::TimeExceeded.0,
            ProbeFamily::V6 => Icmpv6Types::TimeExceeded.0,
        }
    }

    /// Column width used when printing addresses and latencies.
    pub fn display_width(&self) -> usize {
        match self {
            ProbeFamily::V4 => 20,
            ProbeFamily::V6 => 40,
        }
    }

    pub fn unspecified(&self) -> IpAddr {
        match self {
            ProbeFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ProbeFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            ProbeFamily::V4 => Domain::IPV4,
            ProbeFamily::V6 => Domain::IPV6,
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            ProbeFamily::V4 => Protocol::ICMPV4,
            ProbeFamily::V6 => Protocol::ICMPV6,
        }
    }

    pub fn classify(&self, reply: &IcmpReply) -> HopKind {
        if reply.icmp_type == self.time_exceeded_type() {
            HopKind::TimeExceeded
        } else if reply.icmp_type == self.echo_reply_type() {
            HopKind::EchoReply
        } else {
            HopKind::NoAnswer
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HopKind {
    /// An intermediate router dropped the probe.
    TimeExceeded,
    /// The target answered.
    EchoReply,
    /// Nothing relevant came back before the deadline.
    NoAnswer,
}

/// Outcome of the probe sent with a given TTL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HopResult {
    pub ttl: u8,
    pub responder: Option<IpAddr>,
    pub latency: Option<Duration>,
    pub kind: HopKind,
}

impl HopResult {
    pub fn no_answer(ttl: u8) -> Self {
        Self {
            ttl,
            responder: None,
            latency: None,
            kind: HopKind::NoAnswer,
        }
    }

    pub fn reply(ttl: u8, kind: HopKind, responder: IpAddr, latency: Duration) -> Self {
        Self {
            ttl,
            responder: Some(responder),
            latency: Some(latency),
            kind,
        }
    }

    pub fn is_destination(&self) -> bool {
        self.kind == HopKind::EchoReply
    }
}
