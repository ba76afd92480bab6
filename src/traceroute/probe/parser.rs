use crate::traceroute::probe::{HopKind, ProbeFamily};
use crate::traceroute::utils::packet_utils;

/// Type and code of an ICMP message received on the probe socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IcmpReply {
    pub icmp_type: u8,
    pub icmp_code: u8,
}

/// Decodes what a raw probe socket hands back.
///
/// Raw IPv4 sockets deliver the IP header in front of the ICMP message, raw ICMPv6
/// sockets only the ICMPv6 message.
#[derive(Clone, Copy, Debug)]
pub struct IcmpReplyParser {
    family: ProbeFamily,
}

impl IcmpReplyParser {
    pub fn new(family: ProbeFamily) -> Self {
        Self { family }
    }

    pub fn parse(&self, data: &[u8]) -> Result<IcmpReply, String> {
        match self.family {
            ProbeFamily::V4 => {
                let icmp_bytes = packet_utils::ipv4_payload(data)
                    .ok_or_else(|| format!("truncated IPv4 header ({} bytes)", data.len()))?;
                let icmp_packet = packet_utils::build_icmpv4_packet_from_bytes(icmp_bytes)
                    .ok_or_else(|| format!("truncated ICMP message ({} bytes)", icmp_bytes.len()))?;
                Ok(IcmpReply {
                    icmp_type: icmp_packet.icmp_type.0,
                    icmp_code: icmp_packet.icmp_code.0,
                })
            },
            ProbeFamily::V6 => {
                let icmpv6_packet = packet_utils::build_icmpv6_packet_from_bytes(data)
                    .ok_or_else(|| format!("truncated ICMP6 message ({} bytes)", data.len()))?;
                Ok(IcmpReply {
                    icmp_type: icmpv6_packet.icmpv6_type.0,
                    icmp_code: icmpv6_packet.icmpv6_code.0,
                })
            },
        }
    }

    pub fn classify(&self, reply: &IcmpReply) -> HopKind {
        self.family.classify(reply)
    }
}
