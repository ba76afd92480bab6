use pnet::packet::FromPacket;
use pnet::packet::icmp::{Icmp, IcmpCode, IcmpPacket, IcmpType};
use pnet::packet::icmpv6::{Icmpv6, Icmpv6Code, Icmpv6Packet, Icmpv6Type};
use pnet::packet::ipv4::Ipv4Packet;

use crate::traceroute::utils::bytes::ToBytes;

const IPV4_MIN_HEADER_LENGTH: usize = 20;

/// Returns what follows the IPv4 header, as delivered by raw IPv4 sockets.
pub fn ipv4_payload(data: &[u8]) -> Option<&[u8]> {
    let ipv4_packet = Ipv4Packet::new(data)?;
    let header_length = ipv4_packet.get_header_length() as usize * 4;
    if header_length < IPV4_MIN_HEADER_LENGTH || header_length > data.len() {
        return None;
    }

    Some(&data[header_length..])
}

pub fn build_icmpv4_packet_from_bytes(data: &[u8]) -> Option<Icmp> {
    let icmp_packet = IcmpPacket::new(data)?;
    Some(icmp_packet.from_packet())
}

pub fn build_icmpv6_packet_from_bytes(data: &[u8]) -> Option<Icmpv6> {
    let icmpv6_packet = Icmpv6Packet::new(data)?;
    Some(icmpv6_packet.from_packet())
}

fn echo_payload(id: u16, sqn: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(4);
    payload.extend_from_slice(id.to_be_bytes().as_ref());
    payload.extend_from_slice(sqn.to_be_bytes().as_ref());
    payload
}

pub fn build_icmpv4_echo_request(icmp_type: u8, id: u16, sqn: u16) -> Icmp {
    Icmp {
        icmp_type: IcmpType(icmp_type),
        icmp_code: IcmpCode(0),
        checksum: 0,
        payload: echo_payload(id, sqn),
    }
}

/// The kernel fills in the ICMPv6 checksum on raw ICMPv6 sockets.
pub fn build_icmpv6_echo_request(icmpv6_type: u8, id: u16, sqn: u16) -> Icmpv6 {
    Icmpv6 {
        icmpv6_type: Icmpv6Type(icmpv6_type),
        icmpv6_code: Icmpv6Code(0),
        checksum: 0,
        payload: echo_payload(id, sqn),
    }
}

pub fn icmpv4_checksum(icmp: &Icmp) -> Option<u16> {
    let icmp_bytes = icmp.to_bytes();
    let icmp_packet = IcmpPacket::new(&icmp_bytes)?;
    Some(pnet::packet::icmp::checksum(&icmp_packet))
}
