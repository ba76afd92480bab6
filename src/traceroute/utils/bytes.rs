use pnet::packet::icmp::Icmp;
use pnet::packet::icmpv6::Icmpv6;

pub trait ToBytes {
    fn to_bytes(&self) -> Vec<u8>;
}

impl ToBytes for Icmp {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::with_capacity(4 + self.payload.len());
        bytes.push(self.icmp_type.0);
        bytes.push(self.icmp_code.0);
        bytes.extend_from_slice(self.checksum.to_be_bytes().as_ref());
        bytes.extend_from_slice(self.payload.as_ref());
        bytes
    }
}

impl ToBytes for Icmpv6 {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::with_capacity(4 + self.payload.len());
        bytes.push(self.icmpv6_type.0);
        bytes.push(self.icmpv6_code.0);
        bytes.extend_from_slice(self.checksum.to_be_bytes().as_ref());
        bytes.extend_from_slice(self.payload.as_ref());
        bytes
    }
}
