use crate::traceroute::error::FatalProbeError;
use crate::traceroute::probe::ProbeFamily;
use crate::traceroute::utils;
use crate::traceroute::utils::bytes::ToBytes;
use crate::traceroute::utils::packet_utils::{
    build_icmpv4_echo_request, build_icmpv6_echo_request, icmpv4_checksum,
};

/// Builds the echo requests of one trace: same identifier for every probe, the sequence
/// number tells the probes apart.
#[derive(Clone, Debug)]
pub struct EchoRequestGenerator {
    family: ProbeFamily,
    icmp_id: u16,
}

impl EchoRequestGenerator {
    pub fn new(family: ProbeFamily) -> Self {
        Self::with_identifier(family, utils::generate_u16())
    }

    pub fn with_identifier(family: ProbeFamily, icmp_id: u16) -> Self {
        Self { family, icmp_id }
    }

    pub fn identifier(&self) -> u16 {
        self.icmp_id
    }

    pub fn generate(&self, sqn: u16) -> Result<Vec<u8>, FatalProbeError> {
        let echo_request_type = self.family.echo_request_type();
        match self.family {
            ProbeFamily::V4 => {
                let mut echo_request =
                    build_icmpv4_echo_request(echo_request_type, self.icmp_id, sqn);
                echo_request.checksum =
                    icmpv4_checksum(&echo_request).ok_or(FatalProbeError::Serialize {
                        protocol: self.family.protocol_name(),
                        sequence: sqn,
                    })?;
                Ok(echo_request.to_bytes())
            },
            ProbeFamily::V6 => {
                Ok(build_icmpv6_echo_request(echo_request_type, self.icmp_id, sqn).to_bytes())
            },
        }
    }
}
