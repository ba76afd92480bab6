use std::net::IpAddr;
use std::time::Duration;

use crate::traceroute::error::FatalProbeError;
use crate::traceroute::probe::ProbeFamily;
use crate::traceroute::{SessionConfig, TracerouteSession};

/// Fluent construction of a [`TracerouteSession`] with the usual defaults.
pub struct TracerouteBuilder {
    remote_address: Option<IpAddr>,
    local_address: Option<IpAddr>,
    max_ttl: u8,
    timeout: Duration,
    ipv6: bool,
}

impl TracerouteBuilder {
    pub const DEFAULT_MAX_TTL: u8 = 20;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn ipv4() -> Self {
        Self::new(false)
    }

    pub fn ipv6() -> Self {
        Self::new(true)
    }

    pub fn new(ipv6: bool) -> Self {
        Self {
            remote_address: None,
            local_address: None,
            max_ttl: Self::DEFAULT_MAX_TTL,
            timeout: Self::DEFAULT_TIMEOUT,
            ipv6,
        }
    }

    pub fn remote_address(mut self, ip_addr: IpAddr) -> Self {
        self.remote_address = Some(ip_addr);
        self
    }

    pub fn local_address(mut self, ip_addr: IpAddr) -> Self {
        self.local_address = Some(ip_addr);
        self
    }

    pub fn max_ttl(mut self, max_ttl: u8) -> Self {
        self.max_ttl = max_ttl;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build_config(self) -> Result<SessionConfig, FatalProbeError> {
        let family = ProbeFamily::for_ipv6(self.ipv6);

        let remote_address = self
            .remote_address
            .ok_or_else(|| invalid_config("remote address required"))?;
        if !family.matches(&remote_address) {
            return Err(family_mismatch("remote", remote_address, family));
        }

        if let Some(local_address) = self.local_address {
            if !family.matches(&local_address) {
                return Err(family_mismatch("local", local_address, family));
            }
        }

        if self.max_ttl == 0 {
            return Err(invalid_config("max TTL must be at least 1"));
        }

        if self.timeout.is_zero() {
            return Err(invalid_config("timeout must be greater than zero"));
        }

        Ok(SessionConfig {
            local_address: self.local_address,
            remote_address,
            max_ttl: self.max_ttl,
            timeout: self.timeout,
            ipv6: self.ipv6,
        })
    }

    pub fn build(self) -> Result<TracerouteSession, FatalProbeError> {
        Ok(TracerouteSession::new(self.build_config()?))
    }
}

fn invalid_config(reason: impl Into<String>) -> FatalProbeError {
    FatalProbeError::InvalidConfig(reason.into())
}

fn family_mismatch(role: &str, address: IpAddr, family: ProbeFamily) -> FatalProbeError {
    invalid_config(format!("{role} address {address} is not an {} address", family.name()))
}
