use std::net::IpAddr;
use std::str::FromStr;

use domain::base::name::Name;
use domain::resolv::StubResolver;
use tracing::{debug, info};

use crate::traceroute::error::FatalProbeError;
use crate::traceroute::probe::ProbeFamily;

/// Picks the address to trace for `target`.
///
/// A literal address of the wanted family is used as is; anything else goes through a
/// forward lookup and the first address of the wanted family wins.
pub async fn resolve(target: &str, want_ipv6: bool) -> Result<IpAddr, FatalProbeError> {
    let family = ProbeFamily::for_ipv6(want_ipv6);

    if let Ok(ip_addr) = IpAddr::from_str(target) {
        if !family.matches(&ip_addr) {
            return Err(not_found(target, family));
        }

        info!("Using the provided {} address {ip_addr} for tracing", family.name().to_lowercase());
        return Ok(ip_addr);
    }

    let candidates = nslookup(target).await?;
    let ip_addr = select_address(target, &candidates, family)?;
    info!(
        "{target} resolved to {ip_addr}, using this {} address for tracing",
        family.name().to_lowercase()
    );
    Ok(ip_addr)
}

/// First candidate of `family`, in the order the lookup returned them.
pub fn select_address(
    target: &str,
    candidates: &[IpAddr],
    family: ProbeFamily,
) -> Result<IpAddr, FatalProbeError> {
    candidates
        .iter()
        .find(|candidate| family.matches(candidate))
        .copied()
        .ok_or_else(|| not_found(target, family))
}

pub async fn nslookup(hostname: &str) -> Result<Vec<IpAddr>, FatalProbeError> {
    let qname = Name::<Vec<u8>>::from_str(hostname)
        .map_err(|error| lookup_error(hostname, error))?;

    let resolver = StubResolver::new();
    let found_addrs = resolver
        .lookup_host(qname)
        .await
        .map_err(|error| lookup_error(hostname, error))?;

    let addrs: Vec<IpAddr> = found_addrs.iter().collect();
    debug!(hostname, addrs = ?addrs, "forward lookup finished");
    Ok(addrs)
}

fn not_found(target: &str, family: ProbeFamily) -> FatalProbeError {
    FatalProbeError::NotFound {
        target: target.to_string(),
        family: family.name(),
    }
}

fn lookup_error(target: &str, error: impl ToString) -> FatalProbeError {
    FatalProbeError::Lookup {
        target: target.to_string(),
        reason: error.to_string(),
    }
}
