use std::io;
use std::net::IpAddr;

use thiserror::Error;

/// Conditions that abort a whole trace.
///
/// Silent hops, read errors and unrelated ICMP messages are not errors: they show up
/// as [`HopKind::NoAnswer`](crate::traceroute::probe::HopKind::NoAnswer) hops instead.
#[derive(Error, Debug)]
pub enum FatalProbeError {
    #[error("Could not find an {family} address for {target}")]
    NotFound { target: String, family: &'static str },

    #[error("Could not resolve {target}: {reason}")]
    Lookup { target: String, reason: String },

    #[error("Invalid traceroute configuration: {0}")]
    InvalidConfig(String),

    #[error("Could not set a listening {protocol} socket: {source}")]
    SocketSetup {
        protocol: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Could not bind the probe socket to {addr}: {source}")]
    SocketBind {
        addr: IpAddr,
        #[source]
        source: io::Error,
    },

    #[error("Could not set the {field} field to {ttl}: {source}")]
    HopLimit {
        field: &'static str,
        ttl: u8,
        #[source]
        source: io::Error,
    },

    #[error("Could not serialize the {protocol} echo request (seq {sequence})")]
    Serialize { protocol: &'static str, sequence: u16 },

    #[error("Could not send the {protocol} echo request (ttl {ttl}): {source}")]
    Send {
        protocol: &'static str,
        ttl: u8,
        #[source]
        source: io::Error,
    },

    #[error("Could not parse the {protocol} packet from {from}: {reason}")]
    Parse {
        protocol: &'static str,
        from: IpAddr,
        reason: String,
    },

    #[error("Could not write the trace output: {0}")]
    Output(#[source] io::Error),
}
