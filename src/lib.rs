pub use traceroute::async_socket::{AsyncIcmpSocket, ProbeSocket};
pub use traceroute::builder::TracerouteBuilder;
pub use traceroute::error::FatalProbeError;
pub use traceroute::latency::{HopPair, LatencyJump, LatencyReport, LatencyTracker};
pub use traceroute::probe::{HopKind, HopResult, ProbeEngine, ProbeFamily};
pub use traceroute::terminal::TracerouteTerminal;
pub use traceroute::utils::dns::resolve;
pub use traceroute::{SessionConfig, TracerouteSession};

pub mod traceroute;
