use std::io::Write;
use std::net::IpAddr;
use std::time::Duration;

use futures::{pin_mut, StreamExt};
use tracing::debug;

use crate::traceroute::async_socket::{AsyncIcmpSocket, ProbeSocket};
use crate::traceroute::error::FatalProbeError;
use crate::traceroute::latency::{LatencyReport, LatencyTracker};
use crate::traceroute::probe::{ProbeEngine, ProbeFamily};
use crate::traceroute::terminal::TracerouteTerminal;

pub mod async_socket;
pub mod builder;
pub mod error;
pub mod latency;
pub mod probe;
pub mod terminal;
pub mod utils;

/// Parameters of one trace, fixed for its whole lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Address the probe socket binds to; the unspecified address of the family if unset.
    pub local_address: Option<IpAddr>,
    pub remote_address: IpAddr,
    /// Exclusive bound: probes are sent with TTL 1 up to `max_ttl - 1`.
    pub max_ttl: u8,
    pub timeout: Duration,
    pub ipv6: bool,
}

/// One traceroute run towards a single target, plus the latency statistics it gathers.
pub struct TracerouteSession {
    config: SessionConfig,
    local_address: IpAddr,
    latency_tracker: LatencyTracker,
}

impl TracerouteSession {
    pub fn new(config: SessionConfig) -> Self {
        let family = ProbeFamily::for_ipv6(config.ipv6);
        let local_address = config.local_address.unwrap_or_else(|| family.unspecified());

        Self {
            config,
            local_address,
            latency_tracker: LatencyTracker::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn family(&self) -> ProbeFamily {
        ProbeFamily::for_ipv6(self.config.ipv6)
    }

    pub fn local_address(&self) -> IpAddr {
        self.local_address
    }

    /// Traces over a raw ICMP socket, printing every hop and the final report on stdout.
    pub async fn run(&mut self) -> Result<(), FatalProbeError> {
        let family = self.family();
        let mut terminal = TracerouteTerminal::stdout(family);
        terminal
            .print_start(self.config.max_ttl, self.config.timeout)
            .map_err(FatalProbeError::Output)?;

        let socket = AsyncIcmpSocket::new(family).map_err(|source| FatalProbeError::SocketSetup {
            protocol: family.protocol_name(),
            source,
        })?;
        socket
            .bind(self.local_address)
            .map_err(|source| FatalProbeError::SocketBind { addr: self.local_address, source })?;
        debug!(local = %self.local_address, "probe socket ready");

        self.run_with(socket, &mut terminal).await
    }

    /// Traces over `socket`, which is consumed and closed when the run ends.
    ///
    /// The report line follows the hop lines unless the run aborts.
    pub async fn run_with<S: ProbeSocket, W: Write>(
        &mut self,
        socket: S,
        terminal: &mut TracerouteTerminal<W>,
    ) -> Result<(), FatalProbeError> {
        let engine = ProbeEngine::new(
            socket,
            self.family(),
            self.config.remote_address,
            self.config.max_ttl,
            self.config.timeout,
        );

        let trace = engine.trace();
        pin_mut!(trace);

        while let Some(hop_result) = trace.next().await {
            let hop_result = hop_result?;
            terminal.print_hop(&hop_result).map_err(FatalProbeError::Output)?;
            self.latency_tracker.observe(&hop_result);
        }

        terminal.print_report(&self.report()).map_err(FatalProbeError::Output)
    }

    pub fn report(&self) -> LatencyReport {
        self.latency_tracker.report()
    }

    /// Number of intermediate routers that answered during the run.
    pub fn hop_count(&self) -> u32 {
        self.latency_tracker.hop_count()
    }

    pub fn latency_tracker(&self) -> &LatencyTracker {
        &self.latency_tracker
    }
}
