use std::fmt::{Display, Formatter};
use std::io;
use std::io::{Stdout, Write};
use std::time::Duration;

use crate::traceroute::latency::LatencyReport;
use crate::traceroute::probe::{HopResult, ProbeFamily};

/// A hop line, padded to the column width of its address family.
pub struct DisplayableHop<'a> {
    hop_result: &'a HopResult,
    width: usize,
}

impl<'a> DisplayableHop<'a> {
    pub fn new(hop_result: &'a HopResult, family: ProbeFamily) -> Self {
        Self {
            hop_result,
            width: family.display_width(),
        }
    }
}

impl Display for DisplayableHop<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ttl = self.hop_result.ttl;
        let width = self.width;
        match (self.hop_result.responder, self.hop_result.latency) {
            (Some(responder), Some(latency)) => {
                let responder = responder.to_string();
                let latency = format!("{latency:?}");
                write!(f, "{ttl}   {responder:>width$}   {latency:>width$}")
            },
            _ => write!(f, "{ttl} {:>width$}", "*"),
        }
    }
}

pub struct TracerouteTerminal<W: Write> {
    out: W,
    family: ProbeFamily,
}

impl TracerouteTerminal<Stdout> {
    pub fn stdout(family: ProbeFamily) -> Self {
        Self::new(io::stdout(), family)
    }
}

impl<W: Write> TracerouteTerminal<W> {
    pub fn new(out: W, family: ProbeFamily) -> Self {
        Self { out, family }
    }

    pub fn print_start(&mut self, max_ttl: u8, timeout: Duration) -> io::Result<()> {
        writeln!(
            self.out,
            "Starting {} tracing (TTL: {max_ttl}, Timeout: {})",
            self.family.name(),
            humantime::format_duration(timeout)
        )
    }

    pub fn print_hop(&mut self, hop_result: &HopResult) -> io::Result<()> {
        writeln!(self.out, "{}", DisplayableHop::new(hop_result, self.family))?;
        self.out.flush()
    }

    pub fn print_report(&mut self, report: &LatencyReport) -> io::Result<()> {
        writeln!(self.out, "{report}")
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
