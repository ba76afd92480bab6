use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::traceroute::probe::{HopKind, HopResult};

/// Two hops (by TTL) between which a latency jump was measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HopPair {
    pub from: u8,
    pub to: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatencyJump {
    pub delta: Duration,
    pub hops: HopPair,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatencyReport {
    NoInformation,
    MaximumJump(LatencyJump),
}

impl Display for LatencyReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LatencyReport::NoInformation => {
                write!(f, "No information about maximum response time between consecutive hops!")
            },
            LatencyReport::MaximumJump(LatencyJump { delta, hops }) => {
                write!(
                    f,
                    "Maximum response time between consecutive hops: {:?} <-> Hops: [ {} - {} ]",
                    delta, hops.from, hops.to
                )
            },
        }
    }
}

/// Running latency statistics of a single trace.
///
/// Deltas are taken between consecutive hops that answered, so a silent hop neither
/// contributes a latency nor resets the chain. A jump is always labelled with the hop
/// that measured it and the TTL right before it.
#[derive(Clone, Debug, Default)]
pub struct LatencyTracker {
    last_latency: Option<Duration>,
    max_jump: Option<LatencyJump>,
    relevant_hops: u32,
    new_hops: u32,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the latency of a hop that produced a relevant reply.
    ///
    /// Must be called in increasing `hop` order within a run.
    pub fn update(&mut self, latency: Duration, hop: u8) {
        self.relevant_hops += 1;

        let Some(previous_latency) = self.last_latency.replace(latency) else {
            return;
        };

        let delta = if previous_latency > latency {
            previous_latency - latency
        } else {
            latency - previous_latency
        };
        let is_new_maximum = match self.max_jump {
            None => true,
            Some(max_jump) => delta > max_jump.delta,
        };

        if is_new_maximum {
            self.max_jump = Some(LatencyJump {
                delta,
                hops: HopPair { from: hop.saturating_sub(1), to: hop },
            });
        }
    }

    /// Counts a hop classified as an intermediate router.
    pub fn count_new_hop(&mut self) {
        self.new_hops += 1;
    }

    pub fn observe(&mut self, hop_result: &HopResult) {
        let Some(latency) = hop_result.latency else {
            return;
        };

        match hop_result.kind {
            HopKind::TimeExceeded => {
                self.update(latency, hop_result.ttl);
                self.count_new_hop();
            },
            HopKind::EchoReply => self.update(latency, hop_result.ttl),
            HopKind::NoAnswer => (),
        }
    }

    pub fn report(&self) -> LatencyReport {
        match self.max_jump {
            Some(max_jump) if self.relevant_hops > 1 => LatencyReport::MaximumJump(max_jump),
            _ => LatencyReport::NoInformation,
        }
    }

    /// Number of intermediate routers (time exceeded replies) seen so far.
    pub fn hop_count(&self) -> u32 {
        self.new_hops
    }

    pub fn relevant_hops(&self) -> u32 {
        self.relevant_hops
    }

    pub fn max_jump(&self) -> Option<LatencyJump> {
        self.max_jump
    }
}
