use std::net::IpAddr;
use std::time::Duration;

use async_stream::try_stream;
use futures::Stream;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::traceroute::async_socket::ProbeSocket;
use crate::traceroute::error::FatalProbeError;
use crate::traceroute::probe::{
    EchoRequestGenerator, HopKind, HopResult, IcmpReplyParser, ProbeFamily,
};

/// Sends one echo request per TTL, from 1 up to (excluding) `max_ttl`, and stops early
/// once the target itself answers.
pub struct ProbeEngine<S: ProbeSocket> {
    socket: S,
    family: ProbeFamily,
    destination_address: IpAddr,
    max_ttl: u8,
    timeout: Duration,
    generator: EchoRequestGenerator,
    parser: IcmpReplyParser,
    buffer: Vec<u8>,
}

impl<S: ProbeSocket> ProbeEngine<S> {
    /// Large enough for any reply on a common Ethernet link.
    pub const BUFFER_SIZE: usize = 1500;

    pub fn new(
        socket: S,
        family: ProbeFamily,
        destination_address: IpAddr,
        max_ttl: u8,
        timeout: Duration,
    ) -> Self {
        Self {
            socket,
            family,
            destination_address,
            max_ttl,
            timeout,
            generator: EchoRequestGenerator::new(family),
            parser: IcmpReplyParser::new(family),
            buffer: vec![0u8; Self::BUFFER_SIZE],
        }
    }

    pub fn with_generator(mut self, generator: EchoRequestGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn family(&self) -> ProbeFamily {
        self.family
    }

    /// Runs the whole trace, yielding one [`HopResult`] per TTL tried.
    ///
    /// The socket is owned by the returned stream and closed when the stream ends or is
    /// dropped.
    pub fn trace(mut self) -> impl Stream<Item = Result<HopResult, FatalProbeError>> {
        try_stream! {
            for ttl in 1..self.max_ttl {
                let hop_result = self.probe(ttl).await?;
                let is_destination = hop_result.is_destination();

                yield hop_result;

                if is_destination {
                    break;
                }
            }
        }
    }

    pub async fn probe(&mut self, ttl: u8) -> Result<HopResult, FatalProbeError> {
        let protocol = self.family.protocol_name();
        let echo_request = self.generator.generate(u16::from(ttl))?;

        self.socket
            .set_hop_limit(ttl)
            .map_err(|source| FatalProbeError::HopLimit {
                field: self.family.hop_limit_field(),
                ttl,
                source,
            })?;

        let sent_at = Instant::now();
        self.socket
            .send_to(&echo_request, self.destination_address)
            .await
            .map_err(|source| FatalProbeError::Send { protocol, ttl, source })?;
        debug!(
            ttl,
            id = self.generator.identifier(),
            destination = %self.destination_address,
            "echo request sent"
        );

        let deadline = sent_at + self.timeout;
        let (size, from) = match self.socket.recv_from(&mut self.buffer, deadline).await {
            Ok(received) => received,
            Err(error) => {
                debug!(ttl, %error, "no answer");
                return Ok(HopResult::no_answer(ttl));
            },
        };

        let latency = sent_at.elapsed();
        trace!(ttl, size, %from, "{protocol} packet received");

        let reply = self
            .parser
            .parse(&self.buffer[..size])
            .map_err(|reason| FatalProbeError::Parse { protocol, from, reason })?;

        match self.parser.classify(&reply) {
            HopKind::NoAnswer => {
                debug!(
                    ttl,
                    %from,
                    icmp_type = reply.icmp_type,
                    icmp_code = reply.icmp_code,
                    "ignoring unrelated {protocol} message"
                );
                Ok(HopResult::no_answer(ttl))
            },
            kind => {
                debug!(ttl, %from, ?latency, ?kind, "hop answered");
                Ok(HopResult::reply(ttl, kind, from, latency))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::StreamExt;

    use super::*;

    enum Scripted {
        Answer { from: IpAddr, icmp_type: u8, latency: Duration },
        Silence,
        Raw { from: IpAddr, data: Vec<u8> },
    }

    #[derive(Default)]
    struct SocketLog {
        hop_limits: Vec<u8>,
        sent: Vec<Vec<u8>>,
        reads: usize,
        closed: bool,
    }

    struct FakeSocket {
        family: ProbeFamily,
        script: VecDeque<Scripted>,
        log: Arc<Mutex<SocketLog>>,
        fail_send: bool,
        fail_hop_limit: bool,
    }

    impl FakeSocket {
        fn new(family: ProbeFamily, script: Vec<Scripted>) -> (Self, Arc<Mutex<SocketLog>>) {
            let log = Arc::new(Mutex::new(SocketLog::default()));
            let socket = Self {
                family,
                script: script.into(),
                log: log.clone(),
                fail_send: false,
                fail_hop_limit: false,
            };
            (socket, log)
        }

        fn packet(&self, icmp_type: u8) -> Vec<u8> {
            let icmp = [icmp_type, 0, 0, 0, 0, 0, 0, 0];
            match self.family {
                ProbeFamily::V4 => {
                    let mut data = vec![
                        0x45, 0, 0, 28, 0, 0, 0, 0, 64, 1, 0, 0, 10, 0, 0, 1, 10, 0, 0, 2,
                    ];
                    data.extend_from_slice(&icmp);
                    data
                },
                ProbeFamily::V6 => icmp.to_vec(),
            }
        }
    }

    #[async_trait]
    impl ProbeSocket for FakeSocket {
        fn set_hop_limit(&mut self, hop_limit: u8) -> io::Result<()> {
            if self.fail_hop_limit {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "option refused"));
            }
            self.log.lock().unwrap().hop_limits.push(hop_limit);
            Ok(())
        }

        async fn send_to(&mut self, buf: &[u8], _destination: IpAddr) -> io::Result<usize> {
            if self.fail_send {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "send refused"));
            }
            self.log.lock().unwrap().sent.push(buf.to_vec());
            Ok(buf.len())
        }

        async fn recv_from(
            &mut self,
            buf: &mut [u8],
            deadline: Instant,
        ) -> io::Result<(usize, IpAddr)> {
            self.log.lock().unwrap().reads += 1;
            let (from, data) = match self.script.pop_front() {
                Some(Scripted::Answer { from, icmp_type, latency }) => {
                    tokio::time::advance(latency).await;
                    (from, self.packet(icmp_type))
                },
                Some(Scripted::Raw { from, data }) => (from, data),
                Some(Scripted::Silence) | None => {
                    tokio::time::advance(deadline.saturating_duration_since(Instant::now())).await;
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "silent hop"));
                },
            };

            buf[..data.len()].copy_from_slice(&data);
            Ok((data.len(), from))
        }
    }

    impl Drop for FakeSocket {
        fn drop(&mut self) {
            self.log.lock().unwrap().closed = true;
        }
    }

    fn router(last_octet: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last_octet])
    }

    fn answer(last_octet: u8, icmp_type: u8, millis: u64) -> Scripted {
        Scripted::Answer {
            from: router(last_octet),
            icmp_type,
            latency: Duration::from_millis(millis),
        }
    }

    fn engine(socket: FakeSocket, max_ttl: u8) -> ProbeEngine<FakeSocket> {
        let family = socket.family;
        let destination = match family {
            ProbeFamily::V4 => router(99),
            ProbeFamily::V6 => "2001:db8::99".parse().unwrap(),
        };
        ProbeEngine::new(socket, family, destination, max_ttl, Duration::from_secs(2))
            .with_generator(EchoRequestGenerator::with_identifier(family, 0x4242))
    }

    async fn run(engine: ProbeEngine<FakeSocket>) -> Vec<Result<HopResult, FatalProbeError>> {
        engine.trace().collect().await
    }

    async fn hops(engine: ProbeEngine<FakeSocket>) -> Vec<HopResult> {
        run(engine).await.into_iter().map(Result::unwrap).collect()
    }

    fn reply(ttl: u8, kind: HopKind, last_octet: u8, millis: u64) -> HopResult {
        HopResult::reply(ttl, kind, router(last_octet), Duration::from_millis(millis))
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_echo_reply() {
        let (socket, log) = FakeSocket::new(ProbeFamily::V4, vec![
            answer(1, 11, 10),
            answer(2, 11, 12),
            answer(99, 0, 11),
            answer(4, 11, 1),
        ]);

        let hops = hops(engine(socket, 20)).await;

        assert_eq!(hops.len(), 3);
        assert_eq!(hops[0], reply(1, HopKind::TimeExceeded, 1, 10));
        assert_eq!(hops[1], reply(2, HopKind::TimeExceeded, 2, 12));
        assert_eq!(hops[2], reply(3, HopKind::EchoReply, 99, 11));
        let log = log.lock().unwrap();
        assert_eq!(log.hop_limits, vec![1, 2, 3]);
        assert!(log.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn probes_until_max_ttl_exclusive() {
        let (socket, log) = FakeSocket::new(ProbeFamily::V4, vec![]);
        let started = Instant::now();

        let hops = hops(engine(socket, 5)).await;

        assert_eq!(hops.iter().map(|hop| hop.ttl).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(hops.iter().all(|hop| *hop == HopResult::no_answer(hop.ttl)));
        assert_eq!(started.elapsed(), Duration::from_secs(8));
        let log = log.lock().unwrap();
        assert_eq!(log.reads, 4);
        assert!(log.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn max_ttl_of_one_sends_nothing() {
        let (socket, log) = FakeSocket::new(ProbeFamily::V4, vec![answer(1, 0, 5)]);

        assert!(run(engine(socket, 1)).await.is_empty());

        let log = log.lock().unwrap();
        assert!(log.sent.is_empty());
        assert!(log.hop_limits.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_hop_then_destination() {
        let script = vec![Scripted::Silence, answer(99, 0, 8)];
        let (socket, _log) = FakeSocket::new(ProbeFamily::V4, script);

        let hops = hops(engine(socket, 20)).await;

        assert_eq!(hops, vec![
            HopResult::no_answer(1),
            reply(2, HopKind::EchoReply, 99, 8),
        ]);
    }

    #[tokio::test(start_paused = true)]
    async fn unrelated_icmp_type_is_no_answer() {
        let script = vec![answer(1, 3, 4), answer(2, 11, 6)];
        let (socket, _log) = FakeSocket::new(ProbeFamily::V4, script);

        let hops = hops(engine(socket, 3)).await;

        assert_eq!(hops[0], HopResult::no_answer(1));
        assert_eq!(hops[1].kind, HopKind::TimeExceeded);
    }

    #[tokio::test(start_paused = true)]
    async fn echo_requests_carry_identifier_and_ttl_sequence() {
        let script = vec![answer(1, 3, 2), answer(2, 129, 3)];
        let (socket, log) = FakeSocket::new(ProbeFamily::V6, script);

        let hops = hops(engine(socket, 10)).await;
        assert_eq!(hops.len(), 2);
        assert_eq!(hops[0].kind, HopKind::TimeExceeded);
        assert_eq!(hops[1].kind, HopKind::EchoReply);

        let log = log.lock().unwrap();
        assert_eq!(log.sent, vec![
            vec![128, 0, 0, 0, 0x42, 0x42, 0, 1],
            vec![128, 0, 0, 0, 0x42, 0x42, 0, 2],
        ]);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_reply_is_fatal() {
        let (socket, log) = FakeSocket::new(ProbeFamily::V4, vec![
            answer(1, 11, 3),
            Scripted::Raw { from: router(2), data: vec![0x45, 0, 0] },
            answer(3, 11, 3),
        ]);

        let results = run(engine(socket, 10)).await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        match &results[1] {
            Err(FatalProbeError::Parse { from, .. }) => assert_eq!(*from, router(2)),
            other => panic!("expected a parse error, got {other:?}"),
        }
        assert!(log.lock().unwrap().closed);
    }

    #[tokio::test(start_paused = true)]
    async fn send_failure_is_fatal() {
        let (mut socket, log) = FakeSocket::new(ProbeFamily::V4, vec![answer(1, 11, 3)]);
        socket.fail_send = true;

        let results = run(engine(socket, 10)).await;

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(FatalProbeError::Send { ttl: 1, .. })));
        let log = log.lock().unwrap();
        assert_eq!(log.reads, 0);
        assert!(log.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn hop_limit_failure_is_fatal() {
        let (mut socket, log) = FakeSocket::new(ProbeFamily::V6, vec![answer(1, 3, 2)]);
        socket.fail_hop_limit = true;

        let results = run(engine(socket, 10)).await;

        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(FatalProbeError::HopLimit { field: "HopLimit", ttl: 1, .. })
        ));
        let log = log.lock().unwrap();
        assert!(log.sent.is_empty());
        assert!(log.closed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_trace_early_closes_the_socket() {
        let script = vec![answer(1, 11, 3), answer(2, 11, 4)];
        let (socket, log) = FakeSocket::new(ProbeFamily::V4, script);

        let mut trace = Box::pin(engine(socket, 10).trace());
        assert!(trace.next().await.is_some());
        assert!(!log.lock().unwrap().closed);

        drop(trace);
        assert!(log.lock().unwrap().closed);
    }

    #[tokio::test(start_paused = true)]
    async fn same_script_same_trace() {
        let script = || {
            vec![answer(1, 11, 10), Scripted::Silence, answer(3, 11, 25), answer(99, 0, 30)]
        };

        let (first_socket, _) = FakeSocket::new(ProbeFamily::V4, script());
        let (second_socket, _) = FakeSocket::new(ProbeFamily::V4, script());

        assert_eq!(hops(engine(first_socket, 20)).await, hops(engine(second_socket, 20)).await);
    }
}
