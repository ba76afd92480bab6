use std::net::IpAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use icmp_traceroute::{resolve, FatalProbeError, TracerouteBuilder};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "ICMP traceroute reporting the largest latency jump between hops",
    long_about = None
)]
#[command(name = "traceroute")]
#[command(bin_name = "traceroute")]
struct TracerouteOptions {
    /// Host name or address to trace
    #[arg(short, long, required = true)]
    remote: String,

    /// Local address to send probes from
    #[arg(short, long)]
    local: Option<IpAddr>,

    /// Max TTL (exclusive upper bound on probed hops)
    #[arg(
        short,
        long,
        default_value_t = TracerouteBuilder::DEFAULT_MAX_TTL,
        value_parser = clap::value_parser!(u8).range(1..=255)
    )]
    ttl: u8,

    /// Wait for each reply no more than <TIMEOUT> (seconds, or a duration like 1500ms)
    #[arg(short = 'w', long, value_parser = parse_timeout, default_value = "2")]
    timeout: Duration,

    /// Trace over IPv6
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Log every probe on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let timeout = match value.parse::<u64>() {
        Ok(seconds) => Duration::from_secs(seconds),
        Err(_) => humantime::parse_duration(value).map_err(|error| error.to_string())?,
    };

    if timeout.is_zero() {
        return Err(String::from("timeout must be greater than zero"));
    }

    Ok(timeout)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn trace(options: TracerouteOptions) -> Result<(), FatalProbeError> {
    let remote_address = resolve(&options.remote, options.ipv6).await?;

    let mut builder = TracerouteBuilder::new(options.ipv6)
        .remote_address(remote_address)
        .max_ttl(options.ttl)
        .timeout(options.timeout);
    if let Some(local_address) = options.local {
        builder = builder.local_address(local_address);
    }

    let mut session = builder.build()?;
    session.run().await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let options = TracerouteOptions::parse();
    init_logging(options.verbose);

    match trace(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("traceroute: {error}");
            ExitCode::FAILURE
        }
    }
}
