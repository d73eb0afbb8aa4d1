use std::sync::OnceLock;

use clap::Parser;

use crate::relay::RelayPolicy;

const DEFAULT_HOST_PORT: u16 = 2375;

/// Tail the logs of every container on a set of Docker hosts and ship
/// them, plus periodic top samples, to a logstash-style TCP collector.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Docker hosts to watch, comma or whitespace separated. Read from
    /// standard input when omitted.
    #[arg(long)]
    pub hosts: Option<String>,

    /// Collector address as host:port.
    #[arg(long, default_value = "localhost:5000")]
    pub logstash: String,

    /// Whether a collector failure aborts the process or only the
    /// affected pipeline.
    #[arg(long, value_enum, default_value_t = RelayPolicy::Abort)]
    pub on_relay_error: RelayPolicy,
}

static ARGS: OnceLock<Args> = OnceLock::new();

pub fn get_cli_args() -> &'static Args {
    ARGS.get_or_init(Args::parse)
}

/// Host list from the flag, or from piped standard input as a fallback.
pub fn resolve_hosts(args: &Args) -> std::io::Result<Vec<String>> {
    let raw = match &args.hosts {
        Some(hosts) => hosts.clone(),
        None => std::io::read_to_string(std::io::stdin())?,
    };
    Ok(parse_hosts(&raw))
}

/// Split on commas and whitespace, defaulting the Docker API port where an
/// address carries none.
pub fn parse_hosts(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|host| {
            if host.contains(':') {
                host.to_string()
            } else {
                format!("{host}:{DEFAULT_HOST_PORT}")
            }
        })
        .collect()
}
