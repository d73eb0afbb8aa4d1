use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::CommandFactory;
use log::{error, info};
use tokio::sync::{broadcast, mpsc};

mod cli;
mod container;
mod decode;
mod discovery;
mod error;
mod host;
mod pipeline;
mod record;
mod registry;
mod relay;
mod sampler;
#[cfg(test)]
mod testutil;

/// How long a Ctrl-C waits for pipelines to close their relay connections.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args = cli::get_cli_args();
    let hosts = match cli::resolve_hosts(args) {
        Ok(hosts) if !hosts.is_empty() => hosts,
        Ok(_) => {
            let _ = cli::Args::command().print_help();
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("Unable to read hosts from stdin: {err}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "watching {} host(s), relaying to {}",
        hosts.len(),
        args.logstash
    );

    let registry = Arc::new(registry::Registry::new());
    let client: Arc<dyn host::HostApi> = Arc::new(host::DockerHostClient::new());
    let (fatal_tx, mut fatal_rx) = mpsc::channel(1);
    let (shutdown_tx, _) = broadcast::channel(1);

    tokio::spawn(discovery::run(
        Arc::clone(&client),
        hosts.clone(),
        Arc::clone(&registry),
        args.logstash.clone(),
        args.on_relay_error,
        fatal_tx,
        shutdown_tx.clone(),
    ));
    tokio::spawn(sampler::run(
        Arc::clone(&client),
        hosts,
        args.logstash.clone(),
        shutdown_tx.clone(),
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, closing pipelines");
            let _ = shutdown_tx.send(());
            drain(&registry).await;
            ExitCode::SUCCESS
        }
        Some(err) = fatal_rx.recv() => {
            error!("collector connection lost, aborting: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Wait, bounded, for every pipeline to deregister itself.
async fn drain(registry: &registry::Registry) {
    let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
    while !registry.is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
