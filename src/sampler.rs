use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::broadcast;

use crate::container::ContainerDescriptor;
use crate::error::Error;
use crate::host::HostApi;
use crate::record::TopRecord;
use crate::relay::Relay;

pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(30);

/// Periodically ship a `top` snapshot for every container on every host.
/// Runs next to discovery but shares nothing with it beyond the host
/// client; the registry plays no part here.
pub async fn run(
    client: Arc<dyn HostApi>,
    hosts: Vec<String>,
    relay_addr: String,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
    let mut shutdown_rx = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            _ = interval.tick() => sample_once(&client, &hosts, &relay_addr).await,
            _ = shutdown_rx.recv() => {
                info!("resource sampler stopping");
                return;
            }
        }
    }
}

/// One sampling tick. Every failure is confined to its host or container;
/// the remaining containers are still sampled.
pub async fn sample_once(client: &Arc<dyn HostApi>, hosts: &[String], relay_addr: &str) {
    for host in hosts {
        let descriptors = match client.list_containers(host).await {
            Ok(descriptors) => descriptors,
            Err(err) => {
                warn!("listing containers on {host} for sampling failed: {err}");
                continue;
            }
        };
        for descriptor in descriptors {
            if let Err(err) = sample_container(client, &descriptor, relay_addr).await {
                warn!(
                    "top sample for {} on {host} failed: {err}",
                    descriptor.short_id()
                );
            }
        }
    }
}

/// Fetch one container's process table and ship a record per row over a
/// relay connection held open only for this batch.
async fn sample_container(
    client: &Arc<dyn HostApi>,
    descriptor: &ContainerDescriptor,
    relay_addr: &str,
) -> Result<(), Error> {
    let table = client.top_processes(&descriptor.host, &descriptor.id).await?;
    let mut relay = Relay::connect(relay_addr).await?;
    let time = chrono::Utc::now().timestamp();
    for row in &table.processes {
        let record = TopRecord::from_row(descriptor, &table, row, time);
        relay.send(&record).await?;
    }
    relay.close().await
}
