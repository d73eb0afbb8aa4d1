use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

use crate::error::Error;
use crate::host::HostApi;
use crate::pipeline;
use crate::registry::Registry;
use crate::relay::RelayPolicy;

pub const DISCOVERY_INTERVAL: Duration = Duration::from_secs(2);

/// Poll every host on a fixed interval and start a pipeline for each
/// container that is not in the registry yet. Containers that vanish from a
/// listing are left alone; only their own stream end removes them, so a
/// transient listing gap never drops a healthy tail.
pub async fn run(
    client: Arc<dyn HostApi>,
    hosts: Vec<String>,
    registry: Arc<Registry>,
    relay_addr: String,
    policy: RelayPolicy,
    fatal_tx: mpsc::Sender<Error>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let mut interval = tokio::time::interval(DISCOVERY_INTERVAL);
    let mut shutdown_rx = shutdown_tx.subscribe();
    loop {
        tokio::select! {
            _ = interval.tick() => {
                discover_once(
                    &client,
                    &hosts,
                    &registry,
                    &relay_addr,
                    policy,
                    &fatal_tx,
                    &shutdown_tx,
                )
                .await;
            }
            _ = shutdown_rx.recv() => {
                info!("discovery loop stopping");
                return;
            }
        }
    }
}

/// One discovery tick. Hosts are listed concurrently and a failure on one
/// never blocks the others; partial results are fine.
pub async fn discover_once(
    client: &Arc<dyn HostApi>,
    hosts: &[String],
    registry: &Arc<Registry>,
    relay_addr: &str,
    policy: RelayPolicy,
    fatal_tx: &mpsc::Sender<Error>,
    shutdown_tx: &broadcast::Sender<()>,
) {
    let mut listings = JoinSet::new();
    for host in hosts {
        let client = Arc::clone(client);
        let host = host.clone();
        listings.spawn(async move {
            let result = client.list_containers(&host).await;
            (host, result)
        });
    }

    while let Some(joined) = listings.join_next().await {
        match joined {
            Ok((_, Ok(descriptors))) => {
                for descriptor in descriptors {
                    if !registry.try_insert(&descriptor.id) {
                        continue;
                    }
                    debug!(
                        "discovered {} ({}) on {}",
                        descriptor.short_id(),
                        descriptor.name,
                        descriptor.host
                    );
                    // Fire and forget; the pipeline reports through its
                    // registry phase from here on.
                    tokio::spawn(pipeline::run(
                        Arc::clone(client),
                        descriptor,
                        relay_addr.to_string(),
                        Arc::clone(registry),
                        policy,
                        fatal_tx.clone(),
                        shutdown_tx.subscribe(),
                    ));
                }
            }
            Ok((host, Err(err))) => warn!("listing containers on {host} failed: {err}"),
            Err(err) => error!("listing task panicked: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Phase;
    use crate::testutil::{descriptor, spawn_collector, FakeHost};

    struct Tick {
        fake: Arc<FakeHost>,
        client: Arc<dyn HostApi>,
        registry: Arc<Registry>,
        relay_addr: String,
        fatal_tx: mpsc::Sender<Error>,
        _fatal_rx: mpsc::Receiver<Error>,
        shutdown_tx: broadcast::Sender<()>,
    }

    impl Tick {
        async fn new() -> Self {
            let fake = Arc::new(FakeHost {
                hang_streams: true,
                ..Default::default()
            });
            let client: Arc<dyn HostApi> = Arc::clone(&fake) as Arc<dyn HostApi>;
            let (addr, _collector) = spawn_collector().await;
            let (fatal_tx, _fatal_rx) = mpsc::channel(1);
            let (shutdown_tx, _) = broadcast::channel(1);
            Self {
                fake,
                client,
                registry: Arc::new(Registry::new()),
                relay_addr: addr,
                fatal_tx,
                _fatal_rx,
                shutdown_tx,
            }
        }

        async fn run(&self, hosts: &[&str]) {
            let hosts: Vec<String> = hosts.iter().map(|h| h.to_string()).collect();
            discover_once(
                &self.client,
                &hosts,
                &self.registry,
                &self.relay_addr,
                RelayPolicy::Continue,
                &self.fatal_tx,
                &self.shutdown_tx,
            )
            .await;
            // Let the spawned pipelines reach their steady state.
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test]
    async fn test_two_host_discovery_is_incremental() {
        let tick = Tick::new().await;
        tick.fake.list("hostA:2375", vec![descriptor("hostA:2375", "c1")]);
        tick.fake.list("hostB:2375", vec![]);

        tick.run(&["hostA:2375", "hostB:2375"]).await;
        assert!(tick.registry.contains("c1"));
        assert_eq!(tick.registry.len(), 1);
        assert_eq!(tick.registry.phase("c1"), Some(Phase::Relaying));

        // hostB catches up without disturbing c1's pipeline.
        tick.fake.list("hostB:2375", vec![descriptor("hostB:2375", "c2")]);
        tick.run(&["hostA:2375", "hostB:2375"]).await;
        assert_eq!(tick.registry.len(), 2);
        assert_eq!(tick.registry.phase("c1"), Some(Phase::Relaying));
        assert_eq!(tick.registry.phase("c2"), Some(Phase::Relaying));
    }

    #[tokio::test]
    async fn test_repeat_listing_creates_no_duplicates() {
        let tick = Tick::new().await;
        tick.fake.list("hostA:2375", vec![descriptor("hostA:2375", "c1")]);

        tick.run(&["hostA:2375"]).await;
        tick.run(&["hostA:2375"]).await;
        assert_eq!(tick.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_host_does_not_block_healthy_host() {
        let tick = Tick::new().await;
        tick.fake.fail_list("hostA:2375", "body was not an array");
        tick.fake.list("hostB:2375", vec![descriptor("hostB:2375", "c2")]);

        tick.run(&["hostA:2375", "hostB:2375"]).await;
        assert!(tick.registry.contains("c2"));
        assert_eq!(tick.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_clean_end_allows_rediscovery() {
        // Streams end right after their scripted bytes here, so each tick's
        // pipeline runs to completion and deregisters itself.
        let fake = Arc::new(FakeHost::default());
        fake.list("hostA:2375", vec![descriptor("hostA:2375", "c1")]);
        fake.logs.lock().unwrap().insert(
            "c1".into(),
            crate::testutil::encode_frame(1, "2024-01-01T00:00:00Z", "hello\n"),
        );
        let client: Arc<dyn HostApi> = Arc::clone(&fake) as Arc<dyn HostApi>;
        let registry = Arc::new(Registry::new());
        let (addr, collector) = spawn_collector().await;
        let (fatal_tx, _fatal_rx) = mpsc::channel(1);
        let (shutdown_tx, _) = broadcast::channel(1);
        let hosts = vec!["hostA:2375".to_string()];

        for _ in 0..2 {
            discover_once(
                &client,
                &hosts,
                &registry,
                &addr,
                RelayPolicy::Continue,
                &fatal_tx,
                &shutdown_tx,
            )
            .await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            // The pipeline ran to its clean end and left no stale entry.
            assert!(!registry.contains("c1"));
        }

        // Both ticks produced a fresh pipeline and a fresh relay connection.
        let lines = collector.await.unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_absent_container_is_not_torn_down() {
        let tick = Tick::new().await;
        tick.fake.list("hostA:2375", vec![descriptor("hostA:2375", "c1")]);
        tick.run(&["hostA:2375"]).await;

        tick.fake.list("hostA:2375", vec![]);
        tick.run(&["hostA:2375"]).await;
        assert!(tick.registry.contains("c1"));
    }
}
