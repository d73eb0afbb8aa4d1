use std::sync::Arc;

use futures_util::StreamExt;
use log::{error, info, warn};
use tokio::sync::{broadcast, mpsc};

use crate::container::ContainerDescriptor;
use crate::decode::FrameDecoder;
use crate::error::Error;
use crate::host::HostApi;
use crate::record::LogRecord;
use crate::registry::{Phase, Registry};
use crate::relay::{Relay, RelayPolicy};

/// Drive one container's pipeline from `starting` to a terminal phase.
///
/// The caller has already claimed the container id in the registry; this
/// task owns the entry from here on and removes it on its way out. A clean
/// stream end closes the relay first so buffered records reach the
/// collector; a transport error on either side tears down immediately.
pub async fn run(
    client: Arc<dyn HostApi>,
    descriptor: ContainerDescriptor,
    relay_addr: String,
    registry: Arc<Registry>,
    policy: RelayPolicy,
    fatal_tx: mpsc::Sender<Error>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let id = descriptor.id.clone();

    // No ordering requirement between the two opens.
    let (stream, relay) = tokio::join!(
        client.open_log_stream(&descriptor.host, &descriptor.id),
        Relay::connect(&relay_addr),
    );
    let mut stream = match stream {
        Ok(stream) => stream,
        Err(err) => {
            warn!(
                "could not open log stream for {} on {}: {err}",
                descriptor.short_id(),
                descriptor.host
            );
            registry.remove(&id);
            return;
        }
    };
    let mut relay = match relay {
        Ok(relay) => relay,
        Err(err) => {
            error!(
                "could not reach collector for {} on {}: {err}",
                descriptor.short_id(),
                descriptor.host
            );
            registry.set_phase(&id, Phase::Failed);
            escalate(policy, &fatal_tx, err);
            registry.remove(&id);
            return;
        }
    };

    registry.set_phase(&id, Phase::Relaying);
    info!(
        "relaying logs for {} ({}) on {}",
        descriptor.short_id(),
        descriptor.name,
        descriptor.host
    );

    let mut decoder = FrameDecoder::new();
    loop {
        tokio::select! {
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    for frame in decoder.feed(&bytes) {
                        let record = LogRecord::new(&descriptor, frame);
                        if let Err(err) = relay.send(&record).await {
                            error!(
                                "relay write failed for {} on {}: {err}",
                                descriptor.short_id(),
                                descriptor.host
                            );
                            registry.set_phase(&id, Phase::Failed);
                            escalate(policy, &fatal_tx, err);
                            registry.remove(&id);
                            return;
                        }
                    }
                }
                Some(Err(err)) => {
                    error!(
                        "log stream failed for {} on {}: {err}",
                        descriptor.short_id(),
                        descriptor.host
                    );
                    // The read side is already unusable; drop the relay
                    // without waiting on further I/O.
                    registry.set_phase(&id, Phase::Failed);
                    registry.remove(&id);
                    return;
                }
                None => {
                    info!(
                        "log stream ended for {} on {}",
                        descriptor.short_id(),
                        descriptor.host
                    );
                    registry.set_phase(&id, Phase::Ended);
                    if let Err(err) = relay.close().await {
                        warn!("relay close for {} failed: {err}", descriptor.short_id());
                    }
                    registry.remove(&id);
                    return;
                }
            },
            _ = shutdown.recv() => {
                if let Err(err) = relay.close().await {
                    warn!("relay close for {} failed: {err}", descriptor.short_id());
                }
                registry.remove(&id);
                return;
            }
        }
    }
}

fn escalate(policy: RelayPolicy, fatal_tx: &mpsc::Sender<Error>, err: Error) {
    if policy == RelayPolicy::Abort {
        // Channel full means a fatal error is already on its way to main.
        let _ = fatal_tx.try_send(err);
    }
}
