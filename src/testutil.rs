//! Scripted collaborators for registry/pipeline/discovery tests: a fake
//! host API with programmable listings, log bytes and process tables, and
//! a loopback TCP collector that records every line it receives.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::container::{ContainerDescriptor, ProcessTable};
use crate::error::Error;
use crate::host::{HostApi, LogByteStream};

pub fn descriptor(host: &str, id: &str) -> ContainerDescriptor {
    ContainerDescriptor {
        id: id.to_string(),
        host: host.to_string(),
        name: format!("{id}-name"),
        image: format!("team/{id}:1.0"),
        app: id.to_string(),
        tag: "1.0".to_string(),
        status: "Up 5 minutes".to_string(),
        created: 1_700_000_000,
    }
}

pub fn encode_frame(origin: u8, timestamp: &str, message: &str) -> Vec<u8> {
    let payload = format!("{timestamp} {message}");
    let mut frame = vec![origin, 0, 0, 0];
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload.as_bytes());
    frame
}

#[derive(Default)]
pub struct FakeHost {
    /// host address -> scripted listing (or a malformed-response detail).
    pub listings: Mutex<HashMap<String, Result<Vec<ContainerDescriptor>, String>>>,
    /// container id -> wire bytes its log stream yields before ending.
    pub logs: Mutex<HashMap<String, Vec<u8>>>,
    /// container id -> scripted top table.
    pub tops: Mutex<HashMap<String, ProcessTable>>,
    /// When set, log streams never end after their scripted bytes.
    pub hang_streams: bool,
}

impl FakeHost {
    pub fn list(&self, host: &str, descriptors: Vec<ContainerDescriptor>) {
        self.listings
            .lock()
            .unwrap()
            .insert(host.to_string(), Ok(descriptors));
    }

    pub fn fail_list(&self, host: &str, detail: &str) {
        self.listings
            .lock()
            .unwrap()
            .insert(host.to_string(), Err(detail.to_string()));
    }
}

#[async_trait]
impl HostApi for FakeHost {
    async fn list_containers(&self, host: &str) -> Result<Vec<ContainerDescriptor>, Error> {
        match self.listings.lock().unwrap().get(host) {
            Some(Ok(descriptors)) => Ok(descriptors.clone()),
            Some(Err(detail)) => Err(Error::MalformedResponse {
                host: host.to_string(),
                detail: detail.clone(),
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn top_processes(&self, host: &str, id: &str) -> Result<ProcessTable, Error> {
        self.tops
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::MalformedResponse {
                host: host.to_string(),
                detail: format!("no top table scripted for {id}"),
            })
    }

    async fn open_log_stream(&self, _host: &str, id: &str) -> Result<LogByteStream, Error> {
        let bytes = self.logs.lock().unwrap().get(id).cloned().unwrap_or_default();
        let head = futures::stream::iter(vec![Ok::<Bytes, Error>(Bytes::from(bytes))]);
        if self.hang_streams {
            Ok(Box::pin(head.chain(futures::stream::pending())))
        } else {
            Ok(Box::pin(head))
        }
    }
}

/// Bind a loopback collector and gather every newline-delimited record it
/// receives, across connections, until no new connection arrives for a
/// short idle window.
pub async fn spawn_collector() -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = tokio::spawn(async move {
        let mut lines = Vec::new();
        loop {
            match tokio::time::timeout(Duration::from_millis(500), listener.accept()).await {
                Ok(Ok((mut sock, _))) => {
                    let mut buf = String::new();
                    let _ = sock.read_to_string(&mut buf).await;
                    lines.extend(buf.lines().map(str::to_string));
                }
                _ => break,
            }
        }
        lines
    });
    (addr, handle)
}
