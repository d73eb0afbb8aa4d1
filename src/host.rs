use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};

use crate::container::{ContainerDescriptor, ContainerSummary, ProcessTable};
use crate::error::Error;

/// A live log byte stream for one container. Long-lived: it only ends when
/// the container stops or the connection drops.
pub type LogByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// Thin accessor over one Docker host's remote API. A trait so discovery,
/// the pipelines and the sampler can be driven by a scripted fake in tests.
#[async_trait]
pub trait HostApi: Send + Sync {
    async fn list_containers(&self, host: &str) -> Result<Vec<ContainerDescriptor>, Error>;
    async fn top_processes(&self, host: &str, id: &str) -> Result<ProcessTable, Error>;
    async fn open_log_stream(&self, host: &str, id: &str) -> Result<LogByteStream, Error>;
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DockerHostClient {
    http: reqwest::Client,
}

impl DockerHostClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");
        Self { http }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        host: &str,
        url: &str,
    ) -> Result<T, Error> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::from_host_request(host, e))?
            .error_for_status()
            .map_err(|e| Error::MalformedResponse {
                host: host.to_string(),
                detail: e.to_string(),
            })?;
        response.json().await.map_err(|e| Error::MalformedResponse {
            host: host.to_string(),
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl HostApi for DockerHostClient {
    async fn list_containers(&self, host: &str) -> Result<Vec<ContainerDescriptor>, Error> {
        let url = format!("http://{host}/containers/json");
        let summaries: Vec<ContainerSummary> = self.get_json(host, &url).await?;
        Ok(summaries
            .into_iter()
            .map(|summary| ContainerDescriptor::from_summary(host, summary))
            .collect())
    }

    async fn top_processes(&self, host: &str, id: &str) -> Result<ProcessTable, Error> {
        let url = format!("http://{host}/containers/{id}/top?ps_args=aux");
        let table: ProcessTable = self.get_json(host, &url).await?;
        // Ragged rows would silently misalign columns downstream.
        if let Some(row) = table
            .processes
            .iter()
            .find(|row| row.len() != table.titles.len())
        {
            return Err(Error::MalformedResponse {
                host: host.to_string(),
                detail: format!(
                    "top row has {} cells for {} titles",
                    row.len(),
                    table.titles.len()
                ),
            });
        }
        Ok(table)
    }

    async fn open_log_stream(&self, host: &str, id: &str) -> Result<LogByteStream, Error> {
        let url = format!(
            "http://{host}/containers/{id}/logs?follow=1&tail=0&stdout=1&stderr=1&timestamps=1"
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::from_host_request(host, e))?
            .error_for_status()
            .map_err(|e| Error::MalformedResponse {
                host: host.to_string(),
                detail: e.to_string(),
            })?;
        Ok(Box::pin(response.bytes_stream().map_err(Error::LogStream)))
    }
}
