use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::Error;

/// What to do when a write to the collector fails. `Abort` reproduces the
/// historical behavior of taking the whole process down; `Continue`
/// sacrifices only the pipeline that hit the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RelayPolicy {
    #[default]
    Abort,
    Continue,
}

/// Write-only connection to the collector. Records go out as one JSON
/// object per line; nothing is ever read back.
pub struct Relay {
    stream: TcpStream,
}

impl Relay {
    pub async fn connect(addr: &str) -> Result<Self, Error> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self { stream })
    }

    pub async fn send<T: Serialize>(&mut self, record: &T) -> Result<(), Error> {
        let mut line = serde_json::to_vec(record).map_err(|e| Error::Relay(e.into()))?;
        line.push(b'\n');
        self.stream.write_all(&line).await?;
        Ok(())
    }

    /// Flush buffered bytes and shut the write side down so the collector
    /// sees a clean EOF.
    pub async fn close(mut self) -> Result<(), Error> {
        self.stream.flush().await?;
        self.stream.shutdown().await?;
        Ok(())
    }
}
