#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("host {host} unreachable: {source}")]
    HostUnreachable {
        host: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed response from {host}: {detail}")]
    MalformedResponse { host: String, detail: String },
    #[error("log stream error: {0}")]
    LogStream(#[source] reqwest::Error),
    #[error("relay error: {0}")]
    Relay(#[from] std::io::Error),
}

impl Error {
    /// Classify a reqwest failure against a given host. Failures to reach
    /// the host at all are `HostUnreachable`; anything about the status or
    /// body shape is `MalformedResponse`.
    pub fn from_host_request(host: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Error::HostUnreachable {
                host: host.to_string(),
                source: err,
            }
        } else {
            Error::MalformedResponse {
                host: host.to_string(),
                detail: err.to_string(),
            }
        }
    }
}
