use gust_core::prelude::AgentBailError;

/// Failure of a single HTTP call.
///
/// A response with status 400 or above is an error, matching how load testing tools count a
/// request as failed. Redirects are followed before the status is judged.
#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP request failed with status {status}")]
    Status { status: u16, body: String },
}

impl HttpClientError {
    /// The response status, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            HttpClientError::Status { status, .. } => Some(*status),
        }
    }
}

/// Handle an HTTP client error, returning an `anyhow::Error`.
///
/// A request that could not even be built, for example because the base URL is malformed, will
/// fail the same way on every iteration. The agent bails rather than logging the same error until
/// the run finishes.
pub fn handle_http_err(err: HttpClientError) -> anyhow::Error {
    match err {
        HttpClientError::Transport(e) if e.is_builder() => {
            AgentBailError::new(format!("Cannot build HTTP request: {e}")).into()
        }
        _ => anyhow::anyhow!(err),
    }
}
