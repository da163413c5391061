use anyhow::Context;
use gust_runner::prelude::UserValuesConstraint;
use http_client_instrumented::prelude::HttpClient;

/// Values owned by a single worker.
#[derive(Default, Debug)]
pub struct HttpAgentContext {
    pub client: Option<HttpClient>,
}

impl UserValuesConstraint for HttpAgentContext {}

impl HttpAgentContext {
    pub fn client(&self) -> anyhow::Result<&HttpClient> {
        self.client
            .as_ref()
            .context("No HTTP client, use `connect_client` as the agent setup hook")
    }
}
