use anyhow::Context;
use gust_runner::prelude::UserValuesConstraint;

use crate::common::PreparedRequest;
use crate::config::RunConfig;
use crate::token::{Credential, IssuedCredential};

/// Values shared by every worker of an HTTP scenario.
///
/// Created from the [RunConfig] before the run and completed by the setup hooks. Workers only
/// ever read it.
#[derive(Default, Debug)]
pub struct HttpRunnerContext {
    config: Option<RunConfig>,
    credential: Option<Credential>,
    login_status: u16,
    request: Option<PreparedRequest>,
}

impl UserValuesConstraint for HttpRunnerContext {}

impl HttpRunnerContext {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config: Some(config),
            ..Default::default()
        }
    }

    pub fn config(&self) -> anyhow::Result<&RunConfig> {
        self.config
            .as_ref()
            .context("No run configuration, pass `HttpRunnerContext::new` to `with_runner_values`")
    }

    pub fn credential(&self) -> anyhow::Result<&Credential> {
        self.credential
            .as_ref()
            .context("No credential, call `issue_shared_credential` in the setup hook")
    }

    /// The `Authorization` header value for the run's credential.
    pub fn auth_header(&self) -> anyhow::Result<String> {
        Ok(self.credential()?.authorization())
    }

    /// Status of the last bootstrap login attempt, `0` if there was none.
    pub fn login_status(&self) -> u16 {
        self.login_status
    }

    /// The request sent by [crate::common::request_flow] on every iteration.
    pub fn prepared_request(&self) -> anyhow::Result<&PreparedRequest> {
        self.request
            .as_ref()
            .context("No prepared request, call `preflight` in the setup hook")
    }

    pub(crate) fn set_credential(&mut self, issued: IssuedCredential) {
        self.login_status = issued.login_status;
        self.credential = Some(issued.credential);
    }

    pub(crate) fn set_prepared_request(&mut self, request: PreparedRequest) {
        self.request = Some(request);
    }
}
