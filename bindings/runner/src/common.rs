use std::time::Duration;

use anyhow::Context;
use gust_runner::prelude::{
    AgentBailError, AgentContext, HookResult, RunnerContext, UserValuesConstraint,
};
use http_client_instrumented::prelude::{
    handle_http_err, HttpClient, HttpClientError, HttpRequest, HttpResponse, Method,
};

use crate::body::BodyStrategy;
use crate::config::RunConfig;
use crate::context::HttpAgentContext;
use crate::runner_context::HttpRunnerContext;
use crate::token::{issue_credential, Credential};

/// Pause after each iteration of [request_flow].
pub const REQUEST_THINK_TIME: Duration = Duration::from_millis(50);

/// A request that is built once and then sent as is, for every iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub request: HttpRequest,
}

impl PreparedRequest {
    /// The configured target with its content type, the bearer header and a body chosen by
    /// [BodyStrategy].
    pub fn for_target(config: &RunConfig, credential: &Credential) -> Self {
        let target = &config.target;
        let request = HttpRequest::new(target.url())
            .header("Content-Type", &target.content_type)
            .header("Authorization", credential.authorization())
            .body(BodyStrategy::for_target(target).render(&config.body));

        Self {
            method: target.method.clone(),
            request,
        }
    }

    /// A JSON `POST` to `url` carrying the bearer header.
    pub fn post_json(url: impl ToString, credential: &Credential, body: &serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            request: HttpRequest::new(url)
                .header("Authorization", credential.authorization())
                .json(body),
        }
    }
}

/// A client for setup work.
///
/// It carries no scenario tags, so its calls are reported but never count towards thresholds.
fn setup_client<RV: UserValuesConstraint>(ctx: &RunnerContext<RV>) -> anyhow::Result<HttpClient> {
    HttpClient::new(ctx.reporter()).context("Could not build the HTTP client")
}

/// Obtain the credential for this run and store it in the [HttpRunnerContext].
///
/// See [issue_credential] for how the credential is chosen. This never fails because a login was
/// rejected, only if no token could be produced at all.
pub fn issue_shared_credential(ctx: &mut RunnerContext<HttpRunnerContext>) -> HookResult {
    let identity = ctx.get().config()?.identity.clone();
    let client = setup_client(ctx)?;

    let issued = ctx
        .executor()
        .execute_in_place(async { issue_credential(&client, &identity).await })
        .context("Failed to issue a credential")?;

    log::debug!(
        "Using a {} credential issued at {}",
        issued.credential.source,
        issued.credential.issued_at
    );
    ctx.get_mut().set_credential(issued);

    Ok(())
}

/// Send `request` `calls` times before the timed run, for example to fill a cache.
///
/// Responses are not checked.
pub fn warm_up(
    ctx: &RunnerContext<HttpRunnerContext>,
    request: &PreparedRequest,
    calls: u64,
) -> HookResult {
    let client = setup_client(ctx)?;

    let succeeded = ctx.executor().execute_in_place(async {
        let mut succeeded = 0_u64;
        for _ in 0..calls {
            if client.call(&request.method, &request.request).await.is_ok() {
                succeeded += 1;
            }
        }
        Ok(succeeded)
    })?;

    log::info!("warm_up calls={calls} succeeded={succeeded}");

    Ok(())
}

/// Send `request` once before the timed run and log its status next to the login status.
///
/// The call is made with the untagged setup client. A failed call is logged with status 0 and
/// does not stop the run.
pub fn preflight_call(
    ctx: &RunnerContext<HttpRunnerContext>,
    request: &PreparedRequest,
    label: &str,
) -> anyhow::Result<u16> {
    let client = setup_client(ctx)?;
    let response = ctx.executor().execute_in_place(async {
        Ok(HttpResponse::from_outcome(
            client.call(&request.method, &request.request).await,
        ))
    })?;

    log::info!(
        "login_status={} preflight {label} status={}",
        ctx.get().login_status(),
        response.status
    );

    Ok(response.status)
}

/// Prepare a single target scenario.
///
/// Checks that the target URL is valid, issues the shared credential and sends the configured
/// request once, logging its status. The request is then stored for [request_flow].
///
/// ```rust,no_run
/// use http_gust_runner::prelude::*;
///
/// fn setup(ctx: &mut RunnerContext<HttpRunnerContext>) -> HookResult {
///     preflight(ctx)
/// }
/// ```
pub fn preflight(ctx: &mut RunnerContext<HttpRunnerContext>) -> HookResult {
    let url = ctx.get().config()?.target.url();
    url::Url::parse(&url).with_context(|| format!("Invalid target URL: {url}"))?;

    issue_shared_credential(ctx)?;

    let request = PreparedRequest::for_target(ctx.get().config()?, ctx.get().credential()?);
    let target = &ctx.get().config()?.target;
    preflight_call(ctx, &request, &format!("{} {}", target.method, target.path))?;

    ctx.get_mut().set_prepared_request(request);

    Ok(())
}

/// Agent setup hook that gives the worker its own client, tagged with its scenario.
///
/// The agent bails if the client cannot be built.
pub fn connect_client<RV: UserValuesConstraint>(
    ctx: &mut AgentContext<RV, HttpAgentContext>,
) -> HookResult {
    let client = HttpClient::new(ctx.runner_context().reporter())
        .map_err(|e| AgentBailError::new(format!("Could not build the HTTP client: {e}")))?
        .with_attrs(ctx.tags());

    ctx.get_mut().client = Some(client);

    Ok(())
}

/// Send `request` with the worker's client.
///
/// Error statuses and transport failures are returned as a [HttpResponse] for checks to judge.
/// A request that cannot be built makes the agent bail.
pub fn send_request<RV: UserValuesConstraint>(
    ctx: &AgentContext<RV, HttpAgentContext>,
    request: &PreparedRequest,
) -> anyhow::Result<HttpResponse> {
    let client = ctx.get().client()?;
    let outcome = ctx.runner_context().executor().execute_in_place(async {
        Ok(client.call(&request.method, &request.request).await)
    })?;

    match outcome {
        Err(HttpClientError::Transport(e)) if e.is_builder() => {
            Err(handle_http_err(HttpClientError::Transport(e)))
        }
        outcome => Ok(HttpResponse::from_outcome(outcome)),
    }
}

/// Sleep between iterations. Cut short if the run is shut down.
pub fn think<RV: UserValuesConstraint, V: UserValuesConstraint>(
    ctx: &AgentContext<RV, V>,
    duration: Duration,
) -> HookResult {
    ctx.runner_context().executor().sleep(duration)
}

/// Behaviour that sends the request prepared by [preflight] and checks for a 2xx status.
pub fn request_flow(ctx: &mut AgentContext<HttpRunnerContext, HttpAgentContext>) -> HookResult {
    let response = send_request(ctx, ctx.runner_context().get().prepared_request()?)?;
    ctx.check("status is 2xx", response.is_success());

    think(ctx, REQUEST_THINK_TIME)
}
