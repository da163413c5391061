use std::process::ExitCode;
use std::time::Duration;

use http_gust_runner::prelude::*;
use serde_json::json;

const DEFAULTS: ScenarioDefaults = ScenarioDefaults {
    service_name: "auth-service",
    use_login_token: true,
    test_id_label: Some("auth"),
};

const LOGIN_THINK_TIME: Duration = Duration::from_millis(100);
const API_THINK_TIME: Duration = Duration::from_millis(50);

fn search_url(config: &RunConfig) -> String {
    format!("{}{}", config.target.base_url, config.search_path)
}

/// The baseline variant varies the query on every iteration so that nothing is served from a
/// cache.
fn api_query(config: &RunConfig, iteration: u64) -> String {
    match config.variant {
        AuthVariant::Baseline => format!("{}-{iteration}", config.body.query),
        _ => config.body.query.clone(),
    }
}

fn setup(ctx: &mut RunnerContext<HttpRunnerContext>) -> HookResult {
    issue_shared_credential(ctx)?;

    let config = ctx.get().config()?;
    let request = PreparedRequest::post_json(
        search_url(config),
        ctx.get().credential()?,
        &search_body(&config.body, &config.body.query),
    );
    preflight_call(ctx, &request, &format!("POST {}", config.search_path))?;

    if config.variant == AuthVariant::Cache {
        warm_up(ctx, &request, config.warmup_calls)?;
    }

    Ok(())
}

fn login_flow(ctx: &mut AgentContext<HttpRunnerContext, HttpAgentContext>) -> HookResult {
    let identity = &ctx.runner_context().get().config()?.identity;
    let request = PreparedRequest {
        method: Method::POST,
        request: HttpRequest::new(format!("{}/auth/login", identity.auth_base_url)).json(&json!({
            "email": identity.email,
            "password": identity.password,
        })),
    };

    let response = send_request(ctx, &request)?;
    ctx.check("login status is 200", response.status == 200);
    ctx.check(
        "login returns token",
        response.has_json_field("access_token"),
    );

    think(ctx, LOGIN_THINK_TIME)
}

fn api_flow(ctx: &mut AgentContext<HttpRunnerContext, HttpAgentContext>) -> HookResult {
    let values = ctx.runner_context().get();
    let config = values.config()?;
    let request = PreparedRequest::post_json(
        search_url(config),
        values.credential()?,
        &search_body(&config.body, &api_query(config, ctx.iteration())),
    );

    let response = send_request(ctx, &request)?;
    ctx.check("api status is 200", response.status == 200);
    ctx.check("api returns results", response.has_json_field("results"));

    think(ctx, API_THINK_TIME)
}

fn main() -> GustResult<ExitCode> {
    let builder = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpAgentContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    );

    let mut config = RunConfig::from_env(&DEFAULTS);
    let login = FlowProfile::from_env(&config, &FlowDefaults::login());
    let api = FlowProfile::from_env(&config, &FlowDefaults::api());

    let builder = builder
        .use_behaviour(&login.name, login.scenario(&config), login_flow)
        .use_behaviour(&api.name, api.scenario(&config), api_flow);
    if let Some(run) = builder.planned_duration() {
        config.identity.cover_run(run);
    }

    let builder = builder
        .with_runner_values(HttpRunnerContext::new(config))
        .use_setup(setup)
        .use_agent_setup(connect_client)
        .add_capture_env("BASE_URL")
        .add_capture_env("SEARCH_PATH")
        .add_capture_env("SCENARIO")
        .add_capture_env("EXECUTOR_MODE")
        .add_capture_env("TESTID");

    let outcome = run(builder)?;

    Ok(ExitCode::from(outcome.exit_code()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(variant: &str) -> RunConfig {
        let env = HashMap::from([("SCENARIO".to_string(), variant.to_string())]);
        RunConfig::from_lookup(&env, &DEFAULTS)
    }

    #[test]
    fn baseline_query_changes_per_iteration() {
        let config = config("baseline");

        assert_eq!("meeting-0", api_query(&config, 0));
        assert_eq!("meeting-7", api_query(&config, 7));
    }

    #[test]
    fn cache_query_is_fixed() {
        let config = config("cache");

        assert_eq!("meeting", api_query(&config, 7));
        assert_eq!("http://localhost:8083/search/", search_url(&config));
    }
}
