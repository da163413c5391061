use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use http_gust_runner::prelude::{
    connect_client, issue_shared_credential, preflight, preflight_call, request_flow, run, think,
    AgentContext, FlowDefaults, FlowProfile, GustScenarioCli, HookResult, HttpAgentContext,
    HttpRunnerContext, PreparedRequest, ReporterOpt, RunConfig, RunnerContext, ScenarioDefaults,
    ScenarioDefinitionBuilder, THRESHOLD_FAILURE_EXIT_CODE,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVICE: ScenarioDefaults = ScenarioDefaults {
    service_name: "search-service",
    use_login_token: false,
    test_id_label: None,
};

fn cli(duration: u64) -> GustScenarioCli {
    GustScenarioCli {
        duration: Some(duration),
        soak: false,
        no_progress: true,
        reporter: ReporterOpt::Noop,
        report_dir: PathBuf::from("reports"),
        run_id: None,
        summary_file: None,
    }
}

fn env(base_url: &str) -> HashMap<String, String> {
    [
        ("BASE_URL", base_url),
        ("TARGET_PATH", "/search"),
        ("JWT_OVERRIDE", "fixed-token"),
        ("LOAD_VUS_TARGET", "2"),
        ("LOAD_STAGE_UP", "1s"),
        ("LOAD_STAGE_HOLD", "1s"),
        ("LOAD_STAGE_DOWN", "1s"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn scenario(env: &HashMap<String, String>) -> ScenarioDefinitionBuilder<HttpRunnerContext, HttpAgentContext> {
    let config = RunConfig::from_lookup(env, &SERVICE);
    let profile = FlowProfile::from_lookup(env, &config, &FlowDefaults::service(config.mode));

    ScenarioDefinitionBuilder::new("service_flow", cli(2))
        .use_behaviour(&profile.name, profile.scenario(&config), request_flow)
        .with_runner_values(HttpRunnerContext::new(config))
        .use_setup(preflight)
        .use_agent_setup(connect_client)
}

fn mock_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

#[test]
fn requests_carry_credential_and_search_body() {
    let rt = mock_runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("Authorization", "Bearer fixed-token"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(
                json!({"query": "meeting", "user_id": 1, "limit": 20, "skip": 0}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server),
    );

    let outcome = run(scenario(&env(&server.uri()))).unwrap();

    assert!(outcome.passed());
    assert_eq!(0, outcome.exit_code());
    let iterations = outcome.iterations.get("load").copied().unwrap_or_default();
    assert!(iterations >= 1, "iterations = {iterations}");

    let received = rt.block_on(server.received_requests()).unwrap();
    // The preflight call comes on top of the iterations.
    assert!(received.len() as u64 > iterations);
}

#[test]
fn failing_target_breaches_thresholds() {
    let rt = mock_runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server),
    );

    let outcome = run(scenario(&env(&server.uri()))).unwrap();

    assert!(!outcome.passed());
    assert_eq!(THRESHOLD_FAILURE_EXIT_CODE, outcome.exit_code());
    assert!(outcome
        .thresholds
        .iter()
        .any(|t| t.threshold.metric() == "http_req_failed" && !t.passed));
}

#[test]
fn invalid_target_url_fails_setup() {
    let outcome = run(scenario(&env("not a url")));

    let err = outcome.unwrap_err();
    assert!(
        format!("{err:#}").contains("Invalid target URL"),
        "unexpected error: {err:#}"
    );
}

fn search_preflight(ctx: &mut RunnerContext<HttpRunnerContext>) -> HookResult {
    issue_shared_credential(ctx)?;

    let config = ctx.get().config()?;
    let request = PreparedRequest::post_json(
        format!("{}{}", config.target.base_url, config.search_path),
        ctx.get().credential()?,
        &json!({"query": "meeting"}),
    );
    let status = preflight_call(ctx, &request, &format!("POST {}", config.search_path))?;
    anyhow::ensure!(status == 200, "preflight returned {status}");

    Ok(())
}

fn idle(ctx: &mut AgentContext<HttpRunnerContext, HttpAgentContext>) -> HookResult {
    think(ctx, Duration::from_millis(50))
}

#[test]
fn search_preflight_runs_once_before_the_flows() {
    let rt = mock_runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("POST"))
            .and(path("/search/"))
            .and(header("Authorization", "Bearer fixed-token"))
            .and(body_json(json!({"query": "meeting"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server),
    );

    let env = env(&server.uri());
    let config = RunConfig::from_lookup(&env, &SERVICE);
    let profile = FlowProfile::from_lookup(&env, &config, &FlowDefaults::service(config.mode));
    let builder = ScenarioDefinitionBuilder::new("search_preflight", cli(1))
        .use_behaviour(&profile.name, profile.scenario(&config), idle)
        .with_runner_values(HttpRunnerContext::new(config))
        .use_setup(search_preflight)
        .use_agent_setup(connect_client);

    let outcome = run(builder).unwrap();

    assert!(outcome.passed());
    rt.block_on(server.verify());
}
