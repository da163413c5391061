use std::process::ExitCode;

use http_gust_runner::prelude::*;

const DEFAULTS: ScenarioDefaults = ScenarioDefaults {
    service_name: "generic-service",
    use_login_token: false,
    test_id_label: None,
};

fn main() -> GustResult<ExitCode> {
    let builder = ScenarioDefinitionBuilder::<HttpRunnerContext, HttpAgentContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    );

    let mut config = RunConfig::from_env(&DEFAULTS);
    let profile = FlowProfile::from_env(&config, &FlowDefaults::service(config.mode));

    let builder = builder.use_behaviour(&profile.name, profile.scenario(&config), request_flow);
    // Tokens are not refreshed, so the locally signed one has to last the whole run.
    if let Some(run) = builder.planned_duration() {
        config.identity.cover_run(run);
    }

    let builder = builder
        .with_runner_values(HttpRunnerContext::new(config))
        .use_setup(preflight)
        .use_agent_setup(connect_client)
        .add_capture_env("BASE_URL")
        .add_capture_env("TARGET_PATH")
        .add_capture_env("METHOD")
        .add_capture_env("EXECUTOR_MODE")
        .add_capture_env("TESTID");

    let outcome = run(builder)?;

    Ok(ExitCode::from(outcome.exit_code()))
}
