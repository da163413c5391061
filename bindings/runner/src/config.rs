use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use gust_runner::prelude::{
    parse_duration, parse_int_prefix, parse_seconds, parse_seconds_as, parse_targets, plan,
    BareUnit, ExecutorKind, PlanParams, RunMode, Scenario, StagePlan, StageStyle,
};
use http_client_instrumented::prelude::Method;

/// Where configuration values are read from.
///
/// The process environment in scenario binaries, a literal map in tests.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Typed, defaulting access to an [EnvSource].
///
/// Empty values count as unset. Values that do not parse fall back to the default.
pub struct Settings<'a, E: EnvSource + ?Sized> {
    env: &'a E,
}

impl<'a, E: EnvSource + ?Sized> Settings<'a, E> {
    pub fn new(env: &'a E) -> Self {
        Self { env }
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.env
            .var(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_string())
    }

    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.text(key)
            .and_then(|v| parse_int_prefix(&v))
            .unwrap_or(default)
    }

    /// Negative values are clamped to 0.
    pub fn u64_or(&self, key: &str, default: u64) -> u64 {
        self.text(key)
            .and_then(|v| parse_int_prefix(&v))
            .map(|n| n.max(0) as u64)
            .unwrap_or(default)
    }

    /// Only a case-insensitive `true` is true.
    pub fn flag_or(&self, key: &str, default: bool) -> bool {
        self.text(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    /// A duration such as `2m`, `90s` or a bare number of minutes.
    pub fn duration_or(&self, key: &str, default: Duration) -> Duration {
        parse_duration(self.text(key).as_deref(), default)
    }

    /// Like [Settings::duration_or] but `None` when unset or unparseable.
    pub fn duration(&self, key: &str) -> Option<Duration> {
        // parse_seconds never returns 0 for parsed input, so 0 marks a miss.
        match parse_seconds(self.text(key).as_deref(), 0) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// The endpoint every iteration of the request flow calls.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfig {
    pub base_url: String,
    pub path: String,
    pub method: Method,
    pub content_type: String,
    /// Sent verbatim instead of a generated body.
    pub body: Option<String>,
}

impl TargetConfig {
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }
}

/// How the run obtains its bearer credential.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityConfig {
    /// Used verbatim when set.
    pub override_token: Option<String>,
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub user_id: i64,
    /// Lifetime of a locally signed token.
    pub ttl: Duration,
    /// `JWT_TTL_SECONDS` was set, so [IdentityConfig::cover_run] leaves `ttl` alone.
    pub ttl_pinned: bool,
    /// Log in against the auth service before signing locally.
    pub use_login: bool,
    pub email: String,
    pub password: String,
    pub auth_base_url: String,
}

/// Default lifetime of a locally signed token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(900);
/// Slack added on top of the run so the token outlives setup and the last iterations.
pub const TOKEN_TTL_MARGIN: Duration = Duration::from_secs(300);

impl IdentityConfig {
    /// Stretch the token lifetime so it outlasts a run of `run` length.
    ///
    /// Tokens are never refreshed during a run. An explicit `JWT_TTL_SECONDS` is kept as is.
    pub fn cover_run(&mut self, run: Duration) {
        if !self.ttl_pinned {
            self.ttl = self.ttl.max(run.saturating_add(TOKEN_TTL_MARGIN));
        }
    }
}

/// Field values for generated request bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDefaults {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub tag_ids: Vec<String>,
    pub query: String,
    pub user_id: i64,
    pub limit: i64,
    pub skip: i64,
}

/// Tags attached to every sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labels {
    pub service_name: String,
    pub test_id: String,
}

/// Infrastructure variant under test in the login/API split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthVariant {
    /// Every API query is unique so nothing is served from cache.
    #[default]
    Baseline,
    Tls,
    Lb,
    /// A fixed query, with the cache warmed before the run.
    Cache,
}

impl AuthVariant {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "baseline" => Some(AuthVariant::Baseline),
            "tls" => Some(AuthVariant::Tls),
            "lb" => Some(AuthVariant::Lb),
            "cache" => Some(AuthVariant::Cache),
            _ => None,
        }
    }
}

impl Display for AuthVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AuthVariant::Baseline => "baseline",
            AuthVariant::Tls => "tls",
            AuthVariant::Lb => "lb",
            AuthVariant::Cache => "cache",
        })
    }
}

/// Defaults that differ between scenario binaries.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioDefaults {
    pub service_name: &'static str,
    pub use_login_token: bool,
    /// Middle part of the default test id, the service name if unset.
    pub test_id_label: Option<&'static str>,
}

/// Everything a run needs to know, resolved once at start.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub target: TargetConfig,
    pub identity: IdentityConfig,
    pub body: BodyDefaults,
    pub labels: Labels,
    pub mode: RunMode,
    pub executor: ExecutorKind,
    pub variant: AuthVariant,
    pub search_path: String,
    pub warmup_calls: u64,
}

const DEFAULT_BASE_URL: &str = "http://localhost:8083";

impl RunConfig {
    pub fn from_env(defaults: &ScenarioDefaults) -> Self {
        Self::from_lookup(&ProcessEnv, defaults)
    }

    pub fn from_lookup<E: EnvSource + ?Sized>(env: &E, defaults: &ScenarioDefaults) -> Self {
        let s = Settings::new(env);

        let base_url = s.text_or("BASE_URL", DEFAULT_BASE_URL);
        let user_id = s.int_or("USER_ID", 1);

        let mode = ["TEST_TYPE", "MODE", "SCENARIO"]
            .iter()
            .filter_map(|key| s.text(key))
            .find_map(|raw| RunMode::parse(&raw))
            .unwrap_or_default();
        let executor = s
            .text("EXECUTOR_MODE")
            .and_then(|raw| ExecutorKind::parse(&raw))
            .unwrap_or(ExecutorKind::Concurrency);

        let service_name = s.text_or("SERVICE_NAME", defaults.service_name);
        let test_id = s.text("TESTID").unwrap_or_else(|| {
            format!(
                "gust-{}-{}",
                defaults.test_id_label.unwrap_or(service_name.as_str()),
                mode
            )
        });

        let ttl_seconds = s
            .text("JWT_TTL_SECONDS")
            .and_then(|raw| parse_int_prefix(&raw));

        let method = s
            .text("METHOD")
            .and_then(|raw| Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).ok())
            .unwrap_or(Method::POST);

        Self {
            target: TargetConfig {
                base_url: base_url.clone(),
                path: target_path(&s),
                method,
                content_type: s.text_or("CONTENT_TYPE", "application/json"),
                body: s.text("BODY"),
            },
            identity: IdentityConfig {
                override_token: s.text("JWT_OVERRIDE"),
                secret: s.text_or("JWT_SECRET", "change-me-in-prod"),
                issuer: s.text_or("JWT_ISSUER", "tasknotes-auth"),
                audience: s.text_or("JWT_AUDIENCE", "tasknotes"),
                user_id,
                ttl: ttl_seconds
                    .map(|n| Duration::from_secs(n.max(0) as u64))
                    .unwrap_or(DEFAULT_TOKEN_TTL),
                ttl_pinned: ttl_seconds.is_some(),
                use_login: s.flag_or("USE_LOGIN_TOKEN_FOR_API", defaults.use_login_token),
                email: s.text_or("TEST_EMAIL", "perftest@example.com"),
                password: s.text_or("TEST_PASSWORD", "Passw0rd!"),
                auth_base_url: s.text("AUTH_BASE_URL").unwrap_or(base_url),
            },
            body: BodyDefaults {
                title: s.text_or("TITLE", "Perf Task"),
                description: s.text_or("DESCRIPTION", "gust load"),
                priority: s.text_or("PRIORITY", "medium"),
                tag_ids: s
                    .text_or("TAG_IDS", "1,2")
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect(),
                query: s.text_or("QUERY", "meeting"),
                user_id,
                limit: s.int_or("LIMIT", 20),
                skip: s.int_or("SKIP", 0),
            },
            labels: Labels {
                service_name,
                test_id,
            },
            mode,
            executor,
            variant: s
                .text("SCENARIO")
                .and_then(|raw| AuthVariant::parse(&raw))
                .unwrap_or_default(),
            search_path: s.text_or("SEARCH_PATH", "/search/"),
            warmup_calls: s.u64_or("WARMUP_CALLS", 50),
        }
    }
}

/// `TARGET_PATH` wins. `PATH` is only used when it looks like a URL path, since the variable
/// usually holds the shell's search list.
fn target_path<E: EnvSource + ?Sized>(s: &Settings<'_, E>) -> String {
    s.text("TARGET_PATH")
        .or_else(|| {
            s.text("PATH")
                .filter(|p| p.starts_with('/') && !p.contains(':'))
        })
        .unwrap_or_else(|| "/search".to_string())
}

/// Per-flow defaults and the suffix of the flow's override variables.
#[derive(Debug, Clone, Copy)]
pub struct FlowDefaults {
    /// Scenario name, also the `scenario` tag.
    pub name: &'static str,
    /// Appended to the stress variables, e.g. `_LOGIN` reads `STRESS_MAX_VUS_LOGIN`.
    pub env_suffix: &'static str,
    pub rate_key: &'static str,
    pub default_rate: u64,
    pub level_key: &'static str,
    /// The default concurrency target is the rate, but at least this.
    pub level_floor: u64,
    pub ramp: Duration,
    pub stress_start_floor: u64,
    pub stress_max_floor: u64,
}

impl FlowDefaults {
    /// The single flow of the generic service scenario, named after the run mode.
    pub fn service(mode: RunMode) -> Self {
        Self {
            name: match mode {
                RunMode::Load => "load",
                RunMode::Stress => "stress",
            },
            env_suffix: "",
            rate_key: "API_RPS",
            default_rate: 50,
            level_key: "LOAD_VUS_TARGET",
            level_floor: 50,
            ramp: Duration::from_secs(120),
            stress_start_floor: 20,
            stress_max_floor: 100,
        }
    }

    pub fn login() -> Self {
        Self {
            name: "login",
            env_suffix: "_LOGIN",
            rate_key: "LOGIN_RPS",
            default_rate: 5,
            level_key: "LOGIN_VUS_TARGET",
            level_floor: 5,
            ramp: Duration::from_secs(60),
            stress_start_floor: 2,
            stress_max_floor: 10,
        }
    }

    pub fn api() -> Self {
        Self {
            name: "api",
            env_suffix: "_API",
            rate_key: "API_RPS",
            default_rate: 50,
            level_key: "API_VUS_TARGET",
            level_floor: 20,
            ramp: Duration::from_secs(60),
            stress_start_floor: 10,
            stress_max_floor: 40,
        }
    }

    fn key(&self, base: &str) -> String {
        format!("{base}{}", self.env_suffix)
    }
}

const RATE_START_FLOOR: u64 = 10;
const RATE_MAX_FLOOR: u64 = 100;
const PRE_ALLOCATED_FLOOR: u64 = 20;
const MAX_WORKERS_FLOOR: u64 = 60;

/// The resolved load profile of one flow.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowProfile {
    pub name: String,
    pub executor: ExecutorKind,
    pub plan: StagePlan,
    pub start_level: u64,
    /// `(pre_allocated, max)` for arrival rate flows.
    pub workers: Option<(u64, u64)>,
}

impl FlowProfile {
    pub fn from_env(config: &RunConfig, flow: &FlowDefaults) -> Self {
        Self::from_lookup(&ProcessEnv, config, flow)
    }

    pub fn from_lookup<E: EnvSource + ?Sized>(
        env: &E,
        config: &RunConfig,
        flow: &FlowDefaults,
    ) -> Self {
        let s = Settings::new(env);

        let rate = s.u64_or(flow.rate_key, flow.default_rate);
        let level = s.u64_or(flow.level_key, rate.max(flow.level_floor));
        let duration = s.duration_or("DURATION", Duration::from_secs(120));
        let total = Duration::from_secs(parse_seconds_as(
            s.text("STRESS_TOTAL_SECONDS").as_deref(),
            duration.as_secs(),
            BareUnit::Seconds,
        ));

        let (start, max, targets_key) = match config.executor {
            ExecutorKind::Concurrency => (
                s.u64_or(
                    &flow.key("STRESS_START_VUS"),
                    (level / 2).max(flow.stress_start_floor),
                ),
                s.u64_or(
                    &flow.key("STRESS_MAX_VUS"),
                    level.saturating_mul(2).max(flow.stress_max_floor),
                ),
                flow.key("STRESS_TARGETS"),
            ),
            ExecutorKind::ArrivalRate => (
                s.u64_or(
                    &flow.key("STRESS_START_RATE"),
                    (rate / 2).max(RATE_START_FLOOR),
                ),
                s.u64_or(&flow.key("STRESS_MAX_RATE"), rate.max(RATE_MAX_FLOOR)),
                flow.key("STRESS_TARGETS_RATE"),
            ),
        };

        let params = PlanParams {
            total,
            target_level: level,
            ramp_up: s.duration_or("LOAD_STAGE_UP", flow.ramp),
            hold: Some(s.duration_or("LOAD_STAGE_HOLD", duration)),
            ramp_down: s.duration_or("LOAD_STAGE_DOWN", flow.ramp),
            start_level: start,
            max_level: max,
            step_count: s.u64_or(&flow.key("STRESS_STEP_COUNT"), 4),
            step_hold: s.duration(&flow.key("STRESS_STEP_HOLD")),
            step_duration: s.duration(&flow.key("STRESS_STEP_DURATION")),
            explicit_targets: s
                .text(&targets_key)
                .map(|raw| parse_targets(&raw))
                .unwrap_or_default(),
            style: StageStyle::parse_lenient(&s.text_or("STRESS_STYLE", "auto")),
        };

        let (plan, start_level) = match (config.mode, config.executor) {
            (RunMode::Load, ExecutorKind::Concurrency) => (plan(RunMode::Load, &params), 1),
            (RunMode::Load, ExecutorKind::ArrivalRate) => {
                (StagePlan::constant(rate, duration), rate)
            }
            (RunMode::Stress, _) => (plan(RunMode::Stress, &params), start),
        };

        let workers = match config.executor {
            ExecutorKind::Concurrency => None,
            ExecutorKind::ArrivalRate => Some((
                s.u64_or(&flow.key("PREALLOCATED_VUS"), rate.max(PRE_ALLOCATED_FLOOR)),
                s.u64_or(
                    &flow.key("MAX_VUS"),
                    rate.saturating_mul(2).max(MAX_WORKERS_FLOOR),
                ),
            )),
        };

        Self {
            name: flow.name.to_string(),
            executor: config.executor,
            plan,
            start_level,
            workers,
        }
    }

    /// Package the profile with the run's labels and the default thresholds.
    pub fn scenario(&self, config: &RunConfig) -> Scenario {
        let mut builder = Scenario::builder(&self.name, self.executor, self.plan.clone())
            .start_level(self.start_level)
            .time_unit(Duration::from_secs(1))
            .tag("mode", config.mode)
            .tag("service", &config.labels.service_name)
            .tag("testid", &config.labels.test_id);
        if let Some((pre_allocated, max)) = self.workers {
            builder = builder.workers(pre_allocated, max);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gust_runner::prelude::{Stage, MAX_DURATION_SECS, MAX_PLAN_STEPS};
    use pretty_assertions::assert_eq;

    const SERVICE: ScenarioDefaults = ScenarioDefaults {
        service_name: "generic-service",
        use_login_token: false,
        test_id_label: None,
    };

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn targets(profile: &FlowProfile) -> Vec<u64> {
        profile.plan.targets()
    }

    #[test]
    fn defaults_without_environment() {
        let config = RunConfig::from_lookup(&env(&[]), &SERVICE);

        assert_eq!("http://localhost:8083/search", config.target.url());
        assert_eq!(Method::POST, config.target.method);
        assert_eq!("application/json", config.target.content_type);
        assert_eq!(RunMode::Load, config.mode);
        assert_eq!(ExecutorKind::Concurrency, config.executor);
        assert_eq!("gust-generic-service-load", config.labels.test_id);
        assert_eq!("tasknotes-auth", config.identity.issuer);
        assert_eq!(DEFAULT_TOKEN_TTL, config.identity.ttl);
        assert!(!config.identity.ttl_pinned);
        assert!(!config.identity.use_login);
        assert_eq!(config.target.base_url, config.identity.auth_base_url);
        assert_eq!(vec!["1", "2"], config.body.tag_ids);
        assert_eq!(AuthVariant::Baseline, config.variant);
        assert_eq!(50, config.warmup_calls);
    }

    #[test]
    fn mode_comes_from_first_recognised_variable() {
        let config = RunConfig::from_lookup(
            &env(&[("TEST_TYPE", "soak"), ("MODE", "stress"), ("SCENARIO", "load")]),
            &SERVICE,
        );
        assert_eq!(RunMode::Stress, config.mode);

        let config = RunConfig::from_lookup(&env(&[("SCENARIO", "cache")]), &SERVICE);
        assert_eq!(RunMode::Load, config.mode);
        assert_eq!(AuthVariant::Cache, config.variant);
    }

    #[test]
    fn shell_path_is_not_a_target_path() {
        let config = RunConfig::from_lookup(&env(&[("PATH", "/usr/bin:/bin")]), &SERVICE);
        assert_eq!("/search", config.target.path);

        let config = RunConfig::from_lookup(&env(&[("PATH", "/tasks")]), &SERVICE);
        assert_eq!("/tasks", config.target.path);

        let config = RunConfig::from_lookup(
            &env(&[("PATH", "usr/bin"), ("TARGET_PATH", "/tasks")]),
            &SERVICE,
        );
        assert_eq!("/tasks", config.target.path);

        let config = RunConfig::from_lookup(&env(&[("PATH", "usr/bin")]), &SERVICE);
        assert_eq!("/search", config.target.path);
    }

    #[test]
    fn unknown_method_falls_back_to_post() {
        let config = RunConfig::from_lookup(&env(&[("METHOD", "get")]), &SERVICE);
        assert_eq!(Method::GET, config.target.method);

        let config = RunConfig::from_lookup(&env(&[("METHOD", "NOT A VERB")]), &SERVICE);
        assert_eq!(Method::POST, config.target.method);
    }

    #[test]
    fn steady_concurrency_profile() {
        let lookup = env(&[
            ("DURATION", "2m"),
            ("LOAD_STAGE_UP", "30s"),
            ("LOAD_STAGE_DOWN", "30s"),
            ("LOAD_VUS_TARGET", "50"),
        ]);
        let config = RunConfig::from_lookup(&lookup, &SERVICE);
        let profile = FlowProfile::from_lookup(&lookup, &config, &FlowDefaults::service(config.mode));

        assert_eq!(
            vec![Stage::secs(50, 30), Stage::secs(50, 120), Stage::secs(0, 30)],
            profile.plan.stages()
        );
        assert_eq!(Duration::from_secs(180), profile.plan.total_duration());
        assert_eq!(50, profile.plan.peak_target());
        assert_eq!(1, profile.start_level);
        assert_eq!(None, profile.workers);
    }

    #[test]
    fn steady_arrival_rate_profile() {
        let lookup = env(&[("EXECUTOR_MODE", "rps"), ("API_RPS", "30"), ("DURATION", "90s")]);
        let config = RunConfig::from_lookup(&lookup, &SERVICE);
        let profile = FlowProfile::from_lookup(&lookup, &config, &FlowDefaults::service(config.mode));

        assert_eq!(vec![Stage::secs(30, 90)], profile.plan.stages());
        assert_eq!(30, profile.start_level);
        assert_eq!(Some((30, 60)), profile.workers);
        assert_eq!(
            "constant-arrival-rate",
            profile.scenario(&config).executor_label()
        );
    }

    #[test]
    fn stair_step_concurrency_profile() {
        let lookup = env(&[
            ("SCENARIO", "stress"),
            ("STRESS_TOTAL_SECONDS", "600"),
            ("STRESS_START_VUS", "20"),
            ("STRESS_MAX_VUS", "100"),
            ("STRESS_STEP_COUNT", "4"),
        ]);
        let config = RunConfig::from_lookup(&lookup, &SERVICE);
        let profile = FlowProfile::from_lookup(&lookup, &config, &FlowDefaults::service(config.mode));

        assert_eq!("stress", profile.name);
        assert_eq!(vec![20, 40, 60, 80, 100], targets(&profile));
        assert!(profile
            .plan
            .stages()
            .iter()
            .all(|s| s.duration == Duration::from_secs(120)));
        assert_eq!(20, profile.start_level);
    }

    #[test]
    fn stress_defaults_derive_from_rate() {
        let lookup = env(&[("MODE", "stress"), ("EXECUTOR_MODE", "rps"), ("API_RPS", "40")]);
        let config = RunConfig::from_lookup(&lookup, &SERVICE);
        let profile = FlowProfile::from_lookup(&lookup, &config, &FlowDefaults::service(config.mode));

        // start max(40/2, 10) = 20, max max(40, 100) = 100, 120s total over 5 plateaus.
        assert_eq!(vec![20, 40, 60, 80, 100], targets(&profile));
        assert_eq!(Duration::from_secs(24), profile.plan.stages()[0].duration);
        assert_eq!(
            "ramping-arrival-rate",
            profile.scenario(&config).executor_label()
        );
    }

    #[test]
    fn per_flow_overrides_use_suffix() {
        let lookup = env(&[
            ("TEST_TYPE", "stress"),
            ("STRESS_TARGETS_LOGIN", "10,20,x,5"),
            ("STRESS_STEP_DURATION_LOGIN", "30s"),
            ("STRESS_TARGETS", "99"),
        ]);
        let auth = ScenarioDefaults {
            service_name: "auth-service",
            use_login_token: true,
            test_id_label: Some("auth"),
        };
        let config = RunConfig::from_lookup(&lookup, &auth);
        assert_eq!("gust-auth-stress", config.labels.test_id);

        let login = FlowProfile::from_lookup(&lookup, &config, &FlowDefaults::login());
        assert_eq!(
            vec![Stage::secs(10, 30), Stage::secs(20, 30), Stage::secs(5, 30)],
            login.plan.stages()
        );

        // api has no explicit targets: start max(50/2, 10) = 25, max max(100, 40) = 100
        let api = FlowProfile::from_lookup(&lookup, &config, &FlowDefaults::api());
        assert_eq!(vec![25, 43, 61, 79, 97], targets(&api));
    }

    #[test]
    fn token_outlives_long_run() {
        let lookup = env(&[("DURATION", "30m")]);
        let mut config = RunConfig::from_lookup(&lookup, &SERVICE);
        let profile = FlowProfile::from_lookup(&lookup, &config, &FlowDefaults::service(config.mode));
        let run = profile.plan.total_duration();
        assert_eq!(Duration::from_secs(2040), run);

        config.identity.cover_run(run);

        assert!(config.identity.ttl >= run, "ttl {:?}", config.identity.ttl);
        assert_eq!(run + TOKEN_TTL_MARGIN, config.identity.ttl);
    }

    #[test]
    fn short_run_keeps_default_ttl() {
        let mut config = RunConfig::from_lookup(&env(&[]), &SERVICE);
        config.identity.cover_run(Duration::from_secs(60));

        assert_eq!(DEFAULT_TOKEN_TTL, config.identity.ttl);
    }

    #[test]
    fn explicit_ttl_is_not_stretched() {
        let mut config = RunConfig::from_lookup(&env(&[("JWT_TTL_SECONDS", "120")]), &SERVICE);
        assert!(config.identity.ttl_pinned);

        config.identity.cover_run(Duration::from_secs(3600));

        assert_eq!(Duration::from_secs(120), config.identity.ttl);
    }

    #[test]
    fn oversized_stage_durations_do_not_overflow() {
        let lookup = env(&[
            ("LOAD_STAGE_UP", "99999999999999999999m"),
            ("LOAD_STAGE_DOWN", "99999999999999999999m"),
            ("STRESS_STEP_COUNT", "18446744073709551615"),
        ]);
        let mut config = RunConfig::from_lookup(&lookup, &SERVICE);
        let load = FlowProfile::from_lookup(&lookup, &config, &FlowDefaults::service(config.mode));

        let run = load.plan.total_duration();
        assert_eq!(Duration::from_secs(2 * MAX_DURATION_SECS + 120), run);
        config.identity.cover_run(run);
        assert!(config.identity.ttl >= run);

        config.mode = RunMode::Stress;
        let stress = FlowProfile::from_lookup(&lookup, &config, &FlowDefaults::service(config.mode));
        assert_eq!(MAX_PLAN_STEPS as usize + 1, stress.plan.stages().len());
    }

    #[test]
    fn scenario_carries_labels() {
        let lookup = env(&[("SERVICE_NAME", "notes"), ("TESTID", "nightly")]);
        let config = RunConfig::from_lookup(&lookup, &SERVICE);
        let scenario = FlowProfile::from_lookup(&lookup, &config, &FlowDefaults::service(config.mode))
            .scenario(&config);

        let tags = scenario.tags();
        assert_eq!("load", tags["scenario"]);
        assert_eq!("load", tags["mode"]);
        assert_eq!("notes", tags["service"]);
        assert_eq!("nightly", tags["testid"]);
    }
}
