mod body;
mod common;
mod config;
mod context;
mod runner_context;
mod token;

pub mod prelude {
    /// Common operations for HTTP scenarios.
    ///
    /// This is a good place to start if you are getting started writing scenarios.
    pub use crate::common::*;

    pub use crate::body::{search_body, task_body, BodyStrategy};
    pub use crate::config::{
        AuthVariant, BodyDefaults, EnvSource, FlowDefaults, FlowProfile, IdentityConfig, Labels,
        ProcessEnv, RunConfig, ScenarioDefaults, Settings, TargetConfig, DEFAULT_TOKEN_TTL,
        TOKEN_TTL_MARGIN,
    };
    pub use crate::context::HttpAgentContext;
    pub use crate::runner_context::HttpRunnerContext;
    pub use crate::token::{
        issue_credential, sign_local, Claims, Credential, CredentialSource, IssuedCredential,
        LoginError,
    };

    /// Re-export of the `gust_runner` prelude.
    ///
    /// This is for convenience so that you can depend on a single crate for the runner in your scenarios.
    pub use gust_runner::prelude::*;

    /// Re-export of the instrumented client for convenience.
    pub use http_client_instrumented::prelude::*;
}
