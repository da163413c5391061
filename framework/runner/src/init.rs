use clap::Parser;

use crate::cli::GustScenarioCli;

/// Initialise logging and parse the command line for a scenario binary.
///
/// Logging is configured through `RUST_LOG` and defaults to `info`.
pub fn init() -> GustScenarioCli {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    GustScenarioCli::parse()
}
