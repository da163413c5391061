use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct GustScenarioCli {
    /// The number of seconds to run the scenario for.
    ///
    /// Overrides the duration derived from the scenario's stages. Stages that have not finished
    /// when the duration elapses are cut short.
    #[clap(long)]
    pub duration: Option<u64>,

    /// Run this test as a soak test, ignoring any configured duration and continuing to run until stopped
    #[clap(long, default_value = "false")]
    pub soak: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// The reporter to use.
    #[arg(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Directory that file based reporters write into.
    #[clap(long, default_value = "reports")]
    pub report_dir: PathBuf,

    /// Identifier for this run, used to group results. A random id is generated if not set.
    #[clap(long)]
    pub run_id: Option<String>,

    /// Append a JSON summary of the run to this file.
    #[clap(long)]
    pub summary_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Keep samples in memory and print summary tables at the end of the run.
    InMemory,

    /// Write one JSON line per sample into `--report-dir`.
    JsonlFile,

    /// Only keep the aggregates needed to evaluate thresholds.
    Noop,
}
