use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::Path;

/// Summary of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the scenario binary that was run
    pub scenario_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The duration that the run was configured with, in seconds
    ///
    /// If the run was configured for soak testing, then this will not be set.
    pub run_duration: Option<u64>,
    /// The number of workers started across all scenarios
    pub peer_count: usize,
    /// The number of workers still running at the end of the run
    ///
    /// Workers that bail or fail their setup hook are not counted.
    pub peer_end_count: usize,
    /// The load profile of each scenario that was driven
    pub scenarios: Vec<ScenarioSummary>,
    /// The verdict on every threshold
    pub thresholds: Vec<ThresholdSummary>,
    /// Environment variables set for the run
    ///
    /// This won't capture all environment variables. Just the ones that the scenario asked to
    /// record.
    pub env: HashMap<String, String>,
    /// The version of Gust that was used for this run
    pub gust_version: String,
}

/// How one scenario was driven.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioSummary {
    pub name: String,
    /// e.g. `ramping-vus` or `constant-arrival-rate`
    pub executor: String,
    pub start_level: u64,
    pub stages: Vec<StageSummary>,
    pub workers: usize,
    pub iterations: u64,
    /// Only set for arrival rate scenarios.
    pub dropped_iterations: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageSummary {
    pub target: u64,
    pub duration_s: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdSummary {
    pub scenario: String,
    pub metric: String,
    /// e.g. `p(99)<10000`
    pub threshold: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

impl RunSummary {
    /// Create a new run summary
    pub fn new(
        run_id: String,
        scenario_name: String,
        started_at: i64,
        run_duration: Option<u64>,
        peer_count: usize,
        gust_version: String,
    ) -> Self {
        Self {
            run_id,
            scenario_name,
            started_at,
            run_duration,
            peer_count,
            peer_end_count: 0,
            scenarios: Vec::new(),
            thresholds: Vec::new(),
            env: HashMap::with_capacity(0),
            gust_version,
        }
    }

    /// Set the peer end count
    pub fn set_peer_end_count(&mut self, peer_end_count: usize) {
        self.peer_end_count = peer_end_count;
    }

    pub fn add_scenario(&mut self, scenario: ScenarioSummary) {
        self.scenarios.push(scenario);
    }

    pub fn add_threshold(&mut self, threshold: ThresholdSummary) {
        self.thresholds.push(threshold);
    }

    /// Add an environment variable
    pub fn add_env(&mut self, key: String, value: String) {
        self.env.insert(key, value);
    }

    /// Whether every threshold passed
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to identify the configuration used to run the scenario, so that
    /// runs with the same load profile can be compared. It uses the
    ///     - Scenario name
    ///     - Run duration
    ///     - Each scenario's executor and stages
    ///     - Selected environment variables
    ///     - Gust version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.scenario_name.as_bytes());
        if let Some(run_duration) = self.run_duration {
            Digest::update(&mut hasher, run_duration.to_le_bytes());
        }
        self.scenarios
            .iter()
            .sorted_by_key(|s| s.name.as_str())
            .for_each(|s| {
                Digest::update(&mut hasher, s.name.as_bytes());
                Digest::update(&mut hasher, s.executor.as_bytes());
                Digest::update(&mut hasher, s.start_level.to_le_bytes());
                for stage in &s.stages {
                    Digest::update(&mut hasher, stage.target.to_le_bytes());
                    Digest::update(&mut hasher, stage.duration_s.to_le_bytes());
                }
            });
        self.env
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        Digest::update(&mut hasher, self.gust_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary].
pub fn load_summary_runs(path: &Path) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        runs.push(serde_json::from_str(&line)?);
    }
    Ok(runs)
}
