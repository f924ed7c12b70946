//! One invocation end to end: load, partition, dispatch, aggregate.
//!
//! `prepare` does everything that can fail before a worker is contacted;
//! `Prepared::dispatch` runs the experiments and builds the report.

pub mod plan;

pub use plan::{RunPlan, DEFAULT_PARTITIONS, LOCAL_SHARED_DIR};

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::aggregate::{PhaseTimings, RunReport};
use crate::channel::{ChannelFactory, ChannelSettings, FleetChannels};
use crate::config::{WorkerConfig, DEFAULT_ORACLE, DEFAULT_SHARED_DIR};
use crate::coordinator::Coordinator;
use crate::dispatch::{Dispatcher, NO_DIFF};
use crate::error::Result;
use crate::partition::{make_partitions, sort_by_target, CommandOracle, Partition, TopologyOracle};
use crate::query::load_scenario;
use crate::subprocess::SubprocessManager;

/// Scenarios with fewer queries than this run on `localhost`.
pub const DEFAULT_CUTOFF: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyOptions {
    /// Partition method passed to the topology tool.
    pub method: String,
    pub key: String,
    pub nodes: Option<u64>,
    pub xy_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyOptions {
    /// `range` or `all`, used when no key-based strategy is set.
    pub group: String,
    pub num_partitions: Option<usize>,
    pub size_partitions: Option<usize>,
    /// Group size bound for `all`; defaults to `total / parts + 1`.
    pub threshold: Option<usize>,
    pub divisor: Option<u64>,
    pub modulus: Option<u64>,
    pub alloc: Option<Vec<u64>>,
    pub topology: Option<TopologyOptions>,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            group: "range".to_string(),
            num_partitions: None,
            size_partitions: None,
            threshold: None,
            divisor: None,
            modulus: None,
            alloc: None,
            topology: None,
        }
    }
}

/// Fully merged options for one invocation; saved as `data.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub scenario: PathBuf,
    pub hosts: Vec<String>,
    pub shared_dir: PathBuf,
    pub diffs: Vec<String>,
    pub strategy: StrategyOptions,
    pub sort: bool,
    pub cutoff: usize,
    pub worker: WorkerConfig,
    pub debug: bool,
    pub max_parallel: Option<usize>,
    pub output: Option<PathBuf>,
    pub dry_run: bool,
    pub oracle: String,
    pub channels: ChannelSettings,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            scenario: PathBuf::new(),
            hosts: Vec::new(),
            shared_dir: PathBuf::from(DEFAULT_SHARED_DIR),
            diffs: vec![NO_DIFF.to_string()],
            strategy: StrategyOptions::default(),
            sort: false,
            cutoff: DEFAULT_CUTOFF,
            worker: WorkerConfig::default(),
            debug: false,
            max_parallel: None,
            output: None,
            dry_run: false,
            oracle: DEFAULT_ORACLE.to_string(),
            channels: ChannelSettings::default(),
        }
    }
}

/// External collaborators of a run.
pub struct RunEnv {
    pub channels: Arc<dyn ChannelFactory>,
    pub oracle: Arc<dyn TopologyOracle>,
}

impl RunEnv {
    /// Named pipes and `ssh` for channels, the configured tool as oracle.
    pub fn production(options: &RunOptions) -> Self {
        let subprocess = SubprocessManager::production();
        Self {
            channels: Arc::new(FleetChannels::new(
                options.channels.clone(),
                subprocess.runner(),
            )),
            oracle: Arc::new(CommandOracle::new(&options.oracle, subprocess.runner())),
        }
    }
}

/// A loaded and partitioned run that has not contacted any worker yet.
#[derive(Debug)]
pub struct Prepared {
    pub options: RunOptions,
    pub plan: RunPlan,
    pub num_queries: usize,
    pub partitions: Vec<Partition>,
    timings: PhaseTimings,
}

pub fn prepare(options: RunOptions, oracle: &dyn TopologyOracle) -> Result<Prepared> {
    let started = Instant::now();
    let queries = load_scenario(&options.scenario)?;
    let read = started.elapsed();
    info!(
        "Preparing to send {} queries from {}",
        queries.len(),
        options.scenario.display()
    );

    let started = Instant::now();
    let plan = RunPlan::resolve(&options, queries.len(), oracle)?;
    let mut partitions = make_partitions(&queries, &plan.strategy)?;
    if plan.sort {
        sort_by_target(&mut partitions);
    }
    let workload = started.elapsed();

    Ok(Prepared {
        options,
        num_queries: queries.len(),
        plan,
        partitions,
        timings: PhaseTimings {
            read,
            workload,
            ..PhaseTimings::default()
        },
    })
}

impl Prepared {
    /// Human-readable plan printed by `--dry-run`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} queries, strategy '{}', {} partitions",
            self.num_queries,
            self.plan.strategy.name(),
            self.partitions.len()
        );
        let _ = writeln!(out, "shared directory: {}", self.plan.shared_dir.display());
        let _ = writeln!(out, "experiments: {}", self.plan.diffs.join(" "));
        for (index, (partition, host)) in self.partitions.iter().zip(&self.plan.hosts).enumerate() {
            let _ = writeln!(out, "  [{index}] {host}: {} queries", partition.len());
        }
        out
    }

    pub fn dispatch(self, channels: &dyn ChannelFactory) -> Result<RunReport> {
        let dispatcher = Dispatcher::new(&self.plan.worker, self.plan.shared_dir.clone())?;
        let coordinator = Coordinator::new(&dispatcher, channels, &self.plan.hosts)
            .with_max_parallel(self.options.max_parallel);

        let num_partitions = self.partitions.len();
        let started = Instant::now();
        let outcomes = coordinator.run_experiments(self.partitions, &self.plan.diffs)?;
        let timings = PhaseTimings {
            process: started.elapsed(),
            ..self.timings
        };

        let report = RunReport::new(self.num_queries, num_partitions, timings, &outcomes);
        info!(
            "Run finished: {} results, {} failures in {:.3}s",
            report.summary.num_results, report.summary.num_failures, report.summary.t_process
        );
        Ok(report)
    }
}

/// Load, partition and dispatch; write or print the report.
///
/// Returns `None` for a dry run, after printing the plan.
pub fn execute(options: RunOptions, env: &RunEnv) -> Result<Option<RunReport>> {
    let prepared = prepare(options, env.oracle.as_ref())?;
    if prepared.options.dry_run {
        print!("{}", prepared.describe());
        return Ok(None);
    }

    let options = prepared.options.clone();
    let report = prepared.dispatch(env.channels.as_ref())?;
    match &options.output {
        Some(dir) => report.write_outputs(dir, &options)?,
        None => report.print(std::io::stdout().lock(), Path::new("<stdout>"))?,
    }
    if !report.failures.is_empty() {
        tracing::warn!(
            "{} partitions produced no result",
            report.failures.len()
        );
    }
    Ok(Some(report))
}
