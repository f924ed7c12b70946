//! Command routing and execution
//!
//! Merges command-line flags over the optional cluster file and hands the
//! result to the run driver.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::channel::ChannelSettings;
use crate::cli::args::{Commands, OracleArgs, RunArgs, TopologyArgs};
use crate::config::{
    ClusterConfig, WorkerConfig, DEFAULT_ORACLE, DEFAULT_REQUEST_PIPE, DEFAULT_RESPONSE_PIPE,
    DEFAULT_SHARED_DIR,
};
use crate::dispatch::NO_DIFF;
use crate::partition::{read_node_count, CommandOracle, OracleRequest, TopologyOracle};
use crate::run::{self, RunEnv, RunOptions, StrategyOptions, TopologyOptions, DEFAULT_CUTOFF};
use crate::subprocess::SubprocessManager;

/// Execute a CLI command based on the parsed arguments
pub fn execute_command(command: Commands, verbose: u8) -> Result<()> {
    match command {
        Commands::Run(args) => run_command(args, verbose),
        Commands::Topology(args) => topology_command(args),
    }
}

fn load_cluster(path: Option<&PathBuf>) -> Result<ClusterConfig> {
    match path {
        Some(path) => ClusterConfig::load(path)
            .with_context(|| format!("Failed to load cluster config {}", path.display())),
        None => Ok(ClusterConfig::default()),
    }
}

fn run_command(args: RunArgs, verbose: u8) -> Result<()> {
    let cluster = load_cluster(args.config.as_ref())?;
    let options = build_run_options(args, cluster, verbose)?;
    debug!("Resolved run options: {:?}", options);

    let env = RunEnv::production(&options);
    let scenario = options.scenario.clone();
    run::execute(options, &env)
        .with_context(|| format!("Run over {} failed", scenario.display()))?;
    Ok(())
}

/// Merge flags over the cluster file; flags win.
pub fn build_run_options(args: RunArgs, cluster: ClusterConfig, verbose: u8) -> Result<RunOptions> {
    let scenario = args
        .scenario
        .or(cluster.scenfile)
        .context("No scenario given (use --scenario or 'scenfile' in the cluster file)")?;

    let hosts = if args.hosts.is_empty() {
        cluster.workers
    } else {
        args.hosts
    };
    let shared_dir = args
        .nfs
        .or(cluster.nfs)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SHARED_DIR));
    let diffs = if !args.diffs.is_empty() {
        args.diffs
    } else if !cluster.diffs.is_empty() {
        cluster.diffs
    } else {
        vec![NO_DIFF.to_string()]
    };

    let partition = args.partition;
    let keyed_flag = partition.divisor.is_some()
        || partition.modulus.is_some()
        || !partition.alloc.is_empty();
    let wants_topology =
        partition.topology || (!keyed_flag && cluster.partmethod.is_some());
    let topology = if wants_topology {
        Some(topology_options(
            &partition.oracle,
            cluster.partmethod.as_deref(),
            cluster.partkey.as_ref().map(ToString::to_string),
            cluster.nodes,
            cluster.xy_file.clone(),
        )?)
    } else {
        None
    };

    let strategy = StrategyOptions {
        group: partition.group.unwrap_or_else(|| "range".to_string()),
        num_partitions: partition.num_partitions,
        size_partitions: partition.size_partitions,
        threshold: partition.threshold,
        divisor: partition.divisor,
        modulus: partition.modulus,
        alloc: (!partition.alloc.is_empty()).then_some(partition.alloc),
        topology,
    };

    let search = args.search;
    let worker = WorkerConfig {
        heuristic_scale: search.h_scale,
        suboptimality_scale: search.f_scale,
        move_cap: search.k_moves,
        threads: search.omp,
        verbose: verbose > 0,
        debug: args.debug,
        thread_alloc: search.thread_alloc,
        no_cache: search.no_cache,
        ..WorkerConfig::default()
    }
    .with_time_budget(search.time_limit.or(cluster.time_limit));

    let channels = ChannelSettings {
        request_pipe: args
            .fifo
            .or(cluster.fifo)
            .unwrap_or_else(|| DEFAULT_REQUEST_PIPE.to_string()),
        response_pipe: args
            .answer
            .or(cluster.answer)
            .unwrap_or_else(|| DEFAULT_RESPONSE_PIPE.to_string()),
        script_dir: shared_dir.clone(),
        ssh_program: args
            .ssh
            .or(cluster.ssh_program)
            .unwrap_or_else(|| "ssh".to_string()),
        ssh_options: cluster.ssh_options,
    };

    Ok(RunOptions {
        scenario,
        hosts,
        shared_dir,
        diffs,
        strategy,
        sort: partition.sort,
        cutoff: args.cutoff.unwrap_or(DEFAULT_CUTOFF),
        worker,
        debug: args.debug,
        max_parallel: args.max_parallel.or(cluster.max_parallel),
        output: args.output,
        dry_run: args.dry_run,
        oracle: partition
            .oracle
            .oracle
            .or(cluster.oracle)
            .unwrap_or_else(|| DEFAULT_ORACLE.to_string()),
        channels,
    })
}

fn topology_options(
    flags: &OracleArgs,
    method: Option<&str>,
    key: Option<String>,
    nodes: Option<u64>,
    xy_file: Option<PathBuf>,
) -> Result<TopologyOptions> {
    let method = flags
        .partmethod
        .as_deref()
        .or(method)
        .context("Topology partitioning needs --partmethod (or 'partmethod' in the cluster file)")?;
    let key = flags
        .partkey
        .clone()
        .or(key)
        .context("Topology partitioning needs --partkey (or 'partkey' in the cluster file)")?;

    Ok(TopologyOptions {
        method: method.to_string(),
        key,
        nodes: flags.nodes.or(nodes),
        xy_file: flags.xy_file.clone().or(xy_file),
    })
}

fn topology_command(args: TopologyArgs) -> Result<()> {
    let cluster = load_cluster(args.config.as_ref())?;
    let workers = args.workers.unwrap_or(cluster.workers.len());
    anyhow::ensure!(workers > 0, "No workers given (use --workers or a cluster file)");

    let options = topology_options(
        &args.oracle,
        cluster.partmethod.as_deref(),
        cluster.partkey.as_ref().map(ToString::to_string),
        cluster.nodes,
        cluster.xy_file.clone(),
    )?;
    let node_count = match (options.nodes, &options.xy_file) {
        (Some(nodes), _) => nodes,
        (None, Some(path)) => read_node_count(path)?,
        (None, None) => anyhow::bail!("No node count given (use --nodes or --xy-file)"),
    };

    let program = args
        .oracle
        .oracle
        .or(cluster.oracle)
        .unwrap_or_else(|| DEFAULT_ORACLE.to_string());
    let oracle: Arc<dyn TopologyOracle> = Arc::new(CommandOracle::new(
        program,
        SubprocessManager::production().runner(),
    ));
    let request = OracleRequest {
        node_count,
        worker_count: workers,
        method: options.method,
        key: options.key,
    };
    let mapping = oracle
        .node_mapping(&request)
        .context("Topology tool failed")?;
    info!("Mapped {} of {} nodes", mapping.len(), node_count);

    let mut per_worker: BTreeMap<usize, u64> = (0..workers).map(|w| (w, 0)).collect();
    for node in 0..node_count {
        if let Some(worker) = mapping.worker_of(node) {
            *per_worker.entry(worker).or_default() += 1;
        }
    }
    for (worker, count) in per_worker {
        println!("worker {worker}: {count} nodes");
    }
    Ok(())
}
