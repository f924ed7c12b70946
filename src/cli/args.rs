//! CLI argument structures
//!
//! Every fleet setting can also come from a cluster file passed with
//! `--config`; flags given on the command line win.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Distribute shortest-path queries over resident workers
#[derive(Parser, Debug)]
#[command(name = "oracle-dispatch")]
#[command(about = "oracle-dispatch - Distribute shortest-path queries over resident workers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Partition a scenario and dispatch it to the workers
    #[command(name = "run")]
    Run(RunArgs),

    /// Ask the topology tool for its node-to-worker mapping and summarise it
    #[command(name = "topology")]
    Topology(TopologyArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Cluster file (JSON or YAML) with workers, shared directory and diffs
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Scenario file to read queries from
    #[arg(long)]
    pub scenario: Option<PathBuf>,

    /// Worker hosts; worker i runs on the i-th host ('localhost' for pipes on this machine)
    #[arg(long = "hosts", alias = "local", num_args = 1.., value_name = "HOST")]
    pub hosts: Vec<String>,

    /// Shared directory the query files are written to
    #[arg(long)]
    pub nfs: Option<PathBuf>,

    /// Diff files for cost updates, one experiment each; '-' means no update
    #[arg(long, num_args = 1.., value_name = "DIFF")]
    pub diffs: Vec<String>,

    /// Debug mode: one partition, single-threaded verbose workers
    #[arg(short = 'D', long)]
    pub debug: bool,

    #[command(flatten)]
    pub partition: PartitionArgs,

    #[command(flatten)]
    pub search: SearchArgs,

    /// Minimum number of queries before work is distributed
    #[arg(long)]
    pub cutoff: Option<usize>,

    /// Request pipe on each worker machine; '{worker}' expands to the worker id
    #[arg(long)]
    pub fifo: Option<String>,

    /// Response pipe prefix; host and worker id are appended
    #[arg(long)]
    pub answer: Option<String>,

    /// Remote shell program used to reach worker hosts
    #[arg(long)]
    pub ssh: Option<String>,

    /// Maximum number of partitions dispatched at once
    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Directory to write metrics.json, data.json and parts.csv to
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Show the partitioning plan without contacting any worker
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct PartitionArgs {
    /// Number of partitions
    #[arg(short = 'p', long, conflicts_with = "size_partitions")]
    pub num_partitions: Option<usize>,

    /// Number of queries per partition
    #[arg(short = 's', long)]
    pub size_partitions: Option<usize>,

    /// Group by target ('all') instead of contiguous ranges
    #[arg(long, value_parser = ["range", "all"])]
    pub group: Option<String>,

    /// Size bound for '--group all' partitions
    #[arg(long)]
    pub threshold: Option<usize>,

    /// Assign queries to host (target / div)
    #[arg(long = "div", group = "keyed")]
    pub divisor: Option<u64>,

    /// Assign queries to host (target % mod)
    #[arg(long = "mod", group = "keyed")]
    pub modulus: Option<u64>,

    /// Strictly increasing node boundaries, one per host
    #[arg(long, num_args = 1.., value_name = "NODE", group = "keyed")]
    pub alloc: Vec<u64>,

    /// Assign queries by the topology tool's node mapping
    #[arg(long, group = "keyed")]
    pub topology: bool,

    #[command(flatten)]
    pub oracle: OracleArgs,

    /// Sort each partition by target before sending
    #[arg(long)]
    pub sort: bool,
}

#[derive(Args, Debug, Default)]
pub struct OracleArgs {
    /// Partition method passed to the topology tool
    #[arg(long)]
    pub partmethod: Option<String>,

    /// Partition key passed to the topology tool
    #[arg(long)]
    pub partkey: Option<String>,

    /// Number of nodes in the graph
    #[arg(long)]
    pub nodes: Option<u64>,

    /// Graph coordinate file to read the node count from
    #[arg(long)]
    pub xy_file: Option<PathBuf>,

    /// Topology tool executable
    #[arg(long)]
    pub oracle: Option<String>,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Per-query time budget for the workers (e.g. 500us, 2ms, 1s)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub time_limit: Option<Duration>,

    /// Number of moves to extract, -1 for the whole path
    #[arg(short = 'k', long, default_value = "-1", allow_negative_numbers = true)]
    pub k_moves: i64,

    /// Heuristic tolerance factor
    #[arg(long, default_value = "1.0")]
    pub h_scale: f64,

    /// Sub-optimality factor
    #[arg(long, default_value = "0.0")]
    pub f_scale: f64,

    /// Worker threads per partition, 0 for the worker's default
    #[arg(long, default_value = "0")]
    pub omp: u32,

    /// Use thread allocation in the workers
    #[arg(long)]
    pub thread_alloc: bool,

    /// Disable the workers' runtime cache
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Args, Debug)]
pub struct TopologyArgs {
    /// Cluster file (JSON or YAML) providing workers and partitioning settings
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Number of workers; defaults to the cluster file's worker count
    #[arg(long)]
    pub workers: Option<usize>,

    #[command(flatten)]
    pub oracle: OracleArgs,
}
