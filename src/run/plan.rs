//! Turning run options into a concrete fleet and partitioning strategy.

use std::path::PathBuf;
use tracing::{debug, info};

use super::{RunOptions, StrategyOptions};
use crate::channel::LOCAL_HOST;
use crate::config::WorkerConfig;
use crate::error::{Error, PartitionError, Result};
use crate::partition::{
    default_threshold, read_node_count, OracleRequest, Strategy, StrategyKind, TopologyOracle,
};

/// Shared directory used when a run is forced onto this machine.
pub const LOCAL_SHARED_DIR: &str = "/tmp";

/// Partition count when neither a count nor a size is given.
pub const DEFAULT_PARTITIONS: usize = 5;

/// Everything a dispatch needs once options have been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub hosts: Vec<String>,
    pub shared_dir: PathBuf,
    pub worker: WorkerConfig,
    pub strategy: Strategy,
    pub sort: bool,
    pub diffs: Vec<String>,
    /// True when the run was pulled onto `localhost`.
    pub forced_local: bool,
}

impl RunPlan {
    /// Resolve `options` for a scenario of `total` queries.
    ///
    /// The topology oracle is only consulted for the topology strategy. Any
    /// mismatch between strategy and fleet is reported here, before anything
    /// is dispatched.
    pub fn resolve(
        options: &RunOptions,
        total: usize,
        oracle: &dyn TopologyOracle,
    ) -> Result<Self> {
        let mut worker = options.worker.clone();
        let mut num_partitions = requested_partitions(&options.strategy, total);
        if options.debug {
            worker = worker.into_debug();
            num_partitions = 1;
        }

        let forced_local = options.hosts.is_empty() || total < options.cutoff;
        let (hosts, shared_dir) = if forced_local {
            info!(
                "Running locally ({} queries, cutoff {}, {} hosts)",
                total,
                options.cutoff,
                options.hosts.len()
            );
            (vec![LOCAL_HOST.to_string()], PathBuf::from(LOCAL_SHARED_DIR))
        } else {
            (options.hosts.clone(), options.shared_dir.clone())
        };
        if forced_local {
            num_partitions = 1;
        }
        check_header_token("shared directory", &shared_dir.to_string_lossy())?;
        check_header_token("response pipe prefix", &options.channels.response_pipe)?;
        for host in &hosts {
            check_header_token("host", host)?;
        }

        // Key-based strategies are meaningless on a single local worker.
        let keyed = if forced_local {
            None
        } else {
            keyed_strategy(options, hosts.len(), oracle)?
        };
        let strategy = match keyed {
            Some(strategy) => strategy,
            None => group_strategy(&options.strategy, num_partitions, total)?,
        };
        strategy.validate(hosts.len())?;
        debug!(
            "Resolved strategy '{}' with {} partitions over {} hosts",
            strategy.name(),
            strategy.partition_count(),
            hosts.len()
        );

        let diffs = if options.diffs.is_empty() {
            vec![crate::dispatch::NO_DIFF.to_string()]
        } else {
            options.diffs.clone()
        };

        Ok(Self {
            hosts,
            shared_dir,
            worker,
            strategy,
            sort: options.sort,
            diffs,
            forced_local,
        })
    }
}

/// Paths and hosts end up as tokens of the space-separated payload header.
fn check_header_token(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(Error::Config(format!(
            "{what} '{value}' must be non-empty and contain no whitespace"
        )));
    }
    Ok(())
}

fn requested_partitions(strategy: &StrategyOptions, total: usize) -> usize {
    match (strategy.num_partitions, strategy.size_partitions) {
        (Some(parts), _) => parts,
        (None, Some(size)) => (total / size.max(1)).max(1),
        (None, None) => DEFAULT_PARTITIONS,
    }
}

/// `range` or `all` over `parts` partitions.
fn group_strategy(options: &StrategyOptions, parts: usize, total: usize) -> Result<Strategy> {
    match options.group.parse::<StrategyKind>()? {
        StrategyKind::Range => Ok(Strategy::Range { parts }),
        StrategyKind::All => Ok(Strategy::All {
            parts,
            threshold: options
                .threshold
                .unwrap_or_else(|| default_threshold(total, parts)),
        }),
        _ => Err(PartitionError::UnknownStrategy(format!(
            "{} (expected range or all)",
            options.group
        ))
        .into()),
    }
}

/// The key-based strategy selected by the options, if any. `div`, `mod`,
/// `alloc` and `topology` are tried in that order.
fn keyed_strategy(
    options: &RunOptions,
    hosts: usize,
    oracle: &dyn TopologyOracle,
) -> Result<Option<Strategy>> {
    let strategy = &options.strategy;
    if let Some(divisor) = strategy.divisor {
        return Ok(Some(Strategy::Div {
            divisor,
            parts: hosts,
        }));
    }
    if let Some(modulus) = strategy.modulus {
        return Ok(Some(Strategy::Mod { modulus }));
    }
    if let Some(boundaries) = &strategy.alloc {
        return Ok(Some(Strategy::Alloc {
            boundaries: boundaries.clone(),
        }));
    }
    let Some(topology) = &strategy.topology else {
        return Ok(None);
    };

    let node_count = match (topology.nodes, &topology.xy_file) {
        (Some(nodes), _) => nodes,
        (None, Some(path)) => read_node_count(path)?,
        (None, None) => {
            return Err(Error::Config(
                "topology partitioning needs a node count or a graph coordinate file".to_string(),
            ))
        }
    };
    let request = OracleRequest {
        node_count,
        worker_count: hosts,
        method: topology.method.clone(),
        key: topology.key.clone(),
    };
    info!(
        "Asking topology tool for {} nodes over {} workers ({} {})",
        request.node_count, request.worker_count, request.method, request.key
    );
    let mapping = oracle.node_mapping(&request)?;
    Ok(Some(Strategy::Topology { mapping }))
}
