//! Splitting a query set into one partition per worker.
//!
//! Partitioning is a pure function of the queries and the strategy: the same
//! inputs always give the same partitions, and the multiset union of the
//! partitions is exactly the input. Strategies that assign by target id
//! (`mod`, `div`, `alloc`, `topology`) fail rather than drop a query they
//! cannot place.

pub mod topology;


pub use topology::{read_node_count, CommandOracle, NodeMapping, OracleRequest, TopologyOracle};

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::PartitionError;
use crate::query::{NodeId, Query};

/// Queries assigned to one worker for one dispatch round. May be empty.
pub type Partition = Vec<Query>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Range,
    All,
    Mod,
    Div,
    Alloc,
    Topology,
}

impl FromStr for StrategyKind {
    type Err = PartitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "range" => Ok(Self::Range),
            "all" => Ok(Self::All),
            "mod" => Ok(Self::Mod),
            "div" => Ok(Self::Div),
            "alloc" => Ok(Self::Alloc),
            "topology" => Ok(Self::Topology),
            other => Err(PartitionError::UnknownStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Contiguous slices of `ceil(total / parts)` queries.
    Range { parts: usize },
    /// Whole target groups, in ascending target order, packed greedily until
    /// a partition holds more than `threshold` queries.
    All { parts: usize, threshold: usize },
    /// `target mod modulus`.
    Mod { modulus: u64 },
    /// `target div divisor`, over `parts` partitions.
    Div { divisor: u64, parts: usize },
    /// Index of the first boundary strictly above the target.
    Alloc { boundaries: Vec<NodeId> },
    /// Worker owning the target according to the topology oracle.
    Topology { mapping: NodeMapping },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Range { .. } => "range",
            Strategy::All { .. } => "all",
            Strategy::Mod { .. } => "mod",
            Strategy::Div { .. } => "div",
            Strategy::Alloc { .. } => "alloc",
            Strategy::Topology { .. } => "topology",
        }
    }

    pub fn partition_count(&self) -> usize {
        match self {
            Strategy::Range { parts }
            | Strategy::All { parts, .. }
            | Strategy::Div { parts, .. } => *parts,
            Strategy::Mod { modulus } => *modulus as usize,
            Strategy::Alloc { boundaries } => boundaries.len(),
            Strategy::Topology { mapping } => mapping.worker_count(),
        }
    }

    /// Check the strategy against the fleet before anything is dispatched.
    ///
    /// Key-based strategies must produce exactly one partition per host;
    /// the others must not produce more partitions than there are hosts.
    pub fn validate(&self, hosts: usize) -> Result<(), PartitionError> {
        self.check_parameters()?;

        let partitions = self.partition_count();
        match self {
            Strategy::Mod { .. } | Strategy::Div { .. } | Strategy::Alloc { .. } => {
                if partitions != hosts {
                    return Err(PartitionError::HostCountMismatch {
                        strategy: self.name(),
                        partitions,
                        hosts,
                    });
                }
            }
            Strategy::Range { .. } | Strategy::All { .. } | Strategy::Topology { .. } => {
                if partitions > hosts {
                    return Err(PartitionError::TooManyPartitions { partitions, hosts });
                }
            }
        }
        Ok(())
    }

    fn check_parameters(&self) -> Result<(), PartitionError> {
        match self {
            Strategy::Mod { modulus: 0 } => Err(PartitionError::ZeroKey { strategy: "mod" }),
            Strategy::Div { divisor: 0, .. } => Err(PartitionError::ZeroKey { strategy: "div" }),
            Strategy::Alloc { boundaries } => check_boundaries(boundaries),
            _ if self.partition_count() == 0 => Err(PartitionError::NoPartitions),
            _ => Ok(()),
        }
    }
}

fn check_boundaries(boundaries: &[NodeId]) -> Result<(), PartitionError> {
    if boundaries.is_empty() {
        return Err(PartitionError::NoPartitions);
    }
    for (index, pair) in boundaries.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(PartitionError::NonMonotonicBoundaries {
                index: index + 1,
                previous: pair[0],
                value: pair[1],
            });
        }
    }
    Ok(())
}

/// Size threshold used by `all` when none is given: `total / parts + 1`.
pub fn default_threshold(total: usize, parts: usize) -> usize {
    total / parts.max(1) + 1
}

/// Split `queries` into partitions according to `strategy`.
///
/// Partition `i` is meant for worker `i`. Relative query order inside a
/// partition follows the input order.
pub fn make_partitions(
    queries: &[Query],
    strategy: &Strategy,
) -> Result<Vec<Partition>, PartitionError> {
    strategy.check_parameters()?;

    let parts = match strategy {
        Strategy::Range { parts } => by_range(queries, *parts),
        Strategy::All { parts, threshold } => by_target_groups(queries, *parts, *threshold),
        Strategy::Mod { modulus } => by_key(queries, *modulus as usize, |target| {
            Ok((target % modulus) as usize)
        })?,
        Strategy::Div { divisor, parts } => by_key(queries, *parts, |target| {
            let index = target / divisor;
            if index >= *parts as u64 {
                return Err(out_of_range("div", target, *parts));
            }
            Ok(index as usize)
        })?,
        Strategy::Alloc { boundaries } => by_key(queries, boundaries.len(), |target| {
            let index = boundaries.partition_point(|&bound| bound <= target);
            if index == boundaries.len() {
                return Err(out_of_range("alloc", target, boundaries.len()));
            }
            Ok(index)
        })?,
        Strategy::Topology { mapping } => by_key(queries, mapping.worker_count(), |target| {
            mapping
                .worker_of(target)
                .ok_or(PartitionError::UnmappedTarget { target })
        })?,
    };

    tracing::debug!(
        "Partitioned {} queries with '{}' into sizes {:?}",
        queries.len(),
        strategy.name(),
        parts.iter().map(Vec::len).collect::<Vec<_>>()
    );
    Ok(parts)
}

/// Sort every partition by target id. Membership is unchanged.
pub fn sort_by_target(parts: &mut [Partition]) {
    for part in parts.iter_mut() {
        part.sort_by_key(|query| query.target);
    }
}

fn out_of_range(strategy: &'static str, target: NodeId, partitions: usize) -> PartitionError {
    PartitionError::TargetOutOfRange {
        strategy,
        target,
        partitions,
    }
}

fn by_range(queries: &[Query], parts: usize) -> Vec<Partition> {
    let mut out = vec![Vec::new(); parts];
    let size = queries.len().div_ceil(parts).max(1);
    for (slot, chunk) in out.iter_mut().zip(queries.chunks(size)) {
        slot.extend_from_slice(chunk);
    }
    out
}

fn by_target_groups(queries: &[Query], parts: usize, threshold: usize) -> Vec<Partition> {
    let mut groups: BTreeMap<NodeId, Vec<Query>> = BTreeMap::new();
    for query in queries {
        groups.entry(query.target).or_default().push(*query);
    }

    let mut out = vec![Vec::new(); parts];
    let mut current = 0;
    for group in groups.into_values() {
        out[current].extend(group);
        // The last partition takes whatever is left.
        if out[current].len() > threshold && current + 1 < parts {
            current += 1;
        }
    }
    out
}

fn by_key<F>(queries: &[Query], parts: usize, key: F) -> Result<Vec<Partition>, PartitionError>
where
    F: Fn(NodeId) -> Result<usize, PartitionError>,
{
    let mut out = vec![Vec::new(); parts];
    for query in queries {
        out[key(query.target)?].push(*query);
    }
    Ok(out)
}
