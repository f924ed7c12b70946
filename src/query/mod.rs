//! Point-to-point queries and their on-disk forms.
//!
//! - `scenario` reads the scenario text a run starts from
//! - `file` reads and writes the per-partition query file handed to workers

pub mod file;
pub mod scenario;

pub use file::{parse_query_file, read_query_file, render_query_file, write_query_file};
pub use scenario::{load_scenario, parse_scenario};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index into the fixed node space of the graph the workers hold.
pub type NodeId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Query {
    pub source: NodeId,
    pub target: NodeId,
}

impl Query {
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self { source, target }
    }
}

impl From<(NodeId, NodeId)> for Query {
    fn from((source, target): (NodeId, NodeId)) -> Self {
        Self::new(source, target)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.source, self.target)
    }
}

/// Queries in scenario file order.
pub type QuerySet = Vec<Query>;
