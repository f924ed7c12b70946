//! Node-to-worker mapping produced by the external topology tool.
//!
//! The mapping is a plain value: it is fetched once per round and handed to
//! the partitioner, never stored globally.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, FormatError, OracleError, Result};
use crate::query::NodeId;
use crate::subprocess::{ProcessCommand, ProcessRunner};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeMapping {
    workers: usize,
    owner: HashMap<NodeId, usize>,
}

impl NodeMapping {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            owner: HashMap::new(),
        }
    }

    /// Record that `node` lives on `worker`. Returns `false` if the worker id
    /// is outside the fleet.
    pub fn assign(&mut self, node: NodeId, worker: usize) -> bool {
        if worker >= self.workers {
            return false;
        }
        self.owner.insert(node, worker);
        true
    }

    pub fn worker_of(&self, node: NodeId) -> Option<usize> {
        self.owner.get(&node).copied()
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn len(&self) -> usize {
        self.owner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_empty()
    }
}

/// Parameters the topology tool is invoked with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequest {
    pub node_count: u64,
    pub worker_count: usize,
    pub method: String,
    pub key: String,
}

pub trait TopologyOracle: Send + Sync {
    fn node_mapping(&self, request: &OracleRequest) -> std::result::Result<NodeMapping, OracleError>;
}

/// Runs the distribution tool as a subprocess and parses its CSV output.
pub struct CommandOracle {
    program: String,
    runner: Arc<dyn ProcessRunner>,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    fn command(&self, request: &OracleRequest) -> ProcessCommand {
        ProcessCommand::new(&self.program)
            .arg("--nodenum")
            .arg(request.node_count.to_string())
            .arg("--maxworker")
            .arg(request.worker_count.to_string())
            .arg("--partmethod")
            .arg(&request.method)
            .arg("--partkey")
            .arg(&request.key)
    }
}

impl TopologyOracle for CommandOracle {
    fn node_mapping(&self, request: &OracleRequest) -> std::result::Result<NodeMapping, OracleError> {
        let output = self.runner.run(self.command(request))?;
        if !output.status.success() {
            let diagnostic = if output.stderr.trim().is_empty() {
                output.stdout
            } else {
                output.stderr
            };
            return Err(OracleError::Exit {
                status: output.status.code(),
                output: diagnostic.trim().to_string(),
            });
        }

        let mapping = parse_mapping(&output.stdout, request.worker_count)?;
        tracing::info!(
            "Topology tool mapped {} nodes onto {} workers",
            mapping.len(),
            mapping.worker_count()
        );
        Ok(mapping)
    }
}

/// Parse `node, workerId, blockId, blockIndex` rows following a header line.
pub fn parse_mapping(
    output: &str,
    worker_count: usize,
) -> std::result::Result<NodeMapping, OracleError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(output.as_bytes());

    let mut mapping = NodeMapping::new(worker_count);
    for record in reader.records() {
        let malformed = |line: usize, reason: String| OracleError::Malformed { line, reason };
        let record = record.map_err(|e| {
            malformed(e.position().map_or(0, |p| p.line() as usize), e.to_string())
        })?;
        let line = record.position().map_or(0, |p| p.line() as usize);

        let (node, worker, _block, _block_index): (NodeId, usize, u64, u64) = record
            .deserialize(None)
            .map_err(|e| malformed(line, e.to_string()))?;

        if !mapping.assign(node, worker) {
            return Err(malformed(
                line,
                format!("worker {worker} is outside a fleet of {worker_count}"),
            ));
        }
    }
    Ok(mapping)
}

/// Node count from a graph coordinate file: the second of four fields on
/// the fourth line.
pub fn read_node_count(path: &Path) -> Result<u64> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let missing = || FormatError::MissingNodeCount {
        path: path.to_path_buf(),
    };

    let line = content.lines().nth(3).ok_or_else(missing)?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 4 {
        return Err(missing().into());
    }
    fields[1].parse().map_err(|_| missing().into())
}
