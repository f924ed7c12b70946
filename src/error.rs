//! Error taxonomy for a dispatch run.
//!
//! `FormatError`, `PartitionError` and `OracleError` are detected before any
//! partition is sent and abort the run. `ChannelError` belongs to a single
//! dispatch task and never escapes the coordinator.

use std::path::PathBuf;
use thiserror::Error;

use crate::subprocess::ProcessError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Partition error: {0}")]
    Partition(#[from] PartitionError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Malformed scenario or query file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("line {line}: expected source and target, found '{content}'")]
    MissingFields { line: usize, content: String },

    #[error("line {line}: expected only source and target, found '{content}'")]
    TrailingFields { line: usize, content: String },

    #[error("line {line}: '{token}' is not a node id")]
    InvalidNodeId { line: usize, token: String },

    #[error("query file has no count header")]
    MissingHeader,

    #[error("query file declares {declared} queries but holds {actual}")]
    CountMismatch { declared: usize, actual: usize },

    #[error("graph file {path} has no node count on line 4")]
    MissingNodeCount { path: PathBuf },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("unknown partition strategy '{0}'")]
    UnknownStrategy(String),

    #[error("{strategy} produces {partitions} partitions but {hosts} hosts are available")]
    HostCountMismatch {
        strategy: &'static str,
        partitions: usize,
        hosts: usize,
    },

    #[error("{partitions} partitions requested but only {hosts} hosts are available")]
    TooManyPartitions { partitions: usize, hosts: usize },

    #[error("at least one partition is required")]
    NoPartitions,

    #[error("{strategy} key must be non-zero")]
    ZeroKey { strategy: &'static str },

    #[error("alloc boundaries must be strictly increasing (index {index}: {value} <= {previous})")]
    NonMonotonicBoundaries {
        index: usize,
        previous: u64,
        value: u64,
    },

    #[error("target {target} falls outside the {partitions} partitions of {strategy}")]
    TargetOutOfRange {
        strategy: &'static str,
        target: u64,
        partitions: usize,
    },

    #[error("target {target} has no worker in the topology mapping")]
    UnmappedTarget { target: u64 },

    #[error("worker {worker_id} on '{host}' is assigned more than once in a round")]
    DuplicateAssignment { host: String, worker_id: usize },
}

/// Failure of one dispatch task. Isolated: siblings keep running.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("'{host}' answered with status {status}: {message}")]
    Status {
        host: String,
        status: i32,
        message: String,
    },

    #[error("'{host}' sent an unreadable response '{line}': {reason}")]
    MalformedResponse {
        host: String,
        line: String,
        reason: String,
    },

    #[error("I/O failure talking to '{host}' via {path}: {source}")]
    Io {
        host: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not run remote script on '{host}': {source}")]
    Process {
        host: String,
        #[source]
        source: ProcessError,
    },
}

impl ChannelError {
    /// Shell-style status of the failure; transport errors report -1.
    pub fn status(&self) -> i32 {
        match self {
            ChannelError::Status { status, .. } => *status,
            _ => -1,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            ChannelError::Status { host, .. }
            | ChannelError::MalformedResponse { host, .. }
            | ChannelError::Io { host, .. }
            | ChannelError::Process { host, .. } => host,
        }
    }
}

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("topology tool exited with status {status}: {output}")]
    Exit { status: i32, output: String },

    #[error("topology tool output line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("could not run topology tool: {0}")]
    Process(#[from] ProcessError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_status_and_host() {
        let err = ChannelError::Status {
            host: "node-3".to_string(),
            status: 255,
            message: "Connection refused".to_string(),
        };
        assert_eq!(err.status(), 255);
        assert_eq!(err.host(), "node-3");
        assert!(err.to_string().contains("status 255"));

        let err = ChannelError::MalformedResponse {
            host: "localhost".to_string(),
            line: "garbage".to_string(),
            reason: "expected 10 fields".to_string(),
        };
        assert_eq!(err.status(), -1);
        assert_eq!(err.host(), "localhost");
    }

    #[test]
    fn test_errors_convert_into_run_error() {
        let err: Error = PartitionError::ZeroKey { strategy: "mod" }.into();
        assert!(matches!(err, Error::Partition(_)));
        assert_eq!(err.to_string(), "Partition error: mod key must be non-zero");

        let err: Error = FormatError::MissingHeader.into();
        assert!(err.to_string().starts_with("Format error"));
    }
}
