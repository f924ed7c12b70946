//! Run configuration.
//!
//! `ClusterConfig` is the optional file describing the fleet (JSON or YAML);
//! command-line flags override whatever it sets. `WorkerConfig` is the fixed
//! record sent to the workers.

pub mod worker;

pub use worker::WorkerConfig;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_REQUEST_PIPE: &str = "/tmp/warthog.fifo";
pub const DEFAULT_RESPONSE_PIPE: &str = "/tmp/warthog.answer";
pub const DEFAULT_ORACLE: &str = "./bin/gen_distribute_conf";
pub const DEFAULT_SHARED_DIR: &str = "/srv/data";

/// Partition key as written in cluster files: `100` and `"100"` both work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartKey {
    Number(u64),
    Text(String),
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartKey::Number(n) => write!(f, "{n}"),
            PartKey::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Worker hosts; worker `i` runs on `workers[i]`.
    pub workers: Vec<String>,
    /// Directory shared by the head and all workers, for query files.
    pub nfs: Option<PathBuf>,
    pub scenfile: Option<PathBuf>,
    /// One experiment per entry; `-` means no cost update.
    pub diffs: Vec<String>,
    pub partmethod: Option<String>,
    pub partkey: Option<PartKey>,
    pub xy_file: Option<PathBuf>,
    pub nodes: Option<u64>,
    /// Request pipe on each worker machine; `{worker}` expands to the worker id.
    pub fifo: Option<String>,
    pub answer: Option<String>,
    pub oracle: Option<String>,
    #[serde(with = "humantime_serde")]
    pub time_limit: Option<Duration>,
    pub ssh_program: Option<String>,
    pub ssh_options: Vec<String>,
    pub max_parallel: Option<usize>,
}

impl ClusterConfig {
    /// Load from `path`, picking the format from the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") | None => serde_json::from_str(&content)?,
            Some(other) => {
                return Err(Error::Config(format!(
                    "unsupported cluster config format '.{other}' ({})",
                    path.display()
                )))
            }
        };
        tracing::debug!("Loaded cluster config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_json_cluster_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cluster.json");
        std::fs::write(
            &path,
            r#"{
                "workers": ["node-0", "node-1"],
                "nfs": "/tmp",
                "partmethod": "mod",
                "partkey": 100,
                "scenfile": "./data/full.scen",
                "diffs": ["./data/melb-both.xy.diff"],
                "time_limit": "250ms"
            }"#,
        )
        .unwrap();

        let config = ClusterConfig::load(&path).unwrap();
        assert_eq!(config.workers, vec!["node-0", "node-1"]);
        assert_eq!(config.partkey, Some(PartKey::Number(100)));
        assert_eq!(config.partkey.unwrap().to_string(), "100");
        assert_eq!(config.time_limit, Some(Duration::from_millis(250)));
        assert!(config.fifo.is_none());
    }

    #[test]
    fn test_load_yaml_cluster_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cluster.yml");
        std::fs::write(
            &path,
            "workers: [localhost, localhost]\npartmethod: div\npartkey: \"10\"\nmax_parallel: 1\n",
        )
        .unwrap();

        let config = ClusterConfig::load(&path).unwrap();
        assert_eq!(config.workers.len(), 2);
        assert_eq!(config.partkey, Some(PartKey::Text("10".to_string())));
        assert_eq!(config.max_parallel, Some(1));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cluster.ini");
        std::fs::write(&path, "workers=a").unwrap();
        assert!(matches!(ClusterConfig::load(&path), Err(Error::Config(_))));
    }
}
