//! Runtime settings shipped to every resident worker with each partition.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Search settings for one dispatch round.
///
/// Serialised as the JSON object on the first line of the wire payload; the
/// key names are what workers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Heuristic tolerance factor.
    #[serde(rename = "hscale")]
    pub heuristic_scale: f64,
    /// Sub-optimality factor.
    #[serde(rename = "fscale")]
    pub suboptimality_scale: f64,
    /// Per-query budget in nanoseconds, 0 for none.
    #[serde(rename = "time")]
    pub time_budget_ns: u64,
    #[serde(rename = "itrs")]
    pub iteration_cap: i64,
    /// Number of moves to extract, -1 for the whole path.
    #[serde(rename = "k_moves")]
    pub move_cap: i64,
    pub threads: u32,
    pub verbose: bool,
    pub debug: bool,
    pub thread_alloc: bool,
    pub no_cache: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            heuristic_scale: 1.0,
            suboptimality_scale: 0.0,
            time_budget_ns: 0,
            iteration_cap: -1,
            move_cap: -1,
            threads: 0,
            verbose: false,
            debug: false,
            thread_alloc: false,
            no_cache: false,
        }
    }
}

impl WorkerConfig {
    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget_ns = budget.map_or(0, |d| d.as_nanos().min(u64::MAX as u128) as u64);
        self
    }

    pub fn time_budget(&self) -> Option<Duration> {
        (self.time_budget_ns > 0).then(|| Duration::from_nanos(self.time_budget_ns))
    }

    /// Single-threaded, verbose workers for debugging a run.
    pub fn into_debug(mut self) -> Self {
        self.threads = 1;
        self.verbose = true;
        self.debug = true;
        self
    }

    pub fn to_wire(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
