//! # oracle-dispatch
//!
//! Distributes a batch of point-to-point shortest-path queries over a fleet of
//! resident worker processes and collects their per-partition statistics.
//!
//! ## Usage
//!
//! ```bash
//! oracle-dispatch run --scenario full.scen --hosts node-0 node-1 --mod 2 -o out/
//! ```
//!
//! ## Modules
//!
//! - `query` - Scenario parsing and the per-partition query file format
//! - `partition` - Partitioning strategies and the topology oracle
//! - `channel` - Request/response transport to one worker, local or over ssh
//! - `dispatch` - One partition, one round trip, one result record
//! - `coordinator` - Bounded thread pool fanning rounds out over the fleet
//! - `aggregate` - Run summary and the positional results table
//! - `run` - Option resolution and the end-to-end run driver
//! - `config` - Cluster file and the worker settings record
//! - `subprocess` - Blocking subprocess abstraction with a scriptable mock
//! - `cli` - Command-line surface
pub mod aggregate;
pub mod channel;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod partition;
pub mod query;
pub mod run;
pub mod subprocess;

pub use error::{Error, Result};
