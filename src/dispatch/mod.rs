//! One partition, one worker, one round trip.
//!
//! The dispatcher writes the partition to a query file in shared storage,
//! sends the wire payload over the task's channel and turns the answer into a
//! `ResultRecord`. The query file is removed only after a successful answer,
//! so a worker that is still reading never loses its input; failed tasks
//! leave their files behind for inspection.

pub mod payload;
pub mod record;

pub use payload::{WirePayload, NO_DIFF};
pub use record::{ResultRecord, WorkerStats};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::config::WorkerConfig;
use crate::error::ChannelError;
use crate::partition::Partition;
use crate::query::write_query_file;

/// Unit of work for the coordinator.
///
/// `worker_id` is also the index of the partition in the round.
pub struct DispatchTask {
    pub host: String,
    pub worker_id: usize,
    pub partition: Arc<Partition>,
    pub diff: String,
    pub channel: Box<dyn Channel>,
}

impl std::fmt::Debug for DispatchTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTask")
            .field("host", &self.host)
            .field("worker_id", &self.worker_id)
            .field("queries", &self.partition.len())
            .field("diff", &self.diff)
            .field("channel", &self.channel.kind())
            .finish()
    }
}

pub struct Dispatcher {
    config_json: String,
    shared_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(config: &WorkerConfig, shared_dir: impl Into<PathBuf>) -> serde_json::Result<Self> {
        Ok(Self {
            config_json: config.to_wire()?,
            shared_dir: shared_dir.into(),
        })
    }

    pub fn shared_dir(&self) -> &Path {
        &self.shared_dir
    }

    /// Query file for `(host, worker)`; unique per task within a round.
    pub fn query_path(&self, host: &str, worker_id: usize) -> PathBuf {
        self.shared_dir
            .join(format!("query.{}.{}", host, worker_id))
    }

    pub fn dispatch(&self, task: &DispatchTask) -> Result<ResultRecord, ChannelError> {
        let query_path = self.query_path(&task.host, task.worker_id);

        let started = Instant::now();
        write_query_file(&query_path, &task.partition).map_err(|source| ChannelError::Io {
            host: task.host.clone(),
            path: query_path.clone(),
            source,
        })?;
        let t_prepare = started.elapsed();

        let payload = WirePayload {
            config_json: &self.config_json,
            query_file: &query_path,
            response_identity: task.channel.response_identity(),
            diff: &task.diff,
        }
        .to_string();

        info!(
            "Processing {} queries on '{}'",
            task.partition.len(),
            task.host
        );
        let started = Instant::now();
        let reply = task.channel.send(&payload)?;
        let t_partition = started.elapsed();

        if !reply.is_success() {
            return Err(ChannelError::Status {
                host: task.host.clone(),
                status: reply.status,
                message: reply.line,
            });
        }

        let stats: WorkerStats =
            reply
                .line
                .parse()
                .map_err(|reason| ChannelError::MalformedResponse {
                    host: task.host.clone(),
                    line: reply.line.clone(),
                    reason,
                })?;

        if let Err(e) = std::fs::remove_file(&query_path) {
            warn!("Could not remove {}: {}", query_path.display(), e);
        }
        if let Err(e) = task.channel.cleanup() {
            warn!("Could not clean up channel to '{}': {}", task.host, e);
        }

        debug!(
            "Worker {} on '{}' answered in {:?}",
            task.worker_id, task.host, t_partition
        );
        Ok(ResultRecord::new(
            stats,
            t_prepare,
            t_partition,
            task.partition.len(),
        ))
    }
}
