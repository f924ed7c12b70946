//! Fan-out of one dispatch round per experiment, fan-in of its results.
//!
//! Each experiment (one diff name) opens a fresh channel per non-empty
//! partition and runs the tasks on a bounded thread pool. A failed task is
//! recorded as a `TaskFailure`; it never stops its siblings. Experiments run
//! one after another over the same partitions.

pub mod pool;

pub use pool::run_pool;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::channel::ChannelFactory;
use crate::dispatch::{DispatchTask, Dispatcher, ResultRecord};
use crate::error::{ChannelError, PartitionError};
use crate::partition::Partition;

/// A task that produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    pub experiment: usize,
    pub host: String,
    pub worker_id: usize,
    pub status: i32,
    pub message: String,
}

impl TaskFailure {
    fn new(experiment: usize, task: &DispatchTask, error: &ChannelError) -> Self {
        let message = match error {
            ChannelError::Status { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self {
            experiment,
            host: task.host.clone(),
            worker_id: task.worker_id,
            status: error.status(),
            message,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    pub index: usize,
    pub diff: String,
    /// `(partition index, record)`, ascending by partition index.
    pub results: Vec<(usize, ResultRecord)>,
    pub failures: Vec<TaskFailure>,
}

pub struct Coordinator<'a> {
    dispatcher: &'a Dispatcher,
    channels: &'a dyn ChannelFactory,
    hosts: &'a [String],
    max_parallel: Option<usize>,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        dispatcher: &'a Dispatcher,
        channels: &'a dyn ChannelFactory,
        hosts: &'a [String],
    ) -> Self {
        Self {
            dispatcher,
            channels,
            hosts,
            max_parallel: None,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: Option<usize>) -> Self {
        self.max_parallel = max_parallel.filter(|&n| n > 0);
        self
    }

    /// One task per non-empty partition, partition `i` on `hosts[i]`.
    ///
    /// Fails before any channel is used if there are more partitions than
    /// hosts or two tasks would share a response identity.
    pub fn plan_round(
        &self,
        partitions: &[Arc<Partition>],
        diff: &str,
    ) -> Result<Vec<DispatchTask>, PartitionError> {
        if partitions.len() > self.hosts.len() {
            return Err(PartitionError::TooManyPartitions {
                partitions: partitions.len(),
                hosts: self.hosts.len(),
            });
        }

        let mut identities = HashSet::new();
        let mut tasks = Vec::new();
        for (worker_id, (partition, host)) in partitions.iter().zip(self.hosts).enumerate() {
            if partition.is_empty() {
                debug!("Skipping empty partition {} for '{}'", worker_id, host);
                continue;
            }

            let channel = self.channels.open(host, worker_id);
            if !identities.insert(channel.response_identity().to_path_buf()) {
                return Err(PartitionError::DuplicateAssignment {
                    host: host.clone(),
                    worker_id,
                });
            }

            tasks.push(DispatchTask {
                host: host.clone(),
                worker_id,
                partition: Arc::clone(partition),
                diff: diff.to_string(),
                channel,
            });
        }
        Ok(tasks)
    }

    pub fn run_round(
        &self,
        index: usize,
        diff: &str,
        partitions: &[Arc<Partition>],
    ) -> Result<ExperimentOutcome, PartitionError> {
        let tasks = self.plan_round(partitions, diff)?;
        Ok(self.execute(index, diff, tasks))
    }

    /// Run every experiment in order; outcomes are experiment-major.
    ///
    /// All rounds are planned before the first one is dispatched.
    pub fn run_experiments(
        &self,
        partitions: Vec<Partition>,
        diffs: &[String],
    ) -> Result<Vec<ExperimentOutcome>, PartitionError> {
        let partitions: Vec<Arc<Partition>> = partitions.into_iter().map(Arc::new).collect();

        let rounds = diffs
            .iter()
            .map(|diff| self.plan_round(&partitions, diff))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rounds
            .into_iter()
            .zip(diffs)
            .enumerate()
            .map(|(index, (tasks, diff))| self.execute(index, diff, tasks))
            .collect())
    }

    fn execute(&self, index: usize, diff: &str, tasks: Vec<DispatchTask>) -> ExperimentOutcome {
        let threads = match self.max_parallel {
            Some(limit) => limit.min(tasks.len()),
            None => tasks.len(),
        };
        info!(
            "Experiment {} ({}): dispatching {} partitions on {} threads",
            index,
            diff,
            tasks.len(),
            threads
        );

        let progress = create_progress_bar(tasks.len());
        progress.set_message(format!("experiment {index}"));

        let completed = run_pool(tasks, threads, |task| {
            let outcome = self.dispatcher.dispatch(task);
            progress.inc(1);
            match outcome {
                Ok(record) => Ok((task.worker_id, record)),
                Err(e) => {
                    let failure = TaskFailure::new(index, task, &e);
                    warn!(
                        "Partition {} on '{}' failed with status {}: {}",
                        failure.worker_id, failure.host, failure.status, failure.message
                    );
                    Err(failure)
                }
            }
        });

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (_, outcome) in completed {
            match outcome {
                Ok(result) => results.push(result),
                Err(failure) => failures.push(failure),
            }
        }
        results.sort_by_key(|(partition, _)| *partition);
        failures.sort_by_key(|failure| failure.worker_id);

        progress.finish_with_message(format!(
            "experiment {index}: {} ok, {} failed",
            results.len(),
            failures.len()
        ));
        info!(
            "Experiment {} completed: {} results, {} failures",
            index,
            results.len(),
            failures.len()
        );

        ExperimentOutcome {
            index,
            diff: diff.to_string(),
            results,
            failures,
        }
    }
}

fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ");
    pb.set_style(style);
    pb
}
