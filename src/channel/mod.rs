//! Synchronous request/response transport to one resident worker.
//!
//! A channel is opened for a single `(host, worker)` pair and used for the
//! whole of one dispatch task. Its response identity embeds both, so two
//! tasks in flight at the same time can never read each other's answers.

pub mod local;
pub mod remote;

pub use local::LocalChannel;
pub use remote::RemoteChannel;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{DEFAULT_REQUEST_PIPE, DEFAULT_RESPONSE_PIPE, DEFAULT_SHARED_DIR};
use crate::error::ChannelError;
use crate::subprocess::ProcessRunner;

pub const LOCAL_HOST: &str = "localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Local,
    Remote,
}

/// Status code and single response line of one round trip.
///
/// A nonzero status means `line` is empty or a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReply {
    pub status: i32,
    pub line: String,
}

impl ChannelReply {
    pub fn ok(line: impl Into<String>) -> Self {
        Self {
            status: 0,
            line: line.into(),
        }
    }

    pub fn failed(status: i32, line: impl Into<String>) -> Self {
        Self {
            status,
            line: line.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

pub trait Channel: Send {
    fn kind(&self) -> ChannelKind;

    fn host(&self) -> &str;

    /// Where the worker must write its answer.
    fn response_identity(&self) -> &Path;

    /// Deliver `payload` and block until the worker answers.
    fn send(&self, payload: &str) -> Result<ChannelReply, ChannelError>;

    /// Remove transient artefacts once a round trip has succeeded.
    fn cleanup(&self) -> std::io::Result<()> {
        Ok(())
    }
}

pub trait ChannelFactory: Send + Sync {
    fn open(&self, host: &str, worker_id: usize) -> Box<dyn Channel>;
}

/// Last non-empty line of a worker's output.
pub fn last_line(output: &str) -> &str {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Request pipe on the worker machine; `{worker}` expands to the worker id.
    pub request_pipe: String,
    /// Response pipe prefix; host and worker id are appended.
    pub response_pipe: String,
    /// Shared directory for transient remote scripts.
    pub script_dir: PathBuf,
    pub ssh_program: String,
    pub ssh_options: Vec<String>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            request_pipe: DEFAULT_REQUEST_PIPE.to_string(),
            response_pipe: DEFAULT_RESPONSE_PIPE.to_string(),
            script_dir: PathBuf::from(DEFAULT_SHARED_DIR),
            ssh_program: "ssh".to_string(),
            ssh_options: Vec::new(),
        }
    }
}

impl ChannelSettings {
    pub fn request_pipe_for(&self, worker_id: usize) -> PathBuf {
        PathBuf::from(
            self.request_pipe
                .replace("{worker}", &worker_id.to_string()),
        )
    }

    pub fn response_pipe_for(&self, host: &str, worker_id: usize) -> PathBuf {
        PathBuf::from(format!("{}.{}.{}", self.response_pipe, host, worker_id))
    }

    pub fn script_path_for(&self, host: &str, worker_id: usize) -> PathBuf {
        self.script_dir
            .join(format!("query.{}.{}.sh", host, worker_id))
    }
}

/// Opens a `LocalChannel` for `localhost` and a `RemoteChannel` otherwise.
pub struct FleetChannels {
    settings: ChannelSettings,
    runner: Arc<dyn ProcessRunner>,
}

impl FleetChannels {
    pub fn new(settings: ChannelSettings, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { settings, runner }
    }
}

impl ChannelFactory for FleetChannels {
    fn open(&self, host: &str, worker_id: usize) -> Box<dyn Channel> {
        let request_pipe = self.settings.request_pipe_for(worker_id);
        let response_pipe = self.settings.response_pipe_for(host, worker_id);

        if host == LOCAL_HOST {
            Box::new(LocalChannel::new(host, request_pipe, response_pipe))
        } else {
            Box::new(RemoteChannel::new(
                host,
                request_pipe,
                response_pipe,
                self.settings.script_path_for(host, worker_id),
                &self.settings.ssh_program,
                self.settings.ssh_options.clone(),
                Arc::clone(&self.runner),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::MockProcessRunner;

    #[test]
    fn test_identities_are_per_host_and_worker() {
        let settings = ChannelSettings::default();
        assert_eq!(
            settings.response_pipe_for("node-1", 3),
            PathBuf::from("/tmp/warthog.answer.node-1.3")
        );
        assert_ne!(
            settings.response_pipe_for("localhost", 0),
            settings.response_pipe_for("localhost", 1)
        );
        assert_eq!(
            settings.script_path_for("node-1", 3),
            PathBuf::from("/srv/data/query.node-1.3.sh")
        );
    }

    #[test]
    fn test_request_pipe_worker_placeholder() {
        let settings = ChannelSettings {
            request_pipe: "/tmp/warthog.{worker}.fifo".to_string(),
            ..Default::default()
        };
        assert_eq!(
            settings.request_pipe_for(7),
            PathBuf::from("/tmp/warthog.7.fifo")
        );
        assert_eq!(
            ChannelSettings::default().request_pipe_for(7),
            PathBuf::from("/tmp/warthog.fifo")
        );
    }

    #[test]
    fn test_factory_picks_kind_by_host() {
        let factory = FleetChannels::new(
            ChannelSettings::default(),
            Arc::new(MockProcessRunner::new()),
        );

        let local = factory.open("localhost", 0);
        assert_eq!(local.kind(), ChannelKind::Local);
        assert_eq!(
            local.response_identity(),
            Path::new("/tmp/warthog.answer.localhost.0")
        );

        let remote = factory.open("node-2", 2);
        assert_eq!(remote.kind(), ChannelKind::Remote);
        assert_eq!(remote.host(), "node-2");
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("noise\n1,2,3\n\n"), "1,2,3");
        assert_eq!(last_line(""), "");
        assert_eq!(last_line("  only  "), "only");
    }
}
