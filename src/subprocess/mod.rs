//! Blocking subprocess execution behind a trait, so remote channels and the
//! topology oracle can be exercised against a scripted runner.

pub mod error;
pub mod mock;
pub mod runner;

#[cfg(test)]
mod tests;

pub use error::ProcessError;
pub use mock::{MockProcessRunner, ReplyBuilder};
pub use runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner, StdProcessRunner};

use std::sync::Arc;

/// The runner shared by every channel and the oracle of one invocation.
#[derive(Clone)]
pub struct SubprocessManager {
    runner: Arc<dyn ProcessRunner>,
}

impl SubprocessManager {
    pub fn production() -> Self {
        Self {
            runner: Arc::new(StdProcessRunner),
        }
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }
}
