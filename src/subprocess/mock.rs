//! Scripted `ProcessRunner` for remote channel and topology oracle tests.
//!
//! Replies are keyed on the program and, for remote shells, on the worker
//! host among its arguments. Every call is recorded with the script it was
//! fed on stdin.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::error::ProcessError;
use super::runner::{ExitStatus, ProcessCommand, ProcessOutput, ProcessRunner};

#[derive(Clone, Default)]
pub struct MockProcessRunner {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    replies: Vec<ScriptedReply>,
    calls: Vec<ProcessCommand>,
}

struct ScriptedReply {
    program: String,
    host: Option<String>,
    args: Option<Vec<String>>,
    output: ProcessOutput,
    remaining: Option<usize>,
}

impl ScriptedReply {
    fn matches(&self, command: &ProcessCommand) -> bool {
        self.program == command.program
            && self.remaining != Some(0)
            && self
                .host
                .as_ref()
                .map_or(true, |host| command.args.contains(host))
            && self.args.as_ref().map_or(true, |args| *args == command.args)
    }
}

/// A reply being scripted; takes effect on `install`.
pub struct ReplyBuilder {
    runner: MockProcessRunner,
    reply: ScriptedReply,
}

impl MockProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn script(&self, program: &str, host: Option<&str>) -> ReplyBuilder {
        ReplyBuilder {
            runner: self.clone(),
            reply: ScriptedReply {
                program: program.to_string(),
                host: host.map(str::to_string),
                args: None,
                output: ProcessOutput {
                    status: ExitStatus::Success,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration: Duration::from_millis(1),
                },
                remaining: None,
            },
        }
    }

    /// Reply to `ssh_program` invocations that target `host`.
    pub fn on_host(&self, ssh_program: &str, host: &str) -> ReplyBuilder {
        self.script(ssh_program, Some(host))
    }

    /// Reply to any invocation of `program`, such as the topology tool.
    pub fn on_program(&self, program: &str) -> ReplyBuilder {
        self.script(program, None)
    }

    pub fn calls(&self) -> Vec<ProcessCommand> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, program: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.program == program)
            .count()
    }

    /// Scripts piped to `host`, in call order.
    pub fn stdin_sent_to(&self, host: &str) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.args.iter().any(|arg| arg == host))
            .filter_map(|call| call.stdin.clone())
            .collect()
    }
}

impl ProcessRunner for MockProcessRunner {
    fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let mut state = self.state();
        state.calls.push(command.clone());

        let reply = state
            .replies
            .iter_mut()
            .find(|reply| reply.matches(&command))
            .ok_or_else(|| ProcessError::Unscripted(command.display()))?;
        if let Some(remaining) = reply.remaining.as_mut() {
            *remaining -= 1;
        }
        Ok(reply.output.clone())
    }
}

impl ReplyBuilder {
    /// Match only this exact argument list.
    pub fn with_args(mut self, args: &[&str]) -> Self {
        self.reply.args = Some(args.iter().map(|arg| arg.to_string()).collect());
        self
    }

    pub fn stdout(mut self, stdout: &str) -> Self {
        self.reply.output.stdout = stdout.to_string();
        self
    }

    pub fn stderr(mut self, stderr: &str) -> Self {
        self.reply.output.stderr = stderr.to_string();
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.reply.output.status = if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Error(code)
        };
        self
    }

    /// Answer a single call; later calls fall through to other replies.
    pub fn once(mut self) -> Self {
        self.reply.remaining = Some(1);
        self
    }

    pub fn install(self) {
        self.runner.state().replies.push(self.reply);
    }
}
