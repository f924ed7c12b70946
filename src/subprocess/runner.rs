use std::io::Write;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use super::error::ProcessError;

/// One blocking invocation: program, arguments and optional stdin text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    /// `<ssh> [options] <host> bash -s` with `script` on stdin.
    pub fn remote_shell(
        ssh_program: &str,
        ssh_options: &[String],
        host: &str,
        script: String,
    ) -> Self {
        Self::new(ssh_program)
            .args(ssh_options)
            .arg(host)
            .arg("bash -s")
            .stdin(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn stdin(mut self, input: String) -> Self {
        self.stdin = Some(input);
        self
    }

    pub fn display(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    /// Status as a shell would report it: signals map to `128 + signal`.
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Error(code) => *code,
            ExitStatus::Signal(signal) => 128 + signal,
        }
    }
}

/// Blocking one-shot process execution.
///
/// Callers run on dedicated dispatch threads, so a call may block for as
/// long as the child runs. There is no timeout at this layer.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;
}

pub struct StdProcessRunner;

impl StdProcessRunner {
    fn configure_command(command: &ProcessCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);

        if command.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    /// Convert process exit status to our ExitStatus enum
    fn parse_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        match status.signal() {
            Some(signal) => ExitStatus::Signal(signal),
            None => ExitStatus::Error(1),
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
        ExitStatus::Error(1)
    }

    fn map_spawn_error(error: std::io::Error, program: &str) -> ProcessError {
        if error.kind() == std::io::ErrorKind::NotFound {
            ProcessError::CommandNotFound(program.to_string())
        } else {
            ProcessError::Io(error)
        }
    }

    fn log_result(result: &ProcessOutput, command: &ProcessCommand) {
        match &result.status {
            ExitStatus::Success => {
                tracing::debug!(
                    "Subprocess completed successfully in {:?}: {}",
                    result.duration,
                    command.display()
                );
                tracing::trace!("Stdout length: {} bytes", result.stdout.len());
            }
            ExitStatus::Error(code) => {
                tracing::debug!(
                    "Subprocess failed with exit code {} in {:?}: {}",
                    code,
                    result.duration,
                    command.display()
                );
                if !result.stderr.is_empty() {
                    tracing::trace!("Stderr: {}", result.stderr);
                }
            }
            ExitStatus::Signal(signal) => {
                tracing::warn!(
                    "Subprocess terminated by signal {} in {:?}: {}",
                    signal,
                    result.duration,
                    command.display()
                );
            }
        }
    }
}

impl ProcessRunner for StdProcessRunner {
    fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        tracing::debug!("Executing subprocess: {}", command.display());

        let start = Instant::now();
        let mut child = Self::configure_command(&command)
            .spawn()
            .map_err(|e| Self::map_spawn_error(e, &command.program))?;

        // Feed stdin from its own thread so a chatty child cannot fill its
        // stdout pipe while we are still writing.
        let writer = match (child.stdin.take(), command.stdin.clone()) {
            (Some(mut stdin), Some(data)) => {
                tracing::trace!("Stdin provided: {} bytes", data.len());
                Some(std::thread::spawn(move || stdin.write_all(data.as_bytes())))
            }
            _ => None,
        };

        let output = child.wait_with_output()?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                // The child may exit without draining stdin; its status tells the story.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(ProcessError::Io(e)),
                Err(_) => {
                    return Err(ProcessError::Io(std::io::Error::other(
                        "stdin writer thread panicked",
                    )))
                }
            }
        }

        let result = ProcessOutput {
            status: Self::parse_exit_status(output.status),
            // Login banners may carry any bytes; only the last line matters.
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
        };
        Self::log_result(&result, &command);
        Ok(result)
    }
}
