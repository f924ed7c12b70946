//! Channel to a worker on another machine.
//!
//! The head writes a one-shot shell script that performs the same pipe round
//! trip as `LocalChannel`, runs it on the worker host through `ssh ... bash -s`
//! and relays the single answer line.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{last_line, Channel, ChannelKind, ChannelReply};
use crate::error::ChannelError;
use crate::subprocess::{ProcessCommand, ProcessRunner};

const HEREDOC_TAG: &str = "CONF";

pub struct RemoteChannel {
    host: String,
    request_pipe: PathBuf,
    response_pipe: PathBuf,
    script_path: PathBuf,
    ssh_program: String,
    ssh_options: Vec<String>,
    runner: Arc<dyn ProcessRunner>,
}

impl RemoteChannel {
    pub fn new(
        host: &str,
        request_pipe: PathBuf,
        response_pipe: PathBuf,
        script_path: PathBuf,
        ssh_program: &str,
        ssh_options: Vec<String>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            host: host.to_string(),
            request_pipe,
            response_pipe,
            script_path,
            ssh_program: ssh_program.to_string(),
            ssh_options,
            runner,
        }
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn render_script(&self, payload: &str) -> String {
        let answer = shell_words::quote(&self.response_pipe.to_string_lossy()).into_owned();
        let fifo = shell_words::quote(&self.request_pipe.to_string_lossy()).into_owned();
        let newline = if payload.ends_with('\n') { "" } else { "\n" };

        format!(
            "mkfifo {answer}\n\
             cat <<'{HEREDOC_TAG}' > {fifo}\n\
             {payload}{newline}{HEREDOC_TAG}\n\
             cat {answer}\n\
             rm {answer}\n"
        )
    }
}

impl Channel for RemoteChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Remote
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn response_identity(&self) -> &Path {
        &self.response_pipe
    }

    fn send(&self, payload: &str) -> Result<ChannelReply, ChannelError> {
        let script = self.render_script(payload);
        std::fs::write(&self.script_path, &script).map_err(|source| ChannelError::Io {
            host: self.host.clone(),
            path: self.script_path.clone(),
            source,
        })?;

        let command =
            ProcessCommand::remote_shell(&self.ssh_program, &self.ssh_options, &self.host, script);

        let output = self
            .runner
            .run(command)
            .map_err(|source| ChannelError::Process {
                host: self.host.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(ChannelReply::ok(last_line(&output.stdout)));
        }

        let diagnostic = if output.stderr.trim().is_empty() {
            output.stdout.trim()
        } else {
            output.stderr.trim()
        };
        Ok(ChannelReply::failed(output.status.code(), diagnostic))
    }

    fn cleanup(&self) -> std::io::Result<()> {
        std::fs::remove_file(&self.script_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::MockProcessRunner;
    use tempfile::TempDir;

    fn channel(dir: &Path, runner: MockProcessRunner) -> RemoteChannel {
        RemoteChannel::new(
            "node-4",
            PathBuf::from("/tmp/warthog.fifo"),
            PathBuf::from("/tmp/warthog.answer.node-4.4"),
            dir.join("query.node-4.4.sh"),
            "ssh",
            vec!["-o".to_string(), "BatchMode=yes".to_string()],
            Arc::new(runner),
        )
    }

    #[test]
    fn test_render_script() {
        let dir = TempDir::new().unwrap();
        let channel = channel(dir.path(), MockProcessRunner::new());
        let script = channel.render_script("{\"threads\":2}\n/srv/data/query.node-4.4 /tmp/warthog.answer.node-4.4 -\n");

        assert_eq!(
            script,
            "mkfifo /tmp/warthog.answer.node-4.4\n\
             cat <<'CONF' > /tmp/warthog.fifo\n\
             {\"threads\":2}\n\
             /srv/data/query.node-4.4 /tmp/warthog.answer.node-4.4 -\n\
             CONF\n\
             cat /tmp/warthog.answer.node-4.4\n\
             rm /tmp/warthog.answer.node-4.4\n"
        );
    }

    #[test]
    fn test_send_relays_last_stdout_line() {
        let dir = TempDir::new().unwrap();
        let mock = MockProcessRunner::new();
        mock.on_host("ssh", "node-4")
            .with_args(&["-o", "BatchMode=yes", "node-4", "bash -s"])
            .stdout("motd noise\n10,20,30,40,50,60,1,70,80,90\n")
            .install();

        let channel = channel(dir.path(), mock.clone());
        let reply = channel.send("{}\nq a -\n").unwrap();

        assert_eq!(reply, ChannelReply::ok("10,20,30,40,50,60,1,70,80,90"));
        let scripts = mock.stdin_sent_to("node-4");
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].starts_with("mkfifo "));
        assert_eq!(std::fs::read_to_string(channel.script_path()).unwrap(), scripts[0]);
        assert!(channel.script_path().exists());

        channel.cleanup().unwrap();
        assert!(!channel.script_path().exists());
    }

    #[test]
    fn test_send_reports_nonzero_status() {
        let dir = TempDir::new().unwrap();
        let mock = MockProcessRunner::new();
        mock.on_host("ssh", "node-4")
            .exit_code(255)
            .stderr("ssh: connect to host node-4 port 22: Connection refused\n")
            .install();

        let reply = channel(dir.path(), mock).send("{}\nq a -\n").unwrap();
        assert_eq!(reply.status, 255);
        assert!(reply.line.contains("Connection refused"));
    }
}
