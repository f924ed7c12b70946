//! Same-machine channel over a pair of named pipes.

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::{last_line, Channel, ChannelKind, ChannelReply};
use crate::error::ChannelError;

pub struct LocalChannel {
    host: String,
    request_pipe: PathBuf,
    response_pipe: PathBuf,
}

/// Removes the response pipe when the round trip ends, however it ends.
struct PipeGuard<'a>(&'a Path);

impl Drop for PipeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(self.0) {
            tracing::debug!("Could not remove response pipe {}: {}", self.0.display(), e);
        }
    }
}

impl LocalChannel {
    pub fn new(host: &str, request_pipe: PathBuf, response_pipe: PathBuf) -> Self {
        Self {
            host: host.to_string(),
            request_pipe,
            response_pipe,
        }
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> ChannelError {
        ChannelError::Io {
            host: self.host.clone(),
            path: path.to_path_buf(),
            source,
        }
    }

    fn create_response_pipe(&self) -> Result<(), ChannelError> {
        let mode = Mode::S_IRUSR | Mode::S_IWUSR;
        match mkfifo(&self.response_pipe, mode) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::EEXIST) => {
                // Left behind by an earlier run that died mid-read; the name
                // is ours alone, so it is safe to replace.
                tracing::warn!(
                    "Replacing stale response pipe {}",
                    self.response_pipe.display()
                );
                std::fs::remove_file(&self.response_pipe)
                    .map_err(|e| self.io_error(&self.response_pipe, e))?;
                mkfifo(&self.response_pipe, mode)
                    .map_err(|e| self.io_error(&self.response_pipe, e.into()))
            }
            Err(e) => Err(self.io_error(&self.response_pipe, e.into())),
        }
    }
}

impl Channel for LocalChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Local
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn response_identity(&self) -> &Path {
        &self.response_pipe
    }

    fn send(&self, payload: &str) -> Result<ChannelReply, ChannelError> {
        // The answer pipe must exist before the worker can see the request.
        self.create_response_pipe()?;
        let _guard = PipeGuard(&self.response_pipe);

        {
            let mut request = OpenOptions::new()
                .write(true)
                .open(&self.request_pipe)
                .map_err(|e| self.io_error(&self.request_pipe, e))?;
            request
                .write_all(payload.as_bytes())
                .map_err(|e| self.io_error(&self.request_pipe, e))?;
        }
        tracing::trace!("Request written to {}", self.request_pipe.display());

        let mut output = String::new();
        File::open(&self.response_pipe)
            .and_then(|mut response| response.read_to_string(&mut output))
            .map_err(|e| self.io_error(&self.response_pipe, e))?;

        Ok(ChannelReply::ok(last_line(&output)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use std::os::unix::fs::FileTypeExt;
    use tempfile::TempDir;

    /// Reads one request and answers on the pipe named in its header.
    fn fake_worker(request_pipe: PathBuf) -> std::thread::JoinHandle<String> {
        std::thread::spawn(move || {
            let mut lines = std::io::BufReader::new(File::open(&request_pipe).unwrap()).lines();
            let config = lines.next().unwrap().unwrap();
            let header = lines.next().unwrap().unwrap();
            let answer = header.split_whitespace().nth(1).unwrap().to_string();

            let mut out = OpenOptions::new().write(true).open(answer).unwrap();
            writeln!(out, "worker log line").unwrap();
            writeln!(out, "1,2,3,4,5,6,1,7,8,9").unwrap();
            config
        })
    }

    fn payload(response_pipe: &Path) -> String {
        format!(
            "{{\"threads\":1}}\n/tmp/query.localhost.0 {} -\n",
            response_pipe.display()
        )
    }

    #[test]
    fn test_round_trip_with_fake_worker() {
        let dir = TempDir::new().unwrap();
        let request_pipe = dir.path().join("warthog.fifo");
        let response_pipe = dir.path().join("warthog.answer.localhost.0");
        mkfifo(&request_pipe, Mode::S_IRUSR | Mode::S_IWUSR).unwrap();

        let worker = fake_worker(request_pipe.clone());
        let channel = LocalChannel::new("localhost", request_pipe, response_pipe.clone());
        let reply = channel.send(&payload(&response_pipe)).unwrap();

        assert!(reply.is_success());
        assert_eq!(reply.line, "1,2,3,4,5,6,1,7,8,9");
        assert_eq!(worker.join().unwrap(), "{\"threads\":1}");
        assert!(!response_pipe.exists(), "response pipe must be removed");
    }

    #[test]
    fn test_stale_response_pipe_is_replaced() {
        let dir = TempDir::new().unwrap();
        let request_pipe = dir.path().join("warthog.fifo");
        let response_pipe = dir.path().join("warthog.answer.localhost.0");
        mkfifo(&request_pipe, Mode::S_IRUSR | Mode::S_IWUSR).unwrap();
        mkfifo(&response_pipe, Mode::S_IRUSR | Mode::S_IWUSR).unwrap();

        let worker = fake_worker(request_pipe.clone());
        let channel = LocalChannel::new("localhost", request_pipe, response_pipe.clone());
        let reply = channel.send(&payload(&response_pipe)).unwrap();

        assert_eq!(reply.line, "1,2,3,4,5,6,1,7,8,9");
        worker.join().unwrap();
        assert!(!response_pipe.exists(), "response pipe must be removed");
    }

    #[test]
    fn test_stale_response_file_is_replaced_by_pipe() {
        let dir = TempDir::new().unwrap();
        let response_pipe = dir.path().join("answer");
        std::fs::write(&response_pipe, "left over").unwrap();
        let channel = LocalChannel::new(
            "localhost",
            dir.path().join("no-such.fifo"),
            response_pipe.clone(),
        );

        channel.create_response_pipe().unwrap();

        let file_type = std::fs::metadata(&response_pipe).unwrap().file_type();
        assert!(file_type.is_fifo());
    }

    #[test]
    fn test_missing_request_pipe_is_io_error_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let response_pipe = dir.path().join("answer");
        let channel = LocalChannel::new(
            "localhost",
            dir.path().join("no-such.fifo"),
            response_pipe.clone(),
        );

        let err = channel.send("{}\nq r -\n").unwrap_err();
        assert!(matches!(err, ChannelError::Io { .. }));
        assert!(!response_pipe.exists());
    }
}
