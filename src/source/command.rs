use std::io::{self, Read};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::error::{MonitorError, Result};

/// Something that can be (re)opened as a fresh audio byte stream.
pub trait AudioSource {
    type Stream: Read;

    fn open(&mut self) -> Result<Self::Stream>;
}

/// Runs an external recorder and reads the WAV stream from its stdout.
///
/// The command line is split on whitespace without any shell involvement,
/// so quoting is not supported.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| MonitorError::Config("source command is empty".into()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl AudioSource for CommandSource {
    type Stream = ChildStream;

    fn open(&mut self) -> Result<ChildStream> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| MonitorError::Spawn {
                command: self.command_line(),
                source,
            })?;

        log::info!("child process launched. process id is {}", child.id());

        match child.stdout.take() {
            Some(stdout) => Ok(ChildStream { child, stdout }),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(MonitorError::Spawn {
                    command: self.command_line(),
                    source: io::Error::new(io::ErrorKind::BrokenPipe, "child stdout not captured"),
                })
            }
        }
    }
}

/// Stdout of a running source process.
///
/// Dropping it kills the process if it is still running and reaps it, so a
/// run never leaves a recorder behind.
pub struct ChildStream {
    child: Child,
    stdout: ChildStdout,
}

impl Read for ChildStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdout.read(buf)
    }
}

impl Drop for ChildStream {
    fn drop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                log::info!("child process {} exited: {}", self.child.id(), status);
                return;
            }
            Ok(None) => {
                log::debug!("stopping child process {}", self.child.id());
                if let Err(e) = self.child.kill() {
                    log::warn!("Failed to kill child process {}: {}", self.child.id(), e);
                }
            }
            Err(e) => log::warn!("Failed to poll child process {}: {}", self.child.id(), e),
        }
        match self.child.wait() {
            Ok(status) => log::info!("child process {} exited: {}", self.child.id(), status),
            Err(e) => log::warn!("Failed to reap child process {}: {}", self.child.id(), e),
        }
    }
}
