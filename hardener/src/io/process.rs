//! Child process execution with bounded output and an optional timeout.
//!
//! The [`ProcessRunner`] trait decouples the engine from actually spawning
//! processes. Tests use scripted runners that return canned outputs.

use std::fmt;
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1024 * 1024;

/// A program plus arguments, spawned without further interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `<shell> -c <command>`: the command string is handed to the shell verbatim.
    pub fn shell(shell: &str, command: &str) -> Self {
        Self::new(shell, ["-c", command])
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured child process output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Abstraction over process spawning.
///
/// `Err` means the process never produced an exit status (spawn or wait
/// failure). A non-zero exit is an `Ok` output; callers decide what it means.
pub trait ProcessRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput>;

    /// Timeout applied per invocation, if any.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

/// Runner that spawns real processes via `std::process::Command`.
#[derive(Debug, Clone)]
pub struct SystemProcessRunner {
    /// `None` waits for the child indefinitely.
    pub timeout: Option<Duration>,
    /// Bytes of stdout/stderr kept in memory; the rest is drained and dropped.
    pub output_limit_bytes: usize,
}

impl Default for SystemProcessRunner {
    fn default() -> Self {
        Self {
            timeout: None,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl ProcessRunner for SystemProcessRunner {
    #[instrument(skip_all, fields(program = %invocation.program, timeout_secs = self.timeout.map(|t| t.as_secs())))]
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("spawning child process");
        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                error!(err = %e, "failed to spawn command");
                return Err(e);
            }
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("stderr was not piped"))?;

        // Drain both pipes while the child runs so a chatty command cannot
        // block on a full pipe.
        let limit = self.output_limit_bytes;
        let stdout_handle = thread::spawn(move || read_stream_limited(stdout, limit));
        let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));

        let mut timed_out = false;
        let status = match self.timeout {
            None => child.wait()?,
            Some(timeout) => match child.wait_timeout(timeout)? {
                Some(status) => status,
                None => {
                    warn!(
                        timeout_secs = timeout.as_secs(),
                        "command timed out, killing"
                    );
                    timed_out = true;
                    child.kill()?;
                    child.wait()?
                }
            },
        };

        let (stdout, stdout_truncated) = join_output(stdout_handle)?;
        let (stderr, stderr_truncated) = join_output(stderr_handle)?;

        if stdout_truncated > 0 || stderr_truncated > 0 {
            warn!(stdout_truncated, stderr_truncated, "output truncated");
        }

        debug!(exit_code = ?status.code(), timed_out, "command finished");
        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
            timed_out,
        })
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

fn join_output(
    handle: thread::JoinHandle<io::Result<(Vec<u8>, usize)>>,
) -> io::Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(io::Error::other("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> io::Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(command: &str) -> Invocation {
        Invocation::shell("sh", command)
    }

    #[test]
    fn captures_stdout_and_stderr() {
        let output = SystemProcessRunner::default()
            .run(&sh("printf out; printf err >&2"))
            .expect("run");
        assert!(output.success());
        assert_eq!(output.stdout_lossy(), "out");
        assert_eq!(output.stderr_lossy(), "err");
    }

    #[test]
    fn non_zero_exit_is_reported_not_raised() {
        let output = SystemProcessRunner::default()
            .run(&sh("exit 3"))
            .expect("run");
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = SystemProcessRunner::default()
            .run(&Invocation::new("definitely-not-a-real-program-xyz", ["x"]))
            .expect_err("spawn should fail");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn output_beyond_limit_is_truncated() {
        let runner = SystemProcessRunner {
            timeout: None,
            output_limit_bytes: 4,
        };
        let output = runner.run(&sh("printf 0123456789")).expect("run");
        assert_eq!(output.stdout, b"0123");
        assert_eq!(output.stdout_truncated, 6);
    }

    #[test]
    fn timeout_kills_hung_command() {
        let runner = SystemProcessRunner {
            timeout: Some(Duration::from_millis(200)),
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        };
        let output = runner.run(&sh("exec sleep 5")).expect("run");
        assert!(output.timed_out);
        assert!(!output.success());
    }

    #[test]
    fn invocation_display_joins_args() {
        assert_eq!(sh("echo hi").to_string(), "sh -c echo hi");
    }
}
