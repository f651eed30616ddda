//! Error types for engine primitives.
//!
//! Engine failures are typed so callers and tests can tell a rejected command
//! from an unreadable file. Glue code above the engine converts them into
//! `anyhow::Error` with context.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a mutation primitive. Never retried by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An external command could not be spawned or did not succeed.
    #[error("command `{command}` failed")]
    CommandExecution {
        command: String,
        #[source]
        source: CommandFailure,
    },

    /// A file that must exist could not be read.
    #[error("read {}", .path.display())]
    FileRead { path: PathBuf, source: io::Error },

    /// Writing or appending to a file failed.
    #[error("write {}", .path.display())]
    FileWrite { path: PathBuf, source: io::Error },
}

/// Why a command was rejected.
#[derive(Debug, Error)]
pub enum CommandFailure {
    #[error("spawn failed: {0}")]
    Spawn(io::Error),

    #[error("{}", describe_exit(.code, .stderr))]
    Exit { code: Option<i32>, stderr: String },

    #[error("timed out after {secs}s")]
    TimedOut { secs: u64 },
}

fn describe_exit(code: &Option<i32>, stderr: &str) -> String {
    let status = match code {
        Some(code) => format!("exited with status {code}"),
        None => "terminated by signal".to_string(),
    };
    let stderr = stderr.trim();
    if stderr.is_empty() {
        status
    } else {
        format!("{status}: {stderr}")
    }
}

/// Result type alias using EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
