//! Shared types for the mutation engine.
//!
//! These types describe what a run intends to change on the host. They carry
//! no I/O and serialize to a stable JSON shape for the audit export.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Whether primitives touch the host or only record what they would do.
///
/// Fixed when a run context is created and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Live,
    DryRun,
}

impl ExecutionMode {
    /// Map the operator's dry-run switch onto a mode.
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Live }
    }

    pub fn is_dry_run(self) -> bool {
        self == Self::DryRun
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::DryRun => f.write_str("dry-run"),
        }
    }
}

/// One mutation attempted during a run, real or simulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepRecord {
    Command {
        command: String,
    },
    EditFile {
        path: PathBuf,
        search: String,
        replacement: String,
    },
    EnsureLine {
        path: PathBuf,
        line: String,
    },
    AppendFile {
        path: PathBuf,
        content: String,
    },
    WriteFile {
        path: PathBuf,
        content: String,
    },
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command { command } => write!(f, "run `{command}`"),
            Self::EditFile {
                path,
                search,
                replacement,
            } => write!(
                f,
                "edit {}: replace {search:?} with {replacement:?}",
                path.display()
            ),
            Self::EnsureLine { path, line } => {
                write!(f, "ensure line {:?} in {}", line.trim(), path.display())
            }
            Self::AppendFile { path, content } => {
                write!(f, "append {} bytes to {}", content.len(), path.display())
            }
            Self::WriteFile { path, content } => {
                write!(f, "write {} bytes to {}", content.len(), path.display())
            }
        }
    }
}

/// Output captured from a command that ran to completion.
///
/// Handed back to the caller only; the step log keeps the command, not this.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_serialize_with_kind_tag() {
        let record = StepRecord::EnsureLine {
            path: PathBuf::from("/etc/fstab"),
            line: "tmpfs /tmp tmpfs defaults 0 0\n".to_string(),
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["kind"], "ensure_line");
        assert_eq!(json["path"], "/etc/fstab");
    }

    #[test]
    fn ensure_line_display_trims_line() {
        let record = StepRecord::EnsureLine {
            path: PathBuf::from("jail.local"),
            line: "enabled = true\n".to_string(),
        };
        assert_eq!(
            record.to_string(),
            "ensure line \"enabled = true\" in jail.local"
        );
    }

    #[test]
    fn mode_follows_dry_run_switch() {
        assert_eq!(ExecutionMode::from_dry_run(true), ExecutionMode::DryRun);
        assert_eq!(ExecutionMode::from_dry_run(false), ExecutionMode::Live);
        assert!(!ExecutionMode::Live.is_dry_run());
    }
}
