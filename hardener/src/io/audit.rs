//! Step log export for review, diffing and replay tooling.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{ExecutionMode, StepRecord};

/// Serialized audit document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub mode: ExecutionMode,
    /// `false` when the run aborted on an error; steps then end at the last
    /// mutation that went through.
    pub completed: bool,
    pub steps: Vec<StepRecord>,
}

/// Atomically write the audit report as pretty JSON (temp file + rename).
pub fn write_steps_log(
    path: &Path,
    mode: ExecutionMode,
    completed: bool,
    steps: &[StepRecord],
) -> Result<()> {
    debug!(path = %path.display(), steps = steps.len(), completed, "writing audit report");
    let report = AuditReport {
        mode,
        completed,
        steps: steps.to_vec(),
    };
    let mut buf = serde_json::to_string_pretty(&report).context("serialize audit report")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

pub fn load_steps_log(path: &Path) -> Result<AuditReport> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp audit report {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace audit report {}", path.display()))?;
    Ok(())
}
