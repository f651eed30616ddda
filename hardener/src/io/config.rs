//! Hardener configuration (TOML).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::debug;

use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, SystemProcessRunner};
use crate::io::service::DEFAULT_SERVICE_MANAGER;

/// Engine configuration.
///
/// Missing fields take their defaults, so an empty file is a valid config.
/// Command-line flags override what is set here.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HardenerConfig {
    /// Simulate every mutation instead of applying it.
    pub dry_run: bool,

    /// Shell used to run command strings (`<shell> -c <command>`).
    pub shell: String,

    /// Program queried by the service probe (`<manager> status <name>`).
    pub service_manager: String,

    /// Per-command wall-clock limit. Unset waits indefinitely.
    pub command_timeout_secs: Option<u64>,

    /// Captured stdout/stderr kept per command, in bytes.
    pub output_limit_bytes: usize,

    /// Where to export the step log after a run.
    pub audit_path: Option<PathBuf>,
}

impl Default for HardenerConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            shell: "sh".to_string(),
            service_manager: DEFAULT_SERVICE_MANAGER.to_string(),
            command_timeout_secs: None,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            audit_path: None,
        }
    }
}

impl HardenerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.shell.trim().is_empty() {
            return Err(anyhow!("shell must be non-empty"));
        }
        if self.service_manager.trim().is_empty() {
            return Err(anyhow!("service_manager must be non-empty"));
        }
        if self.command_timeout_secs == Some(0) {
            return Err(anyhow!("command_timeout_secs must be > 0 when set"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn process_runner(&self) -> SystemProcessRunner {
        SystemProcessRunner {
            timeout: self.command_timeout_secs.map(Duration::from_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HardenerConfig::default()`.
pub fn load_config(path: &Path) -> Result<HardenerConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = HardenerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HardenerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
