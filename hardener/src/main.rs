//! Ubuntu 22.04 server hardening tool.
//!
//! Applies a fixed procedure (packages, sshd, firewall, kernel parameters,
//! services) through the mutation engine. `--dry-run` and `plan` simulate the
//! procedure and list what would change without touching the host.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use hardener::core::step_log::render_plan;
use hardener::core::types::ExecutionMode;
use hardener::engine::RunContext;
use hardener::exit_codes;
use hardener::io::audit::write_steps_log;
use hardener::io::config::{HardenerConfig, load_config};
use hardener::io::console;
use hardener::logging;
use hardener::procedure::{ProcedureParams, run_procedure};

#[derive(Parser)]
#[command(
    name = "hardener",
    version,
    about = "Apply a fixed hardening procedure to an Ubuntu server"
)]
struct Cli {
    /// TOML config file. A missing file means defaults.
    #[arg(long, global = true, default_value = "hardener.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the procedure against this host.
    Apply {
        #[command(flatten)]
        target: TargetArgs,
        /// Simulate every mutation instead of applying it.
        #[arg(long, env = "HARDENER_DRY_RUN")]
        dry_run: bool,
    },
    /// Simulate the procedure and print the numbered list of steps.
    Plan {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Non-root user to create and add to sudo.
    #[arg(long, value_parser = parse_username)]
    user: String,
    /// Port sshd is moved to.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    ssh_port: u16,
    /// Write the step log as JSON here once the run ends.
    #[arg(long)]
    audit: Option<PathBuf>,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let config = match load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("{err:#}");
            return exit_codes::INVALID;
        }
    };

    let (target, mode, print_plan) = match cli.command {
        Command::Apply { target, dry_run } => (
            target,
            ExecutionMode::from_dry_run(dry_run || config.dry_run),
            false,
        ),
        Command::Plan { target } => (target, ExecutionMode::DryRun, true),
    };

    match execute(&config, target, mode, print_plan) {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::FAILED
        }
    }
}

fn execute(
    config: &HardenerConfig,
    target: TargetArgs,
    mode: ExecutionMode,
    print_plan: bool,
) -> Result<()> {
    let params = ProcedureParams {
        username: target.user,
        ssh_port: target.ssh_port,
    };
    let audit_path = target.audit.or_else(|| config.audit_path.clone());

    info!(%mode, ssh_port = params.ssh_port, "starting hardening run");
    let mut ctx = RunContext::from_config(config, mode);
    let outcome = run_procedure(&mut ctx, &params);

    if let Some(path) = audit_path.as_deref()
        && let Err(err) = export(path, &ctx, outcome.is_ok())
    {
        // A failed run's own error takes precedence over the export failure.
        if outcome.is_ok() {
            return Err(err);
        }
        console::warning(format!("{err:#}"));
    }

    if print_plan {
        print!("{}", render_plan(ctx.steps_log()));
    }
    console::notice(format!("{} steps recorded ({mode})", ctx.steps_log().len()));
    outcome.context("hardening run aborted")
}

fn export(path: &Path, ctx: &RunContext, completed: bool) -> Result<()> {
    write_steps_log(path, ctx.mode(), completed, ctx.steps_log())
        .with_context(|| format!("export step log to {}", path.display()))
}

fn parse_username(raw: &str) -> Result<String, String> {
    if raw.trim().is_empty() {
        return Err("username is required".to_string());
    }
    Ok(raw.to_string())
}
