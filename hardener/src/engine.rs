//! Mutation engine: the primitives a hardening procedure is built from.
//!
//! A [`RunContext`] owns the execution mode and the step log for one run.
//! Every primitive checks the mode before touching the host, so a dry run
//! cannot leak side effects no matter what the calling procedure does.
//!
//! Calls are blocking and strictly sequential; `&mut self` on every primitive
//! keeps two mutations from being in flight on the same context.

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::core::edit::{contains_line, replace_first};
use crate::core::step_log::StepLog;
use crate::core::types::{CommandResult, ExecutionMode, StepRecord};
use crate::error::{CommandFailure, EngineError, EngineResult};
use crate::io::config::HardenerConfig;
use crate::io::console;
use crate::io::files;
use crate::io::process::{Invocation, ProcessRunner, SystemProcessRunner};
use crate::io::service::{self, DEFAULT_SERVICE_MANAGER};

/// State for a single hardening run.
pub struct RunContext {
    mode: ExecutionMode,
    runner: Box<dyn ProcessRunner>,
    shell: String,
    service_manager: String,
    log: StepLog,
}

impl RunContext {
    /// Context that spawns real processes through `sh`.
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            runner: Box::new(SystemProcessRunner::default()),
            shell: "sh".to_string(),
            service_manager: DEFAULT_SERVICE_MANAGER.to_string(),
            log: StepLog::new(),
        }
    }

    pub fn from_config(config: &HardenerConfig, mode: ExecutionMode) -> Self {
        Self::new(mode)
            .with_runner(Box::new(config.process_runner()))
            .with_shell(&config.shell)
            .with_service_manager(&config.service_manager)
    }

    pub fn with_runner(mut self, runner: Box<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_shell(mut self, shell: &str) -> Self {
        self.shell = shell.to_string();
        self
    }

    pub fn with_service_manager(mut self, service_manager: &str) -> Self {
        self.service_manager = service_manager.to_string();
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Every mutation attempted so far, in order.
    pub fn steps_log(&self) -> &[StepRecord] {
        self.log.records()
    }

    /// Whether this run must not touch the host. Records and announces
    /// `record` when it must not.
    fn simulate(&mut self, record: &StepRecord) -> bool {
        if !self.mode.is_dry_run() {
            return false;
        }
        console::dry_run(record);
        debug!(step = %record, "simulated step");
        self.log.push(record.clone());
        true
    }

    fn record(&mut self, record: StepRecord) {
        debug!(step = %record, "applied step");
        self.log.push(record);
    }

    /// Run `command` through the configured shell.
    ///
    /// The string reaches the shell verbatim. Callers must quote any value they
    /// interpolate into it (usernames, paths); nothing is escaped here.
    ///
    /// A failing command is reported and returned as an error and is not
    /// recorded in the step log.
    #[instrument(skip_all, fields(mode = %self.mode))]
    pub fn run_command(&mut self, command: &str) -> EngineResult<CommandResult> {
        let record = StepRecord::Command {
            command: command.to_string(),
        };
        if self.simulate(&record) {
            return Ok(CommandResult::default());
        }

        info!(command, "running command");
        let output = match self.runner.run(&Invocation::shell(&self.shell, command)) {
            Ok(output) => output,
            Err(err) => return Err(self.command_failed(command, CommandFailure::Spawn(err))),
        };

        if output.timed_out {
            let secs = self.runner.timeout().map_or(0, |t| t.as_secs());
            return Err(self.command_failed(command, CommandFailure::TimedOut { secs }));
        }
        let stdout = output.stdout_lossy();
        let stderr = output.stderr_lossy();
        if !output.success() {
            let failure = CommandFailure::Exit {
                code: output.exit_code,
                stderr,
            };
            return Err(self.command_failed(command, failure));
        }

        if !stdout.is_empty() {
            console::output(&stdout);
        }
        if !stderr.is_empty() {
            console::warning(stderr.trim_end());
        }
        self.record(record);
        Ok(CommandResult { stdout, stderr })
    }

    fn command_failed(&self, command: &str, failure: CommandFailure) -> EngineError {
        console::error(format!("command `{command}` failed: {failure}"));
        warn!(command, reason = %failure, "command failed");
        EngineError::CommandExecution {
            command: command.to_string(),
            source: failure,
        }
    }

    /// Replace the first occurrence of `search` in the file at `path`.
    ///
    /// The file must be readable. When `search` no longer occurs the content
    /// is written back unchanged, so repeating a toggle is harmless.
    #[instrument(skip_all, fields(mode = %self.mode, path = %path.as_ref().display()))]
    pub fn edit_file(
        &mut self,
        path: impl AsRef<Path>,
        search: &str,
        replacement: &str,
    ) -> EngineResult<()> {
        let path = path.as_ref();
        let record = StepRecord::EditFile {
            path: path.to_path_buf(),
            search: search.to_string(),
            replacement: replacement.to_string(),
        };
        if self.simulate(&record) {
            return Ok(());
        }

        let content = files::read_text(path).map_err(|source| EngineError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        if !content.contains(search) {
            debug!(search, "search text absent, content unchanged");
        }
        let updated = replace_first(&content, search, replacement);
        files::write_text(path, &updated).map_err(|source| EngineError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        self.record(record);
        Ok(())
    }

    /// Append `line` unless the file already contains it.
    ///
    /// A missing file counts as empty; any other read failure is an error.
    /// Bytes that are not valid UTF-8 do not hide lines already present. A
    /// call that finds the line present changes nothing and records nothing,
    /// so repeated calls leave exactly one copy and one step.
    #[instrument(skip_all, fields(mode = %self.mode, path = %path.as_ref().display()))]
    pub fn ensure_line_in_file(&mut self, path: impl AsRef<Path>, line: &str) -> EngineResult<()> {
        let path = path.as_ref();
        let record = StepRecord::EnsureLine {
            path: path.to_path_buf(),
            line: line.to_string(),
        };
        if self.simulate(&record) {
            return Ok(());
        }

        let content = match files::read_text_lossy(path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file missing, treating as empty");
                String::new()
            }
            Err(source) => {
                return Err(EngineError::FileRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if contains_line(&content, line) {
            debug!("line already present");
            return Ok(());
        }
        files::append_text(path, line).map_err(|source| EngineError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        self.record(record);
        Ok(())
    }

    /// Append `content` verbatim, creating the file if needed. No presence check.
    #[instrument(skip_all, fields(mode = %self.mode, path = %path.as_ref().display()))]
    pub fn append_to_file(&mut self, path: impl AsRef<Path>, content: &str) -> EngineResult<()> {
        let path = path.as_ref();
        let record = StepRecord::AppendFile {
            path: path.to_path_buf(),
            content: content.to_string(),
        };
        if self.simulate(&record) {
            return Ok(());
        }

        files::append_text(path, content).map_err(|source| EngineError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        self.record(record);
        Ok(())
    }

    /// Replace the whole file with `content`, creating it if needed.
    #[instrument(skip_all, fields(mode = %self.mode, path = %path.as_ref().display()))]
    pub fn write_file(&mut self, path: impl AsRef<Path>, content: &str) -> EngineResult<()> {
        let path = path.as_ref();
        let record = StepRecord::WriteFile {
            path: path.to_path_buf(),
            content: content.to_string(),
        };
        if self.simulate(&record) {
            return Ok(());
        }

        files::write_text(path, content).map_err(|source| EngineError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;
        self.record(record);
        Ok(())
    }

    /// Whether the service manager knows `name`.
    ///
    /// Any probe failure reads as `false`. Dry runs spawn nothing and answer
    /// `true`, so the plan includes the actions the probe guards.
    #[instrument(skip_all, fields(mode = %self.mode, service = name))]
    pub fn service_exists(&self, name: &str) -> bool {
        if self.mode.is_dry_run() {
            debug!("dry run, assuming service exists");
            return true;
        }
        service::probe(&*self.runner, &self.service_manager, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::process::ProcessOutput;
    use crate::test_support::{ScriptedProcessRunner, TestHost};

    fn live(runner: &ScriptedProcessRunner) -> RunContext {
        RunContext::new(ExecutionMode::Live).with_runner(Box::new(runner.clone()))
    }

    fn dry(runner: &ScriptedProcessRunner) -> RunContext {
        RunContext::new(ExecutionMode::DryRun).with_runner(Box::new(runner.clone()))
    }

    #[test]
    fn run_command_returns_output_and_records() {
        let runner = ScriptedProcessRunner::new(vec![Ok(ScriptedProcessRunner::ok("ok", ""))]);
        let mut ctx = live(&runner);

        let result = ctx.run_command("echo test").expect("run");

        assert_eq!(result.stdout, "ok");
        assert_eq!(result.stderr, "");
        assert_eq!(runner.calls(), vec![Invocation::shell("sh", "echo test")]);
        assert_eq!(
            ctx.steps_log(),
            &[StepRecord::Command {
                command: "echo test".to_string()
            }]
        );
    }

    #[test]
    fn run_command_uses_configured_shell() {
        let runner = ScriptedProcessRunner::default();
        let mut ctx = live(&runner).with_shell("bash");

        ctx.run_command("true").expect("run");

        assert_eq!(runner.calls(), vec![Invocation::shell("bash", "true")]);
    }

    #[test]
    fn stderr_on_success_is_not_a_failure() {
        let runner =
            ScriptedProcessRunner::new(vec![Ok(ScriptedProcessRunner::ok("", "W: deprecated"))]);
        let mut ctx = live(&runner);

        let result = ctx.run_command("sudo apt update").expect("run");

        assert_eq!(result.stderr, "W: deprecated");
        assert_eq!(ctx.steps_log().len(), 1);
    }

    #[test]
    fn failed_command_is_error_without_record() {
        let runner =
            ScriptedProcessRunner::new(vec![Ok(ScriptedProcessRunner::exit(100, "E: locked"))]);
        let mut ctx = live(&runner);

        let err = ctx.run_command("sudo apt install aide").expect_err("fail");

        match err {
            EngineError::CommandExecution { command, source } => {
                assert_eq!(command, "sudo apt install aide");
                assert!(matches!(
                    source,
                    CommandFailure::Exit {
                        code: Some(100),
                        ..
                    }
                ));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(ctx.steps_log().is_empty());
    }

    #[test]
    fn spawn_error_is_command_error() {
        let runner = ScriptedProcessRunner::new(vec![Err(std::io::Error::from(
            std::io::ErrorKind::NotFound,
        ))]);
        let mut ctx = live(&runner);

        let err = ctx.run_command("anything").expect_err("spawn");

        assert!(matches!(
            err,
            EngineError::CommandExecution {
                source: CommandFailure::Spawn(_),
                ..
            }
        ));
        assert!(ctx.steps_log().is_empty());
    }

    #[test]
    fn timed_out_command_is_command_error() {
        let output = ProcessOutput {
            timed_out: true,
            ..Default::default()
        };
        let runner = ScriptedProcessRunner::new(vec![Ok(output)]);
        let mut ctx = live(&runner);

        let err = ctx.run_command("sudo aideinit").expect_err("timeout");

        assert!(matches!(
            err,
            EngineError::CommandExecution {
                source: CommandFailure::TimedOut { .. },
                ..
            }
        ));
    }

    #[test]
    fn dry_run_command_never_spawns() {
        let runner = ScriptedProcessRunner::default();
        let mut ctx = dry(&runner);

        let result = ctx.run_command("sudo reboot").expect("dry run");

        assert_eq!(result, CommandResult::default());
        assert!(runner.calls().is_empty());
        assert_eq!(ctx.steps_log().len(), 1);
    }

    #[test]
    fn edit_file_replaces_and_writes() {
        let host = TestHost::new().expect("host");
        let path = host.write("file.txt", "hello old").expect("write");
        let mut ctx = live(&ScriptedProcessRunner::default());

        ctx.edit_file(&path, "old", "new").expect("edit");

        assert_eq!(host.read("file.txt").expect("read"), "hello new");
        assert_eq!(ctx.steps_log().len(), 1);
    }

    #[test]
    fn edit_missing_file_is_read_error() {
        let host = TestHost::new().expect("host");
        let mut ctx = live(&ScriptedProcessRunner::default());

        let err = ctx
            .edit_file(host.path("missing.conf"), "a", "b")
            .expect_err("missing");

        assert!(matches!(err, EngineError::FileRead { .. }));
        assert!(!host.exists("missing.conf"));
        assert!(ctx.steps_log().is_empty());
    }

    #[test]
    fn ensure_line_appends_when_missing() {
        let host = TestHost::new().expect("host");
        let path = host.write("exists.txt", "existing line\n").expect("write");
        let mut ctx = live(&ScriptedProcessRunner::default());

        ctx.ensure_line_in_file(&path, "new line\n").expect("ensure");

        assert_eq!(
            host.read("exists.txt").expect("read"),
            "existing line\nnew line\n"
        );
        assert_eq!(ctx.steps_log().len(), 1);
    }

    #[test]
    fn ensure_line_skips_present_line() {
        let host = TestHost::new().expect("host");
        let path = host.write("exists.txt", "existing line\n").expect("write");
        let mut ctx = live(&ScriptedProcessRunner::default());

        ctx.ensure_line_in_file(&path, "existing line\n").expect("ensure");

        assert_eq!(host.read("exists.txt").expect("read"), "existing line\n");
        assert!(ctx.steps_log().is_empty());
    }

    #[test]
    fn ensure_line_unreadable_path_is_read_error() {
        let host = TestHost::new().expect("host");
        std::fs::create_dir(host.path("limits.d")).expect("dir");
        let mut ctx = live(&ScriptedProcessRunner::default());

        let err = ctx
            .ensure_line_in_file(host.path("limits.d"), "* hard core 0\n")
            .expect_err("directory");

        assert!(matches!(err, EngineError::FileRead { .. }));
        assert!(ctx.steps_log().is_empty());
    }

    #[test]
    fn append_and_write_record_in_order() {
        let host = TestHost::new().expect("host");
        let mut ctx = live(&ScriptedProcessRunner::default());

        ctx.append_to_file(host.path("a.conf"), "one\n").expect("append");
        ctx.write_file(host.path("b.conf"), "two\n").expect("write");

        assert_eq!(host.read("a.conf").expect("read"), "one\n");
        assert_eq!(host.read("b.conf").expect("read"), "two\n");
        let kinds: Vec<bool> = ctx
            .steps_log()
            .iter()
            .map(|r| matches!(r, StepRecord::AppendFile { .. }))
            .collect();
        assert_eq!(kinds, vec![true, false]);
    }

    #[test]
    fn append_into_missing_directory_is_write_error() {
        let host = TestHost::new().expect("host");
        let mut ctx = live(&ScriptedProcessRunner::default());

        let err = ctx
            .append_to_file(host.path("no/such/dir/file"), "x")
            .expect_err("write");

        assert!(matches!(err, EngineError::FileWrite { .. }));
        assert!(ctx.steps_log().is_empty());
    }

    #[test]
    fn service_exists_collapses_failures() {
        let runner = ScriptedProcessRunner::new(vec![
            Ok(ScriptedProcessRunner::ok("active", "")),
            Ok(ScriptedProcessRunner::exit(4, "Unit not found.")),
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied)),
        ]);
        let ctx = live(&runner).with_service_manager("svc");

        assert!(ctx.service_exists("ssh"));
        assert!(!ctx.service_exists("notfound"));
        assert!(!ctx.service_exists("restricted"));
        assert_eq!(runner.calls()[0], Invocation::new("svc", ["status", "ssh"]));
        assert!(ctx.steps_log().is_empty());
    }

    #[test]
    fn service_exists_in_dry_run_spawns_nothing() {
        let runner = ScriptedProcessRunner::default();
        let ctx = dry(&runner);

        assert!(ctx.service_exists("cups.service"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn mode_is_fixed_at_construction() {
        let ctx = RunContext::from_config(&HardenerConfig::default(), ExecutionMode::DryRun);
        assert_eq!(ctx.mode(), ExecutionMode::DryRun);
    }
}
