//! Test-only helpers: a scripted process runner and a scratch host directory.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use tempfile::TempDir;

use crate::io::process::{Invocation, ProcessOutput, ProcessRunner};

/// Process runner that replays queued outputs and records every invocation.
///
/// Clones share state, so a test can hand one clone to a run context and keep
/// another to inspect calls afterwards. Once the queue is empty every call
/// succeeds with empty output.
#[derive(Clone, Default)]
pub struct ScriptedProcessRunner {
    responses: Rc<RefCell<VecDeque<io::Result<ProcessOutput>>>>,
    calls: Rc<RefCell<Vec<Invocation>>>,
}

impl ScriptedProcessRunner {
    pub fn new(responses: Vec<io::Result<ProcessOutput>>) -> Self {
        Self {
            responses: Rc::new(RefCell::new(responses.into())),
            calls: Rc::default(),
        }
    }

    /// Successful output with the given stdout and stderr.
    pub fn ok(stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(0),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            ..ProcessOutput::default()
        }
    }

    /// Output of a command that exited with `code`.
    pub fn exit(code: i32, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(code),
            stderr: stderr.as_bytes().to_vec(),
            ..ProcessOutput::default()
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }
}

impl ProcessRunner for ScriptedProcessRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::ok("", "")))
    }
}

/// Scratch directory standing in for the host filesystem.
pub struct TestHost {
    dir: TempDir,
}

impl TestHost {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    /// Absolute path of `name` inside the host directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Create `name` with `contents` and return its path.
    pub fn write(&self, name: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.path(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}
