//! Operator-facing console output.
//!
//! These notices are product output and are printed regardless of `RUST_LOG`.
//! Diagnostics belong in `tracing` instead (see `logging`).

use std::fmt::Display;

use crate::core::types::StepRecord;

/// Step the engine is simulating instead of applying.
pub fn dry_run(record: &StepRecord) {
    println!("[dry-run] {record}");
}

/// Informational line on stdout.
pub fn notice(message: impl Display) {
    println!("{message}");
}

/// Pass through a command's stdout as-is.
pub fn output(text: &str) {
    if text.ends_with('\n') {
        print!("{text}");
    } else {
        println!("{text}");
    }
}

pub fn warning(message: impl Display) {
    eprintln!("warning: {message}");
}

pub fn error(message: impl Display) {
    eprintln!("error: {message}");
}
