//! Deterministic logic shared by the engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod edit;
pub mod step_log;
pub mod types;
