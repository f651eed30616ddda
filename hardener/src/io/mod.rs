//! Side-effecting helpers: processes, files, config and audit export.

pub mod audit;
pub mod config;
pub mod console;
pub mod files;
pub mod process;
pub mod service;
