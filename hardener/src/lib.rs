//! Host hardening through an auditable mutation engine.
//!
//! The architecture keeps side effects at the edges:
//!
//! - **[`core`]**: Pure logic (step records, the step log, text transforms).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (processes, files, config, audit
//!   export). Isolated behind small functions and the
//!   [`io::process::ProcessRunner`] trait so tests can script them.
//!
//! [`engine`] combines the two into the mutation primitives, gated by a
//! dry-run switch, and [`procedure`] drives them through the fixed hardening
//! sequence.

pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod procedure;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
