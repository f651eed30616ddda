//! Best-effort service existence probe.

use tracing::debug;

use crate::io::process::{Invocation, ProcessRunner};

pub const DEFAULT_SERVICE_MANAGER: &str = "systemctl";

/// `<manager> status <name>`, spawned directly so the name never reaches a shell.
pub fn probe_invocation(service_manager: &str, name: &str) -> Invocation {
    Invocation::new(service_manager, ["status", name])
}

/// Ask the service manager whether `name` is known.
///
/// Every failure (unknown unit, manager missing, permission denied, timeout)
/// reads as "absent". Callers cannot tell these apart. With `systemctl` an
/// installed but stopped unit exits 3 and so also reads as absent.
pub fn probe(runner: &dyn ProcessRunner, service_manager: &str, name: &str) -> bool {
    match runner.run(&probe_invocation(service_manager, name)) {
        Ok(output) => {
            debug!(service = name, exit_code = ?output.exit_code, "service probe finished");
            output.success()
        }
        Err(err) => {
            debug!(service = name, err = %err, "service probe could not run");
            false
        }
    }
}
