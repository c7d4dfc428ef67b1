//! Periodic process memory logging.

use std::time::Duration;

use sysinfo::{Pid, System};
use tokio::{task::JoinHandle, time};
use tracing::{info, warn};

pub const MEMORY_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Resident memory of `pid` in mebibytes, if the process is visible.
fn resident_mib(sys: &mut System, pid: Pid) -> Option<f64> {
    if !sys.refresh_process(pid) {
        return None;
    }
    sys.process(pid)
        .map(|p| p.memory() as f64 / (1024.0 * 1024.0))
}

/// Logs this process's memory usage every `interval` until the runtime
/// shuts down.
pub fn spawn_memory_logger(interval: Duration) -> Option<JoinHandle<()>> {
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(e) => {
            warn!(error = e, "Memory logging disabled: cannot determine own pid");
            return None;
        }
    };

    Some(tokio::spawn(async move {
        let mut sys = System::new();
        let mut ticker = time::interval(interval);
        info!(interval_secs = interval.as_secs(), "Memory logger started");

        loop {
            ticker.tick().await;
            match resident_mib(&mut sys, pid) {
                Some(mib) => info!(resident_mib = mib, "Memory usage"),
                None => warn!("Could not read process memory"),
            }
        }
    }))
}
