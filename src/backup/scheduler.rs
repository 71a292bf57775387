use crate::backup::job::{BackupJobRunner, RunOutcome};

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::info;

/// Runs the backup job once immediately and then every `interval`.
///
/// Runs happen on the calling thread one after the other, so the first run
/// and the timed ones never overlap.
pub struct Scheduler {
    runner: BackupJobRunner,
    interval: Duration,
}

impl Scheduler {
    pub fn new(runner: BackupJobRunner) -> Self {
        let interval = runner.config().interval();
        Self { runner, interval }
    }

    /// Blocks until a message arrives on `shutdown` or its sender is
    /// dropped. Returns the number of runs started.
    pub fn start_loop(&self, shutdown: &Receiver<()>) -> usize {
        let mut runs = 0;
        loop {
            runs += 1;
            if let RunOutcome::Completed(outcomes) = self.runner.run_backup_job() {
                let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
                info!(
                    "Backup run finished: {} source root(s), {} failed",
                    outcomes.len(),
                    failed
                );
            }

            info!("Sleeping for {:?}", self.interval);
            match shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    info!("Shutdown requested, leaving backup loop");
                    return runs;
                }
            }
        }
    }
}
