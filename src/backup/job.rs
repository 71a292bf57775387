//! One backup run: gate on the weekday, prepare destinations, then build
//! and replicate one archive per source root.
//!
//! Archives are named `Backup_<YYYYMMDDHHMMSS>.zip` from a timestamp taken
//! once per run. When several source roots are configured, the second and
//! later roots get their position appended (`Backup_<ts>_1.zip`,
//! `Backup_<ts>_2.zip`, ...) so roots of one run never overwrite each other.

use crate::backup::archive::zip_writer::{build_archive, BuildReport};
use crate::backup::archive::ArchiveTask;
use crate::backup::backup_config::Configuration;
use crate::backup::filter::ExtensionFilter;
use crate::backup::replicate::DestinationReplicator;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::AddDebugObjectAndFnName;
use crate::backup::schedule;
use crate::backup::validate::ensure_writable_dir;

use chrono::{Datelike, Local, NaiveDateTime};
use rayon::ThreadPool;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

static ARCHIVE_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Name shared by every copy of one source root's archive in a run.
///
/// The first source root gets `Backup_<timestamp>.zip`, later roots of the
/// same run append their position (`Backup_<timestamp>_1.zip`, ...).
pub fn archive_file_name(run_time: &NaiveDateTime, root_index: usize) -> String {
    let stamp = run_time.format(ARCHIVE_TIME_FORMAT);
    if root_index == 0 {
        format!("Backup_{stamp}.zip")
    } else {
        format!("Backup_{stamp}_{root_index}.zip")
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Today is not listed in `DaysOfWeek`
    NotScheduled,
    /// Another run was still in progress
    AlreadyRunning,
    /// None of the configured destinations could be prepared
    NoUsableDestination,
    Completed(Vec<RootOutcome>),
}

#[derive(Debug)]
pub struct RootOutcome {
    pub source_root: PathBuf,
    pub result: Result<RootReport>,
}

#[derive(Debug)]
pub struct RootReport {
    pub build: BuildReport,
    pub replicated_to: Vec<PathBuf>,
    /// Every failed secondary copy, folded into one error
    pub replication_error: Option<Error>,
}

pub struct BackupJobRunner {
    config: Arc<Configuration>,
    filter: ExtensionFilter,
    replicator: DestinationReplicator,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BackupJobRunner {
    pub fn new(config: Configuration, pool: Arc<ThreadPool>) -> Self {
        Self {
            filter: config.extension_filter(),
            config: Arc::new(config),
            replicator: DestinationReplicator::new(pool),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Entry point for the scheduler, runs against the local wall clock.
    pub fn run_backup_job(&self) -> RunOutcome {
        self.run_at(Local::now().naive_local())
    }

    pub fn run_at(&self, now: NaiveDateTime) -> RunOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            warn!("Previous backup run still in progress, skipping this one");
            return RunOutcome::AlreadyRunning;
        }
        let _guard = RunningGuard(&self.running);

        let today = now.weekday();
        if !schedule::is_eligible(today, self.config.days_of_week()) {
            info!(
                "{:?} is not a backup day ({:?}), skipping",
                today,
                self.config.days_of_week().to_string()
            );
            return RunOutcome::NotScheduled;
        }

        let destinations = match self.prepare_destinations() {
            Some(d) => d,
            None => return RunOutcome::NoUsableDestination,
        };

        info!("Trying to create backups...");
        let outcomes = self
            .config
            .backup_paths()
            .iter()
            .enumerate()
            .map(|(idx, root)| {
                let task = ArchiveTask {
                    source_root: root.clone(),
                    archive_file_name: archive_file_name(&now, idx),
                    destinations: destinations.usable.clone(),
                };
                let result = if destinations.primary_usable {
                    self.run_task(&task)
                } else {
                    Err(destinations.primary_error())
                };
                if let Err(e) = &result {
                    error!("Backup of {:?} aborted:\n{e}", root);
                }
                RootOutcome {
                    source_root: root.clone(),
                    result,
                }
            })
            .collect();

        RunOutcome::Completed(outcomes)
    }

    fn prepare_destinations(&self) -> Option<PreparedDestinations> {
        let mut usable = Vec::new();
        let mut primary_usable = false;
        let mut primary = None;
        let mut seen = HashSet::new();
        for (idx, dir) in self.config.writer_paths().iter().enumerate() {
            if idx == 0 {
                primary = Some(dir.clone());
            }
            match ensure_writable_dir(dir) {
                Ok(()) => {
                    let key = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.clone());
                    if !seen.insert(key) {
                        warn!("Destination {:?} already listed, ignoring duplicate", dir);
                        continue;
                    }
                    primary_usable |= idx == 0;
                    usable.push(dir.clone());
                }
                Err(e) => warn!("{}", e.destination_unusable(dir)),
            }
        }

        if usable.is_empty() {
            error!("No usable backup destination, nothing to do");
            return None;
        }

        Some(PreparedDestinations {
            usable,
            primary_usable,
            primary: primary.unwrap_or_default(),
        })
    }

    fn run_task(&self, task: &ArchiveTask) -> Result<RootReport> {
        let primary_path = task.primary_archive_path().ok_or_else(|| {
            Error::from(std::io::Error::other("no destination")).destination_unusable("")
        })?;

        info!("Archiving {:?} into {:?}", task.source_root, primary_path);
        let build = build_archive(&task.source_root, &primary_path, &self.filter)
            .add_debug_object_and_fn_name(task.clone(), "build_archive")?;
        info!(
            "Created backup file: {:?} ({} entries)",
            build.archive_path, build.entry_count
        );
        if !build.skipped.is_empty() {
            warn!(
                "{} file(s) of {:?} were skipped",
                build.skipped.len(),
                task.source_root
            );
        }

        let secondaries = task.secondary_archive_paths();
        let replication_errors = self.replicator.copy_to(&build.archive_path, &secondaries);
        let replicated_to = secondaries
            .into_iter()
            .filter(|p| {
                !replication_errors
                    .iter()
                    .any(|e| matches!(e, Error::ReplicationFailed { path, .. } if path == p))
            })
            .collect();

        let replication_error = convert_error_vec(replication_errors).err();
        if let Some(e) = &replication_error {
            warn!("Received non fatal error: {e}");
        }

        Ok(RootReport {
            build,
            replicated_to,
            replication_error,
        })
    }
}

struct PreparedDestinations {
    usable: Vec<PathBuf>,
    primary_usable: bool,
    primary: PathBuf,
}

impl PreparedDestinations {
    fn primary_error(&self) -> Error {
        Error::from(std::io::Error::other(
            "primary destination could not be prepared",
        ))
        .destination_unusable(&self.primary)
    }
}
