//! # zip-backup
//!
//! Periodically archives a set of source directories into timestamped zip
//! files and replicates each archive to several destination directories.
//!
//! ## Features
//!
//! - **Scheduled Backups**: fixed interval in minutes, gated by day of week
//! - **Extension Filtering**: case-insensitive allow-list with `*` wildcard
//! - **Fast Compression**: deflate at the fastest level, streamed file by file
//! - **Fan-out**: the archive is built once and copied to every other destination
//! - **Partial Failure Tolerance**: unreadable files are skipped and reported
//!
//! ## Quick Start
//!
//! ```no_run
//! use zip_backup::backup::backup_config::Configuration;
//! use zip_backup::backup::job::BackupJobRunner;
//! use zip_backup::backup::scheduler::Scheduler;
//!
//! let config = Configuration::load("config.json")?;
//! let thread_pool = rayon::ThreadPoolBuilder::new().build()?;
//! let runner = BackupJobRunner::new(config, std::sync::Arc::new(thread_pool));
//!
//! let (_shutdown_tx, shutdown_rx) = std::sync::mpsc::channel();
//! Scheduler::new(runner).start_loop(&shutdown_rx);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
