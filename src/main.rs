use clap::Parser;
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;
use std::process::exit;
use std::sync::mpsc::channel;
use std::sync::Arc;
use tracing::{error, info};
use zip_backup::backup::backup_config::{Configuration, DEFAULT_CONFIG_FILE_NAME};
use zip_backup::backup::job::BackupJobRunner;
use zip_backup::backup::result_error::error::Error;
use zip_backup::backup::scheduler::Scheduler;

/// Periodically zip directories and copy the archives to several destinations
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE_NAME)]
    config: PathBuf,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let res = ThreadPoolBuilder::new()
        .build()
        .map_err(Error::from)
        .and_then(|pool| {
            Configuration::load(&args.config).map(|config| BackupJobRunner::new(config, Arc::new(pool)))
        })
        .map(|runner| {
            // sender stays alive for the whole process, the loop only ends on termination
            let (_shutdown_tx, shutdown_rx) = channel::<()>();
            Scheduler::new(runner).start_loop(&shutdown_rx)
        });

    match res {
        Ok(runs) => info!("Backup loop stopped after {runs} run(s)"),
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}
