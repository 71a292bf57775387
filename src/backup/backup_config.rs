use crate::backup::filter::ExtensionFilter;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::validate::{validate_days_of_week, validate_extensions};

use bon::Builder;
use derive_more::{Deref, Display, From};
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use validator::Validate;

pub static DEFAULT_CONFIG_FILE_NAME: &str = "config.json";

/// Days-of-week token list, e.g. `"1 3 5"` or `"*"`
#[derive(Clone, Debug, Display, From, Deref, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DaysOfWeek(String);

impl From<&str> for DaysOfWeek {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Immutable description of what to back up, where, and when.
///
/// Keys are PascalCase on disk (`BackupPaths`, `WriterPaths`, ...). The first
/// entry of `writer_paths` is the primary destination: it receives the
/// freshly built archive, every other destination gets a byte copy.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, PartialEq, Eq, Getters)]
#[serde(rename_all = "PascalCase")]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct Configuration {
    #[validate(length(min = 1))]
    #[builder(into)]
    backup_paths: Vec<PathBuf>,
    #[validate(length(min = 1))]
    #[builder(into)]
    writer_paths: Vec<PathBuf>,
    #[serde(default)]
    #[validate(custom(function = validate_extensions))]
    #[builder(default, into)]
    extensions: Vec<String>,
    /// Minutes between two runs
    #[validate(range(min = 1))]
    frequency: u32,
    #[validate(custom(function = validate_days_of_week))]
    #[builder(into)]
    days_of_week: DaysOfWeek,
}

impl Configuration {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.frequency) * 60)
    }

    pub fn extension_filter(&self) -> ExtensionFilter {
        ExtensionFilter::new(&self.extensions)
    }

    /// Sample configuration written when no configuration file exists yet.
    pub fn bootstrap_default() -> Self {
        Configuration::builder()
            .backup_paths(vec![
                PathBuf::from("mypath1/data"),
                PathBuf::from("mypath2/data"),
            ])
            .writer_paths(vec![PathBuf::from("C:/MyBackupPath")])
            .extensions(vec!["TXT".to_string()])
            .days_of_week("1 2 3")
            .frequency(20)
            .build()
    }

    /// Reads and validates the configuration at `path`.
    ///
    /// YAML is used for `.yml`/`.yaml` files, JSON for everything else. When
    /// the file does not exist a default one is written there and loading
    /// still fails, so the operator edits it before the first real run.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::load_inner(path).map_err(|e| e.configuration_unavailable(path))
    }

    fn load_inner(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Configuration {:?} not found, writing default", path);
            Self::bootstrap_default().write_to(path)?;
            return Err(Error::from(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "default configuration written, edit it and restart",
            )));
        }

        let reader = BufReader::new(File::open(path)?);
        let config: Configuration = if is_yaml(path) {
            serde_yml::from_reader(reader)
                .map_err(Error::from)
                .add_msg(format!("Parse YAML config failed: {:?}", path))?
        } else {
            serde_json::from_reader(reader)
                .map_err(Error::from)
                .add_msg(format!("Parse JSON config failed: {:?}", path))?
        };

        config
            .validate()
            .map_err(Error::from)
            .add_msg(format!("Config validation failed: {:?}", path))?;

        info!(
            "Loaded configuration {:?}: {} source(s), {} destination(s), every {} minute(s)",
            path,
            config.backup_paths.len(),
            config.writer_paths.len(),
            config.frequency
        );
        Ok(config)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        if is_yaml(path) {
            serde_yml::to_writer(&mut writer, self)?;
        } else {
            serde_json::to_writer_pretty(&mut writer, self)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
        .unwrap_or(false)
}
