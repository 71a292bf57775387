//! Builds one zip archive from one source root.
//!
//! The archive is streamed into `<archive>.tmp` next to its final location
//! and renamed once the central directory has been written and synced.

use crate::backup::archive::walkdir_filter::FilteredDirSource;
use crate::backup::archive::{tmp_path_of, ArchiveEntry, ArchiveEntryIterable};
use crate::backup::filter::ExtensionFilter;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;

use chrono::{DateTime, Datelike, Local, Timelike};
use std::fs::{File, Metadata};
use std::io::{BufWriter, IntoInnerError, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entries at or above this size need zip64 headers
static ZIP64_THRESHOLD: u64 = u32::MAX as u64;

#[derive(Debug)]
pub struct BuildReport {
    pub archive_path: PathBuf,
    pub entry_count: usize,
    /// Files that could not be added, the archive holds everything else
    pub skipped: Vec<Error>,
}

/// Walks `source_root` and writes every file accepted by `filter` into a
/// new zip archive at `archive_path`.
///
/// A file that cannot be opened or read is logged, recorded in
/// [`BuildReport::skipped`] and left out. Failing to walk the root or to
/// create/finish the archive itself is returned as an error and no archive
/// is left behind.
pub fn build_archive<P1: AsRef<Path>, P2: AsRef<Path>>(
    source_root: P1,
    archive_path: P2,
    filter: &ExtensionFilter,
) -> Result<BuildReport> {
    let source_root = source_root.as_ref();
    let archive_path = archive_path.as_ref();

    let entries = FilteredDirSource::builder()
        .src_dir(source_root)
        .filter(filter.clone())
        .build()
        .archive_entry_iterator()
        .add_msg(format!("Cannot walk source root {:?}", source_root))?;

    let tmp_path = tmp_path_of(archive_path);
    write_zip(entries, &tmp_path)
        .and_then(|(entry_count, skipped)| {
            std::fs::rename(&tmp_path, archive_path)?;
            Ok(BuildReport {
                archive_path: archive_path.to_path_buf(),
                entry_count,
                skipped,
            })
        })
        .map_err(|mut e| {
            if let Err(e2) = std::fs::remove_file(&tmp_path) {
                if e2.kind() != std::io::ErrorKind::NotFound {
                    e = e.chain(Error::from(e2).add_msg("Delete tmp file failed."));
                }
            }
            e.archive_creation_failed(archive_path)
        })
}

fn write_zip<I: Iterator<Item = Result<ArchiveEntry>>>(
    entries: I,
    tmp_path: &Path,
) -> Result<(usize, Vec<Error>)> {
    let mut writer = ZipWriter::new(BufWriter::new(File::create(tmp_path)?));

    let mut entry_count = 0;
    let mut skipped = Vec::new();
    for entry in entries {
        match entry.and_then(|entry| append_entry(&mut writer, &entry)) {
            Ok(()) => entry_count += 1,
            Err(e) => {
                tracing::warn!("Ignoring entry: {e}");
                skipped.push(e);
            }
        }
    }

    writer
        .finish()?
        .into_inner()
        .map_err(IntoInnerError::into_error)?
        .sync_all()?;

    tracing::info!(
        "Processed {} archive entries, skipped {}",
        entry_count,
        skipped.len()
    );
    Ok((entry_count, skipped))
}

fn append_entry<W: Write + Seek>(writer: &mut ZipWriter<W>, entry: &ArchiveEntry) -> Result<()> {
    let unreadable = |e: Error| e.source_file_unreadable(entry.src.to_path_buf());

    let mut file = File::open(&entry.src).map_err(|e| unreadable(e.into()))?;
    let metadata = file.metadata().map_err(|e| unreadable(e.into()))?;
    let name = entry.entry_name();

    writer
        .start_file(name.as_str(), entry_options(&metadata))
        .map_err(|e| unreadable(e.into()))?;

    if let Err(e) = std::io::copy(&mut file, writer) {
        let mut e = Error::from(e);
        if let Err(e2) = writer.abort_file() {
            e = e.chain(e2.into());
        }
        return Err(unreadable(e));
    }

    tracing::debug!("Added {:?} as {}", entry.src, name);
    Ok(())
}

fn entry_options(metadata: &Metadata) -> SimpleFileOptions {
    // level 1: favour throughput over ratio
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(1))
        .large_file(metadata.len() >= ZIP64_THRESHOLD)
        .last_modified_time(modified_time(metadata));

    #[cfg(unix)]
    let options = {
        use std::os::unix::fs::PermissionsExt;
        options.unix_permissions(metadata.permissions().mode())
    };

    options
}

fn modified_time(metadata: &Metadata) -> zip::DateTime {
    metadata
        .modified()
        .ok()
        .map(DateTime::<Local>::from)
        .and_then(|dt| {
            zip::DateTime::from_date_and_time(
                u16::try_from(dt.year()).ok()?,
                dt.month() as u8,
                dt.day() as u8,
                dt.hour() as u8,
                dt.minute() as u8,
                dt.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}
