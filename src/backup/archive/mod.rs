pub mod walkdir_filter;
pub mod zip_writer;

use crate::backup::result_error::result::Result;
use dyn_iter::DynIter;
use itertools::Itertools;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Represents a single file to be included in a backup archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Source file path on the filesystem
    pub src: Arc<Path>,

    /// Path stored inside the archive
    ///
    /// Starts with the leaf directory name of the source root, so extracting
    /// the archive recreates that directory.
    pub dst: Arc<Path>,
}

impl ArchiveEntry {
    pub fn new<A: Into<Arc<Path>>, B: Into<Arc<Path>>>(src: A, dst: B) -> ArchiveEntry {
        Self {
            src: src.into(),
            dst: dst.into(),
        }
    }

    /// Entry name as written in the zip directory, always `/` separated.
    pub fn entry_name(&self) -> String {
        self.dst
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy()),
                _ => None,
            })
            .join("/")
    }
}

/// Trait for generating archive entries from a source
///
/// The iterator yields Results so a single unreadable file can be reported
/// and skipped without ending the walk.
pub trait ArchiveEntryIterable {
    fn archive_entry_iterator<'a>(&self) -> Result<DynIter<'a, Result<ArchiveEntry>>>;
}

/// One source root to archive during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTask {
    pub source_root: PathBuf,
    pub archive_file_name: String,
    /// Usable destination directories, primary first
    pub destinations: Vec<PathBuf>,
}

impl ArchiveTask {
    pub fn primary_archive_path(&self) -> Option<PathBuf> {
        self.destinations
            .first()
            .map(|d| d.join(&self.archive_file_name))
    }

    pub fn secondary_archive_paths(&self) -> Vec<PathBuf> {
        self.destinations
            .iter()
            .skip(1)
            .map(|d| d.join(&self.archive_file_name))
            .collect_vec()
    }
}

/// Sibling path used while a file is being written, `<path>.tmp`.
pub fn tmp_path_of<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut s: OsString = path.as_ref().as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}
