use crate::backup::archive::{ArchiveEntry, ArchiveEntryIterable};
use crate::backup::filter::ExtensionFilter;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};

use bon::Builder;
use dyn_iter::{DynIter, IntoDynIterator};
use function_name::named;
use getset::Getters;
use walkdir::{DirEntry, WalkDir};

use std::path::{Path, PathBuf};

#[cfg(test)]
thread_local! {
    /// Directory walks started on the current thread
    pub(crate) static WALKS_STARTED: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Recursively walks a source directory and yields the files whose
/// extension passes the filter.
///
/// Entry paths are relative to the parent of `src_dir`, so every entry
/// starts with the leaf name of `src_dir`. The root itself and directories
/// are never yielded.
#[derive(Clone, Debug, Builder, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct FilteredDirSource {
    #[builder(into)]
    src_dir: PathBuf,
    #[builder(default)]
    filter: ExtensionFilter,
}

impl ArchiveEntryIterable for FilteredDirSource {
    #[named]
    fn archive_entry_iterator<'a>(&self) -> Result<DynIter<'a, Result<ArchiveEntry>>> {
        if !self.src_dir.is_dir() {
            tracing::error!(
                "Source directory does not exist or is not a directory: {:?}",
                self.src_dir
            );
            return Err(Error::from(std::io::Error::other(
                "src_dir is not a directory",
            )));
        }

        tracing::info!("Starting directory scan: {:?}", self.src_dir);
        #[cfg(test)]
        WALKS_STARTED.with(|w| w.set(w.get() + 1));

        let base_dir = self
            .src_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let filter = self.filter.clone();

        let entries = WalkDir::new(&self.src_dir)
            .follow_links(true)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |res| match res {
                Ok(de) => process_dir_entry(de, &base_dir, &filter),
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    Some(Err(Error::from(e)
                        .add_fn_name(function_path!())
                        .source_file_unreadable(path)))
                }
            });

        Ok(entries.into_dyn_iter())
    }
}

fn process_dir_entry<P: AsRef<Path>>(
    de: DirEntry,
    base_dir: P,
    filter: &ExtensionFilter,
) -> Option<Result<ArchiveEntry>> {
    if !de.file_type().is_file() {
        tracing::trace!("Skipping {:?} not a file", de.path());
        return None;
    }

    let p = de.into_path();
    if !filter.is_path_allowed(&p) {
        tracing::trace!("Skipping {:?}, extension not allowed", p);
        return None;
    }

    let dst = match p.strip_prefix(base_dir.as_ref()) {
        Ok(stripped_path) => stripped_path.to_path_buf(),
        Err(e) => {
            return Some(Err(Error::from(e).add_msg(format!(
                "Stripping {:?} from {:?} failed",
                base_dir.as_ref(),
                p
            ))))
        }
    };

    let entry = ArchiveEntry::new(p, dst);
    tracing::trace!("Including file: {:?} -> {:?}", entry.src, entry.dst);
    Some(Ok(entry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn create_test_files(dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir.join("subdir/empty"))?;
        std::fs::write(dir.join("file1.txt"), "content1")?;
        std::fs::write(dir.join("file2.json"), "content2")?;
        std::fs::write(dir.join("subdir/file3.TXT"), "content3")?;
        std::fs::write(dir.join("subdir/file4.log"), "content4")?;
        std::fs::write(dir.join("Makefile"), "all:")?;
        Ok(())
    }

    fn entry_names(source: &FilteredDirSource) -> BTreeSet<String> {
        source
            .archive_entry_iterator()
            .unwrap()
            .map(|r| r.unwrap().entry_name())
            .collect()
    }

    #[test]
    fn test_wildcard_yields_every_file_under_leaf_name() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("project");
        create_test_files(&root).unwrap();

        let source = FilteredDirSource::builder()
            .src_dir(&root)
            .filter(ExtensionFilter::new(["*"]))
            .build();

        let expected: BTreeSet<String> = [
            "project/Makefile",
            "project/file1.txt",
            "project/file2.json",
            "project/subdir/file3.TXT",
            "project/subdir/file4.log",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(entry_names(&source), expected);
    }

    #[test]
    fn test_extension_filter_applied_case_insensitively() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("project");
        create_test_files(&root).unwrap();

        let source = FilteredDirSource::builder()
            .src_dir(&root)
            .filter(ExtensionFilter::new(["txt"]))
            .build();

        let expected: BTreeSet<String> = ["project/file1.txt", "project/subdir/file3.TXT"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(entry_names(&source), expected);
    }

    #[test]
    fn test_trailing_separator_on_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("project");
        create_test_files(&root).unwrap();
        let mut with_slash = root.into_os_string();
        with_slash.push("/");

        let source = FilteredDirSource::builder()
            .src_dir(PathBuf::from(with_slash))
            .filter(ExtensionFilter::new(["json"]))
            .build();

        let expected: BTreeSet<String> =
            ["project/file2.json"].into_iter().map(String::from).collect();
        assert_eq!(entry_names(&source), expected);
    }

    #[test]
    fn test_default_filter_yields_nothing() {
        let temp_dir = TempDir::new().unwrap();
        create_test_files(temp_dir.path()).unwrap();

        let source = FilteredDirSource::builder().src_dir(temp_dir.path()).build();
        assert!(entry_names(&source).is_empty());
    }

    #[test]
    fn test_nonexistent_directory() {
        let source = FilteredDirSource::builder()
            .src_dir("/nonexistent/directory")
            .filter(ExtensionFilter::new(["*"]))
            .build();
        assert!(source.archive_entry_iterator().is_err());
    }

    #[test]
    fn test_file_as_src_dir() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("not_a_directory.txt");
        std::fs::write(&file_path, "content").unwrap();

        let source = FilteredDirSource::builder()
            .src_dir(file_path)
            .filter(ExtensionFilter::new(["*"]))
            .build();
        assert!(source.archive_entry_iterator().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_reported_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("project");
        create_test_files(&root).unwrap();
        std::os::unix::fs::symlink(root.join("missing"), root.join("broken.txt")).unwrap();

        let source = FilteredDirSource::builder()
            .src_dir(&root)
            .filter(ExtensionFilter::new(["txt"]))
            .build();
        let results: Vec<_> = source.archive_entry_iterator().unwrap().collect();

        let errors: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::SourceFileUnreadable { .. }));
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    }
}
