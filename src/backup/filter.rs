//! File eligibility by extension.
//!
//! Extensions are compared case-insensitively against the text after the
//! last `.` of a file name. The `*` token admits every file, including
//! files without an extension.

use itertools::Itertools;
use std::collections::HashSet;
use std::path::Path;

/// Token that admits every file name
pub static WILDCARD: &str = "*";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    allow_all: bool,
    extensions: HashSet<String>,
}

impl ExtensionFilter {
    /// Builds a filter from configured tokens.
    ///
    /// Tokens are trimmed and a single leading `.` is dropped, so `"txt"`,
    /// `".TXT"` and `" Txt "` all select the same files.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokens = extensions
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .collect_vec();
        let allow_all = tokens.iter().any(|t| t == WILDCARD);
        let extensions = tokens
            .iter()
            .map(|t| t.strip_prefix('.').unwrap_or(t).to_lowercase())
            .collect();

        Self {
            allow_all,
            extensions,
        }
    }

    pub fn is_allowed<S: AsRef<str>>(&self, file_name: S) -> bool {
        if self.allow_all {
            return true;
        }
        if self.extensions.is_empty() {
            return false;
        }

        self.extensions
            .contains(&extension_of(file_name.as_ref()).to_lowercase())
    }

    /// Same as [`ExtensionFilter::is_allowed`] using the last component of `path`.
    pub fn is_path_allowed<P: AsRef<Path>>(&self, path: P) -> bool {
        match path.as_ref().file_name() {
            Some(name) => self.is_allowed(name.to_string_lossy()),
            None => self.allow_all,
        }
    }
}

/// Text after the last `.`, or empty when the name has no dot.
pub fn extension_of(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) => &file_name[idx + 1..],
        None => "",
    }
}
