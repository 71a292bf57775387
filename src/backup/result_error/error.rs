use crate::backup::result_error::{AddDebugObjectAndFnName, AddFunctionName, AddMsg};
use itertools::Itertools;
use std::fmt::Debug;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    ThreadPoolBuildError(#[from] rayon::ThreadPoolBuildError),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    StripPrefix(#[from] std::path::StripPrefixError),
    #[error("Configuration {:?} unavailable:\n{}", path, indent::indent_all_with("  ", error.to_string()))]
    ConfigurationUnavailable { path: PathBuf, error: Box<Error> },
    #[error("Destination {:?} unusable:\n{}", path, indent::indent_all_with("  ", error.to_string()))]
    DestinationUnusable { path: PathBuf, error: Box<Error> },
    #[error("Source file {:?} unreadable:\n{}", path, indent::indent_all_with("  ", error.to_string()))]
    SourceFileUnreadable { path: PathBuf, error: Box<Error> },
    #[error("Archive creation at {:?} failed:\n{}", path, indent::indent_all_with("  ", error.to_string()))]
    ArchiveCreationFailed { path: PathBuf, error: Box<Error> },
    #[error("Replication to {:?} failed:\n{}", path, indent::indent_all_with("  ", error.to_string()))]
    ReplicationFailed { path: PathBuf, error: Box<Error> },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{} failed:\n{}", fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithFnName { fn_name: String, error: Box<Error> },
    #[error("{:?} {} failed:\n{}", obj_debug, fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send>,
        fn_name: String,
    },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>, O: Debug + Send + 'static> AddDebugObjectAndFnName<S, O> for Error {
    fn add_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> AddMsg<S> for Error {
    fn add_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl<S: Into<String>> AddFunctionName<S> for Error {
    fn add_fn_name(self, fn_name: S) -> Self {
        Self::WithFnName {
            fn_name: fn_name.into(),
            error: Box::new(self),
        }
    }
}

impl From<Vec<Error>> for Error {
    fn from(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            panic!("Should not create lots of errors when error is empty")
        }
        Self::LotsOfError(errors.into_iter().flat_map(|e| e.into_iter()).collect_vec())
    }
}

impl Error {
    pub fn configuration_unavailable<P: Into<PathBuf>>(self, path: P) -> Self {
        Self::ConfigurationUnavailable {
            path: path.into(),
            error: Box::new(self),
        }
    }

    pub fn destination_unusable<P: Into<PathBuf>>(self, path: P) -> Self {
        Self::DestinationUnusable {
            path: path.into(),
            error: Box::new(self),
        }
    }

    pub fn source_file_unreadable<P: Into<PathBuf>>(self, path: P) -> Self {
        Self::SourceFileUnreadable {
            path: path.into(),
            error: Box::new(self),
        }
    }

    pub fn archive_creation_failed<P: Into<PathBuf>>(self, path: P) -> Self {
        Self::ArchiveCreationFailed {
            path: path.into(),
            error: Box::new(self),
        }
    }

    pub fn replication_failed<P: Into<PathBuf>>(self, path: P) -> Self {
        Self::ReplicationFailed {
            path: path.into(),
            error: Box::new(self),
        }
    }

    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(|e| e.into_iter())),
            e => Box::new(std::iter::once(e)),
        }
    }

    pub fn chain(self, other: Error) -> Error {
        Error::LotsOfError(self.into_iter().chain(other.into_iter()).collect_vec())
    }
}
