//! Fan-out of a finished archive to the secondary destinations.

use crate::backup::archive::tmp_path_of;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;

use rayon::prelude::*;
use rayon::ThreadPool;
use std::fs::File;
use std::io::{BufReader, BufWriter, IntoInnerError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct DestinationReplicator {
    pool: Arc<ThreadPool>,
}

impl DestinationReplicator {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        Self { pool }
    }

    /// Copies `source_archive` byte for byte to every path in `destinations`.
    ///
    /// Copies are independent: each failure is collected as
    /// [`Error::ReplicationFailed`] and the others still run.
    pub fn copy_to<P: AsRef<Path>>(&self, source_archive: P, destinations: &[PathBuf]) -> Vec<Error> {
        let source_archive = source_archive.as_ref();
        self.pool.install(|| {
            destinations
                .par_iter()
                .filter_map(|dst| match copy_file(source_archive, dst) {
                    Ok(bytes) => {
                        tracing::info!("Copied {:?} to {:?} ({} bytes)", source_archive, dst, bytes);
                        None
                    }
                    Err(e) => {
                        let e = e.replication_failed(dst);
                        tracing::error!("{e}");
                        Some(e)
                    }
                })
                .collect()
        })
    }
}

/// Streams `src` into `<dst>.tmp` and renames it to `dst`.
pub fn copy_file<P1: AsRef<Path>, P2: AsRef<Path>>(src: P1, dst: P2) -> Result<u64> {
    let src = src.as_ref();
    let dst = dst.as_ref();
    let tmp_path = tmp_path_of(dst);

    let res = (|| -> Result<u64> {
        let mut reader = BufReader::new(File::open(src)?);
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        let bytes = std::io::copy(&mut reader, &mut writer)?;
        writer
            .into_inner()
            .map_err(IntoInnerError::into_error)?
            .sync_all()?;
        std::fs::rename(&tmp_path, dst)?;
        Ok(bytes)
    })();

    res.map_err(|mut e| {
        if let Err(e2) = std::fs::remove_file(&tmp_path) {
            if e2.kind() != std::io::ErrorKind::NotFound {
                e = e.chain(Error::from(e2).add_msg("Delete tmp file failed."));
            }
        }
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::ThreadPoolBuilder;
    use tempfile::TempDir;

    fn replicator() -> DestinationReplicator {
        DestinationReplicator::new(Arc::new(ThreadPoolBuilder::new().num_threads(2).build().unwrap()))
    }

    #[test]
    fn test_copy_to_two_destinations_byte_identical() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("Backup.zip");
        let content: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();
        std::fs::write(&src, &content).unwrap();
        for d in ["b", "c"] {
            std::fs::create_dir(temp_dir.path().join(d)).unwrap();
        }
        let dsts = vec![
            temp_dir.path().join("b/Backup.zip"),
            temp_dir.path().join("c/Backup.zip"),
        ];

        let errors = replicator().copy_to(&src, &dsts);

        assert!(errors.is_empty());
        for dst in &dsts {
            assert_eq!(std::fs::metadata(dst).unwrap().len(), content.len() as u64);
            assert_eq!(std::fs::read(dst).unwrap(), content);
            assert!(!tmp_path_of(dst).exists());
        }
    }

    #[test]
    fn test_one_failure_does_not_stop_others() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("Backup.zip");
        std::fs::write(&src, b"zip bytes").unwrap();
        std::fs::create_dir(temp_dir.path().join("ok")).unwrap();
        let good = temp_dir.path().join("ok/Backup.zip");
        let bad = temp_dir.path().join("missing/Backup.zip");

        let errors = replicator().copy_to(&src, &[bad.clone(), good.clone()]);

        assert_eq!(errors.len(), 1);
        match &errors[0] {
            Error::ReplicationFailed { path, .. } => assert_eq!(path, &bad),
            e => panic!("Expected ReplicationFailed, got {e}"),
        }
        assert_eq!(std::fs::read(&good).unwrap(), b"zip bytes");
    }

    #[test]
    fn test_missing_source_fails_every_destination() {
        let temp_dir = TempDir::new().unwrap();
        let dsts = vec![temp_dir.path().join("x.zip"), temp_dir.path().join("y.zip")];

        let errors = replicator().copy_to(temp_dir.path().join("nope.zip"), &dsts);

        assert_eq!(errors.len(), 2);
        assert!(!dsts[0].exists());
        assert!(!tmp_path_of(&dsts[0]).exists());
    }

    #[test]
    fn test_no_destinations_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        assert!(replicator()
            .copy_to(temp_dir.path().join("nope.zip"), &[])
            .is_empty());
    }

    #[test]
    fn test_copy_file_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.zip");
        let dst = temp_dir.path().join("dst.zip");
        std::fs::write(&src, b"new").unwrap();
        std::fs::write(&dst, b"old and longer").unwrap();

        assert_eq!(copy_file(&src, &dst).unwrap(), 3);
        assert_eq!(std::fs::read(&dst).unwrap(), b"new");
    }
}
