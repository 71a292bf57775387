//! Validation functions for configuration values and destination directories.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::schedule;

use std::path::Path;
use tempfile::Builder;
use validator::ValidationError;

pub fn validate_days_of_week(days: &str) -> std::result::Result<(), ValidationError> {
    let mut count = 0;
    for token in schedule::tokens(days) {
        if !schedule::is_valid_token(token) {
            return Err(ValidationError::new("InvalidDaysOfWeek").with_message(
                format!("Invalid day token {token:?}, expected 0-7 or '*'").into(),
            ));
        }
        count += 1;
    }

    if count == 0 {
        return Err(ValidationError::new("InvalidDaysOfWeek")
            .with_message("DaysOfWeek must contain at least one token".into()));
    }

    Ok(())
}

pub fn validate_extensions(extensions: &[String]) -> std::result::Result<(), ValidationError> {
    match extensions
        .iter()
        .find(|e| e.contains('/') || e.contains('\\'))
    {
        Some(e) => Err(ValidationError::new("InvalidExtension")
            .with_message(format!("Extension {e:?} must not contain a path separator").into())),
        None => Ok(()),
    }
}

/// Makes sure `dir` is an existing writable directory, creating it and any
/// missing parents when absent.
///
/// Writability is checked by creating and removing a scratch file, so ACLs,
/// read-only mounts and ownership are all taken into account.
pub fn ensure_writable_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(Error::from(std::io::Error::other(format!(
                "{:?} is not a directory",
                dir
            ))));
        }
    } else {
        tracing::info!("Creating destination directory {:?}", dir);
        std::fs::create_dir_all(dir)?;
    }

    let scratch = Builder::new()
        .prefix(".write_check")
        .tempfile_in(dir)
        .map_err(|e| {
            Error::from(std::io::Error::new(
                e.kind(),
                format!("cannot write to dir {:?}: {e}", dir),
            ))
        })?;
    scratch.close()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_days_of_week() {
        assert!(validate_days_of_week("*").is_ok());
        assert!(validate_days_of_week("1 2 3").is_ok());
        assert!(validate_days_of_week("0,7").is_ok());
        assert!(validate_days_of_week("").is_err());
        assert!(validate_days_of_week("1 9").is_err());
        assert!(validate_days_of_week("monday").is_err());
    }

    #[test]
    fn test_validate_extensions() {
        assert!(validate_extensions(&["txt".to_string(), "*".to_string()]).is_ok());
        assert!(validate_extensions(&[]).is_ok());
        assert!(validate_extensions(&["a/b".to_string()]).is_err());
    }

    #[test]
    fn test_ensure_writable_dir_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a/b/c");
        ensure_writable_dir(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_writable_dir(&nested).unwrap();
    }

    #[test]
    fn test_ensure_writable_dir_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain");
        std::fs::write(&file, "x").unwrap();
        assert!(ensure_writable_dir(&file).is_err());
    }

    #[test]
    fn test_ensure_writable_dir_leaves_no_scratch_file() {
        let temp_dir = TempDir::new().unwrap();
        ensure_writable_dir(temp_dir.path()).unwrap();
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_writable_dir_rejects_unwritable_dir() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let locked = temp_dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Mode bits say read-only, but privileged users can still write here
        assert!(std::fs::metadata(&locked).unwrap().permissions().readonly());
        let writable = std::fs::write(locked.join("x"), "x").is_ok();
        let _ = std::fs::remove_file(locked.join("x"));

        assert_eq!(ensure_writable_dir(&locked).is_ok(), writable);
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
