//! ABOUTME: Atomic file replace, the reference step against real filesystem semantics
//! ABOUTME: Exercises every lifecycle obligation: write-probe, reversible mutation, best-effort restore, orphan cleanup

use crate::context::Context;
use crate::step::{Step, StepResult};
use async_trait::async_trait;
use provisio_core::ProvisioError;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Replaces `destination_path` with `source_path`, backing up any
/// pre-existing destination so `rollback` can restore it.
///
/// `backup_path` and `destination_existed_before` are written by `execute`
/// and read by `rollback`/`dispose`; a single instance must only ever drive
/// one workflow run.
pub struct AtomicFileReplace {
    source_path: PathBuf,
    destination_path: PathBuf,
    overwrite: bool,
    backup_path: Option<PathBuf>,
    destination_existed_before: bool,
}

impl AtomicFileReplace {
    #[must_use]
    pub fn new(source_path: impl Into<PathBuf>, destination_path: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            overwrite,
            backup_path: None,
            destination_existed_before: false,
        }
    }

    fn probe_path(&self) -> PathBuf {
        let Some(parent) = self.destination_path.parent() else {
            return self.destination_path.with_extension("probe");
        };
        parent.join(format!(".provisio-probe-{}", Uuid::new_v4()))
    }

    fn backup_candidate(&self) -> PathBuf {
        let suffix = format!(
            ".provisio-backup-{}",
            Uuid::new_v4().simple()
        );
        let mut name = self
            .destination_path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.destination_path
            .parent()
            .map(|parent| parent.join(&name))
            .unwrap_or_else(|| PathBuf::from(name))
    }

    fn probe_writable(directory: &Path, probe: &Path) -> Result<(), ProvisioError> {
        std::fs::write(probe, b"").map_err(|err| {
            ProvisioError::validation(
                "atomic-file-replace",
                format!("destination directory '{}' is not writable: {err}", directory.display()),
            )
        })?;
        let _ = std::fs::remove_file(probe);
        Ok(())
    }
}

#[async_trait]
impl Step for AtomicFileReplace {
    fn name(&self) -> &str {
        "atomic-file-replace"
    }

    fn description(&self) -> &str {
        "Atomically replaces a destination file with a source file, with backup/restore"
    }

    async fn validate(&mut self, _context: &Context) -> StepResult {
        if !self.source_path.is_file() {
            return StepResult::failure_with_error(
                format!("source '{}' does not exist or is not a file", self.source_path.display()),
                ProvisioError::validation(self.name(), "source path missing or not a regular file"),
            );
        }

        if std::fs::File::open(&self.source_path).is_err() {
            return StepResult::failure_with_error(
                format!("source '{}' is not readable", self.source_path.display()),
                ProvisioError::validation(self.name(), "source path not readable"),
            );
        }

        let Some(parent) = self.destination_path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return StepResult::failure_with_error(
                "destination path has no parent directory",
                ProvisioError::validation(self.name(), "destination path has no parent directory"),
            );
        };
        if !parent.is_dir() {
            return StepResult::failure_with_error(
                format!("destination parent '{}' does not exist", parent.display()),
                ProvisioError::validation(self.name(), "destination parent directory missing"),
            );
        }

        let probe = self.probe_path();
        if let Err(error) = Self::probe_writable(parent, &probe) {
            return StepResult::failure_with_error(error.to_string(), error);
        }

        if self.destination_path.exists() && !self.overwrite {
            return StepResult::failure_with_error(
                format!(
                    "destination '{}' already exists and overwrite is disabled",
                    self.destination_path.display()
                ),
                ProvisioError::validation(self.name(), "destination exists and overwrite is false"),
            );
        }

        StepResult::success("source readable, destination writable")
    }

    async fn execute(&mut self, _context: &Context) -> StepResult {
        self.destination_existed_before = self.destination_path.exists();

        if self.destination_existed_before && self.overwrite {
            let backup = self.backup_candidate();
            if let Err(err) = std::fs::copy(&self.destination_path, &backup) {
                return StepResult::failure_with_error(
                    format!("failed to back up existing destination: {err}"),
                    ProvisioError::execution(self.name(), err.to_string()),
                );
            }
            self.backup_path = Some(backup);
        }

        if let Err(err) = std::fs::copy(&self.source_path, &self.destination_path) {
            if let Some(backup) = self.backup_path.take() {
                let _ = std::fs::remove_file(&backup);
            }
            return StepResult::failure_with_error(
                format!("failed to copy '{}' to '{}': {err}", self.source_path.display(), self.destination_path.display()),
                ProvisioError::execution(self.name(), err.to_string()),
            );
        }

        StepResult::success(format!(
            "replaced '{}' with '{}'",
            self.destination_path.display(),
            self.source_path.display()
        ))
    }

    async fn rollback(&mut self, _context: &Context) -> StepResult {
        if let Some(backup) = self.backup_path.take() {
            if backup.exists() {
                return match std::fs::copy(&backup, &self.destination_path) {
                    Ok(_) => {
                        let _ = std::fs::remove_file(&backup);
                        StepResult::success("restored destination from backup")
                    }
                    Err(err) => {
                        self.backup_path = Some(backup);
                        StepResult::failure(format!("failed to restore backup: {err}"))
                    }
                };
            }
        }

        if !self.destination_existed_before && self.destination_path.exists() {
            return match std::fs::remove_file(&self.destination_path) {
                Ok(()) => StepResult::success("removed file created by execute"),
                Err(err) => StepResult::failure(format!("failed to remove destination: {err}")),
            };
        }

        StepResult::success("nothing to roll back")
    }

    async fn dispose(&mut self) -> StepResult {
        if let Some(backup) = self.backup_path.take() {
            if backup.exists() {
                if let Err(err) = std::fs::remove_file(&backup) {
                    return StepResult::failure(format!("failed to delete lingering backup: {err}"));
                }
            }
        }
        StepResult::success("disposed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trip_replace_rollback_dispose_when_destination_existed() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let destination = dir.path().join("dest.txt");
        std::fs::write(&source, b"new contents").unwrap();
        std::fs::write(&destination, b"old contents").unwrap();

        let context = Context::builder().build();
        let mut step = AtomicFileReplace::new(&source, &destination, true);

        let validated = step.validate(&context).await;
        assert!(validated.success);

        let executed = step.execute(&context).await;
        assert!(executed.success);
        assert_eq!(std::fs::read(&destination).unwrap(), b"new contents");
        assert!(step.backup_path.is_some());

        let rolled_back = step.rollback(&context).await;
        assert!(rolled_back.success);
        assert_eq!(std::fs::read(&destination).unwrap(), b"old contents");
        assert!(step.backup_path.is_none());

        let disposed = step.dispose().await;
        assert!(disposed.success);
    }

    #[tokio::test]
    async fn rollback_deletes_newly_created_destination() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let destination = dir.path().join("dest.txt");
        std::fs::write(&source, b"new contents").unwrap();

        let context = Context::builder().build();
        let mut step = AtomicFileReplace::new(&source, &destination, true);

        assert!(step.validate(&context).await.success);
        assert!(step.execute(&context).await.success);
        assert!(destination.exists());

        let rolled_back = step.rollback(&context).await;
        assert!(rolled_back.success);
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn validate_fails_when_destination_exists_and_overwrite_disabled() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let destination = dir.path().join("dest.txt");
        std::fs::write(&source, b"new contents").unwrap();
        std::fs::write(&destination, b"old contents").unwrap();

        let context = Context::builder().build();
        let mut step = AtomicFileReplace::new(&source, &destination, false);

        let result = step.validate(&context).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn validate_fails_when_source_missing() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("missing.txt");
        let destination = dir.path().join("dest.txt");

        let context = Context::builder().build();
        let mut step = AtomicFileReplace::new(&source, &destination, true);

        let result = step.validate(&context).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let destination = dir.path().join("dest.txt");
        std::fs::write(&source, b"new contents").unwrap();
        std::fs::write(&destination, b"old contents").unwrap();

        let context = Context::builder().build();
        let mut step = AtomicFileReplace::new(&source, &destination, true);
        assert!(step.validate(&context).await.success);
        assert!(step.execute(&context).await.success);

        assert!(step.dispose().await.success);
        assert!(step.dispose().await.success);
    }
}
