//! Temporary download artifacts.
//!
//! Every job owns exactly one [`TempArtifact`]: a unique file stem inside the
//! temp directory. Whatever the extractor writes under that stem (the final
//! file, `.part` leftovers, intermediate streams before a merge) is removed by
//! [`TempArtifact::cleanup`], which is idempotent and also runs on drop, so an
//! aborted job still leaves nothing behind.

use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct TempArtifact {
    dir: PathBuf,
    stem: String,
    path: Option<PathBuf>,
}

impl TempArtifact {
    /// Unique artifact for `job_id`: `download_<timestamp>_<job id>`.
    pub fn for_job(dir: impl Into<PathBuf>, job_id: Uuid) -> Self {
        let stem = format!(
            "download_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            job_id.simple()
        );
        Self {
            dir: dir.into(),
            stem,
            path: None,
        }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Output template handed to the extractor (`<dir>/<stem>.%(ext)s`).
    pub fn output_template(&self) -> PathBuf {
        self.dir.join(format!("{}.%(ext)s", self.stem))
    }

    /// Records the file the extractor reported.
    pub fn set_path(&mut self, path: PathBuf) {
        self.path = Some(path);
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Deletes the recorded file and anything else written under this stem.
    /// Returns the number of files removed. Safe to call any number of times.
    pub fn cleanup(&mut self) -> usize {
        let mut removed = 0;

        if let Some(path) = self.path.take() {
            removed += remove_if_present(&path);
        }

        let prefix = format!("{}.", self.stem);
        match fs::read_dir(&self.dir) {
            Ok(entries) => {
                for entry in entries.filter_map(Result::ok) {
                    let matches = entry
                        .file_name()
                        .to_str()
                        .map(|name| name.starts_with(&prefix))
                        .unwrap_or(false);
                    if matches {
                        removed += remove_if_present(&entry.path());
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to scan {} for leftovers: {}", self.dir.display(), e),
        }

        if removed > 0 {
            log::info!("Cleaned up {} file(s) for {}", removed, self.stem);
        }
        removed
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_if_present(path: &Path) -> usize {
    match fs::remove_file(path) {
        Ok(()) => 1,
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => {
            log::error!("Failed to delete {}: {}", path.display(), e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stems_are_unique_per_job() {
        let a = TempArtifact::for_job("/tmp", Uuid::new_v4());
        let b = TempArtifact::for_job("/tmp", Uuid::new_v4());
        assert_ne!(a.stem(), b.stem());
        assert!(a.stem().starts_with("download_"));
    }

    #[test]
    fn test_output_template() {
        let a = TempArtifact::for_job("/data/tmp", Uuid::nil());
        let template = a.output_template();
        assert!(template.starts_with("/data/tmp"));
        assert!(template.to_string_lossy().ends_with("_00000000000000000000000000000000.%(ext)s"));
    }

    #[test]
    fn test_cleanup_removes_stem_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifact = TempArtifact::for_job(dir.path(), Uuid::new_v4());
        let stem = artifact.stem().to_string();
        let final_path = dir.path().join(format!("{}.mp4", stem));
        fs::write(&final_path, b"video").unwrap();
        fs::write(dir.path().join(format!("{}.f137.mp4.part", stem)), b"part").unwrap();
        fs::write(dir.path().join("download_other_job.mp4"), b"keep").unwrap();
        artifact.set_path(final_path.clone());

        assert_eq!(artifact.cleanup(), 2);
        assert!(!final_path.exists());
        assert!(dir.path().join("download_other_job.mp4").exists());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifact = TempArtifact::for_job(dir.path(), Uuid::new_v4());
        let path = dir.path().join(format!("{}.mp3", artifact.stem()));
        fs::write(&path, b"audio").unwrap();
        artifact.set_path(path.clone());

        assert_eq!(artifact.cleanup(), 1);
        assert_eq!(artifact.cleanup(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path;
        {
            let artifact = TempArtifact::for_job(dir.path(), Uuid::new_v4());
            path = dir.path().join(format!("{}.mp4", artifact.stem()));
            fs::write(&path, b"video").unwrap();
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_with_missing_dir() {
        let mut artifact = TempArtifact::for_job("/nonexistent/dorafetch-dir", Uuid::new_v4());
        assert_eq!(artifact.cleanup(), 0);
    }
}
