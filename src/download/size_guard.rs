//! Upload size ceiling checks.
//!
//! [`admits`] is the catalog pre-filter on source-reported sizes, which are
//! estimates at best. [`verify`] runs on the real file after the download and
//! is the check that counts.

use std::path::Path;

use crate::download::error::{DownloadFailure, JobError};

/// Whether a format with the given declared size may be offered.
/// `0` means the source did not report a size; such formats are admitted.
pub fn admits(estimated_size_bytes: u64, max_file_size: u64) -> bool {
    estimated_size_bytes == 0 || estimated_size_bytes <= max_file_size
}

/// Checks the downloaded file against the ceiling and returns its size.
pub async fn verify(path: &Path, max_file_size: u64) -> Result<u64, JobError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        JobError::download(
            DownloadFailure::Other,
            format!("downloaded file not found at {}: {}", path.display(), e),
        )
    })?;

    let actual = metadata.len();
    if actual > max_file_size {
        log::warn!(
            "File {} too large: {} bytes (max: {} bytes)",
            path.display(),
            actual,
            max_file_size
        );
        return Err(JobError::ExceedsLimit {
            actual,
            limit: max_file_size,
        });
    }

    Ok(actual)
}
