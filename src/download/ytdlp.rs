//! yt-dlp backed [`MediaExtractor`] used in production.
//!
//! Both operations run yt-dlp as a child process awaited from the async
//! runtime, so a slow probe or a long transcode never blocks the task that
//! answers other users.
//!
//! yt-dlp hands merging and audio extraction to ffmpeg, so a run is a process
//! tree. On unix each run gets its own process group, and dropping the run
//! (timeout, cancellation) kills the whole group, not only yt-dlp.

use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::download::error::DownloadFailure;
use crate::download::extractor::{ExtractorError, FetchSpec, MediaExtractor, PostProcess, ProbeOptions, RawMetadata};

/// Keep at most this much stderr in error values and logs
const STDERR_TAIL_CHARS: usize = 2000;

/// Extractor backed by the yt-dlp command line.
pub struct YtDlpExtractor {
    bin: String,
}

impl YtDlpExtractor {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(&self, args: &[String]) -> Result<std::process::Output, ExtractorError> {
        log::debug!("yt-dlp command: {} {}", self.bin, args.join(" "));
        let mut command = Command::new(&self.bin);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| ExtractorError::Spawn {
            bin: self.bin.clone(),
            source,
        })?;
        let group = ProcessGroupGuard::new(child.id());
        let output = child.wait_with_output().await?;
        // yt-dlp waits for its postprocessors, so the group is empty by now
        group.disarm();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = classify_stderr(&stderr);
            log::warn!("yt-dlp failed ({:?}): {}", reason, stderr_tail(&stderr));
            return Err(ExtractorError::Failed {
                status: output.status.to_string(),
                stderr: stderr_tail(&stderr),
                reason,
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn probe(&self, url: &str, options: &ProbeOptions) -> Result<RawMetadata, ExtractorError> {
        let args = build_probe_args(url, options);
        let output = self.run(&args).await?;
        let metadata: RawMetadata = serde_json::from_slice(&output.stdout)?;
        Ok(metadata)
    }

    async fn fetch(&self, url: &str, spec: &FetchSpec, output_template: &Path) -> Result<PathBuf, ExtractorError> {
        let args = build_fetch_args(url, spec, output_template);
        let output = self.run(&args).await?;

        let printed = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(PathBuf::from);

        match printed {
            Some(path) if path.exists() => Ok(path),
            _ => find_output_file(output_template),
        }
    }
}

/// Kills a child's process group when dropped before the child was reaped.
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        log::debug!("Killing extractor process group {}", pgid);
        #[cfg(unix)]
        if let Ok(pgid) = libc::pid_t::try_from(pgid) {
            // SAFETY: killpg only sends a signal; the group was created for this child.
            #[allow(unsafe_code)]
            let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
            if rc != 0 {
                log::debug!("killpg({}) failed: {}", pgid, std::io::Error::last_os_error());
            }
        }
    }
}

/// Arguments for a metadata-only probe.
pub fn build_probe_args(url: &str, options: &ProbeOptions) -> Vec<String> {
    let mut args: Vec<String> = vec!["-J".into(), "--no-warnings".into()];
    if options.flat_playlist {
        args.push("--flat-playlist".into());
    }
    args.push("--playlist-end".into());
    args.push(options.playlist_limit.to_string());
    // URL after `--` so it can never be read as an option
    args.push("--".into());
    args.push(url.to_string());
    args
}

/// Arguments for a download into `output_template`.
pub fn build_fetch_args(url: &str, spec: &FetchSpec, output_template: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--no-warnings".into(),
        "--no-playlist".into(),
        "--no-part".into(),
        "-f".into(),
        spec.format.clone(),
        "-o".into(),
        output_template.to_string_lossy().into_owned(),
    ];

    match spec.postprocess {
        PostProcess::ExtractAudio { codec, bitrate_kbps } => {
            args.extend([
                "--extract-audio".into(),
                "--audio-format".into(),
                codec.to_string(),
                "--audio-quality".into(),
                format!("{}K", bitrate_kbps),
            ]);
        }
        PostProcess::Merge { container } => {
            args.extend(["--merge-output-format".into(), container.to_string()]);
        }
    }

    // Final path after post-processing, on stdout
    args.extend([
        "--no-simulate".into(),
        "--print".into(),
        "after_move:filepath".into(),
        "--".into(),
        url.to_string(),
    ]);
    args
}

/// Locates the file yt-dlp wrote for `output_template` (`<dir>/<stem>.%(ext)s`)
/// when the printed path is missing.
pub fn find_output_file(output_template: &Path) -> Result<PathBuf, ExtractorError> {
    let template = output_template.to_string_lossy().into_owned();
    let dir = output_template
        .parent()
        .ok_or_else(|| ExtractorError::MissingOutput(template.clone()))?;
    let prefix = output_template
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix("%(ext)s"))
        .ok_or_else(|| ExtractorError::MissingOutput(template.clone()))?;

    let mut found: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(prefix) && !name.ends_with(".part") && !name.ends_with(".ytdl"))
                .unwrap_or(false)
        })
        .collect();
    found.sort();

    let path = found.pop().ok_or_else(|| {
        log::error!("No matching files found in directory: {}", dir.display());
        ExtractorError::MissingOutput(template)
    })?;
    log::info!("Found actual downloaded file: {}", path.display());
    Ok(path)
}

/// Guesses the failure cause from yt-dlp's stderr.
pub fn classify_stderr(stderr: &str) -> DownloadFailure {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("unsupported url") {
        return DownloadFailure::Unsupported;
    }

    if stderr_lower.contains("requested format is not available") || stderr_lower.contains("no video formats found") {
        return DownloadFailure::FormatUnavailable;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("available in your country")
        || stderr_lower.contains("not made this video available")
        || stderr_lower.contains("geo restrict")
        || stderr_lower.contains("geo-restrict")
        || stderr_lower.contains("video has been removed")
        || stderr_lower.contains("sign in to confirm")
    {
        return DownloadFailure::Unavailable;
    }

    if stderr_lower.contains("timed out")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network is unreachable")
        || stderr_lower.contains("name resolution")
        || stderr_lower.contains("failed to connect")
    {
        return DownloadFailure::Network;
    }

    DownloadFailure::Other
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().skip(count - STDERR_TAIL_CHARS).collect()
    }
}
