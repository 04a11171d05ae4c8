use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempPath;
use tokio::process::Command;
use url::Url;

use crate::{Result, SummarizerError};

/// Validate a URL and return normalized version
pub fn validate_and_normalize_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url.trim())
        .map_err(|_| SummarizerError::Validation(format!("Invalid URL format: {}", url)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SummarizerError::Validation(
            "URL must use HTTP or HTTPS protocol".to_string(),
        ));
    }

    Ok(parsed.to_string())
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Elapsed wall time, sub-second precision below one minute
pub fn format_elapsed(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.2}s", seconds)
    } else {
        format!("{} ({:.2}s)", format_duration(seconds), seconds)
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            match c {
                // Keep alphanumeric characters, spaces, hyphens, underscores, and dots
                c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
                // Replace everything else with underscore
                _ => '_',
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// A file in a scratch directory that is deleted when dropped.
///
/// Deletion is attempted on every exit path; failures are logged and never propagated.
pub struct ScratchFile {
    path: PathBuf,
    guard: Option<TempPath>,
}

impl ScratchFile {
    /// Reserve a uniquely named empty file in `dir`
    pub fn new_in(dir: &Path, prefix: &str, suffix: &str) -> Result<Self> {
        fs_err::create_dir_all(dir).map_err(|e| {
            SummarizerError::FileProcessing(format!("Cannot create scratch directory: {}", e))
        })?;

        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(dir)
            .map_err(|e| {
                SummarizerError::FileProcessing(format!(
                    "Cannot create temporary file in {}: {}",
                    dir.display(),
                    e
                ))
            })?;

        let guard = file.into_temp_path();
        Ok(Self {
            path: guard.to_path_buf(),
            guard: Some(guard),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            match guard.close() {
                Ok(()) => tracing::debug!("Removed temporary file {}", self.path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "Could not remove temporary file {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}

/// Convert any audio/video container to 16-bit PCM, 16 kHz, mono WAV using ffmpeg
pub async fn convert_to_canonical_wav(input: &Path, output: &Path) -> Result<()> {
    if !input.is_file() {
        return Err(SummarizerError::FileNotFound(input.to_path_buf()));
    }

    tracing::debug!(
        "Converting {} to 16kHz mono WAV at {}",
        input.display(),
        output.display()
    );

    let result = Command::new("ffmpeg")
        .args([
            "-i", &input.to_string_lossy(),
            "-vn", // No video
            "-acodec", "pcm_s16le",
            "-ar", "16000",
            "-ac", "1",
            "-y", // Overwrite output file
            &output.to_string_lossy(),
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output_status = match result {
        Ok(out) => out,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SummarizerError::FileProcessing(
                "ffmpeg is not installed or not in the system PATH".to_string(),
            ));
        }
        Err(e) => {
            return Err(SummarizerError::FileProcessing(format!(
                "Failed to launch ffmpeg: {}",
                e
            )));
        }
    };

    if !output_status.status.success() {
        let error = String::from_utf8_lossy(&output_status.stderr);
        return Err(SummarizerError::FileProcessing(format!(
            "ffmpeg failed to convert {} to WAV ({}): {}",
            input.display(),
            output_status.status,
            error.trim()
        )));
    }

    Ok(())
}

/// Check if the current environment has required tools
pub async fn check_dependencies() -> Vec<String> {
    let mut missing = Vec::new();

    // Check for ffmpeg
    if !check_command_available("ffmpeg", "-version").await {
        missing.push("ffmpeg - required for audio/video conversion".to_string());
    }

    // Check for yt-dlp
    if !check_command_available("yt-dlp", "--version").await {
        missing.push("yt-dlp - required for remote video URLs".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, version_flag: &str) -> bool {
    Command::new(command)
        .arg(version_flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
