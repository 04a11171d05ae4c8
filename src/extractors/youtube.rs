use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use uuid::Uuid;

use super::AudioDownloader;
use crate::utils::validate_and_normalize_url;
use crate::{Result, SummarizerError};

/// Remote video audio downloader using yt-dlp
pub struct YtDlpDownloader {
    yt_dlp_path: String,
    download_dir: PathBuf,
}

impl YtDlpDownloader {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            download_dir,
        }
    }

    fn command_args(url: &str, output_template: &Path) -> Vec<String> {
        vec![
            "--format".to_string(),
            "bestaudio/best".to_string(),
            "--no-playlist".to_string(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            "wav".to_string(),
            "--quiet".to_string(),
            "--no-progress".to_string(),
            "--output".to_string(),
            output_template.to_string_lossy().into_owned(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl AudioDownloader for YtDlpDownloader {
    async fn download_audio(&self, url: &str) -> Result<PathBuf> {
        let url = validate_and_normalize_url(url)?;

        fs_err::create_dir_all(&self.download_dir).map_err(|e| {
            SummarizerError::Download(format!("Cannot create download directory: {}", e))
        })?;

        let prefix = format!("remote_{}", Uuid::new_v4());
        let template = self.download_dir.join(format!("{}.%(ext)s", prefix));

        tracing::info!("Downloading audio for {} with yt-dlp", url);
        let result = Command::new(&self.yt_dlp_path)
            .args(Self::command_args(&url, &template))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SummarizerError::Download(
                    "yt-dlp is not installed. Please install it: https://github.com/yt-dlp/yt-dlp"
                        .to_string(),
                ));
            }
            Err(e) => {
                return Err(SummarizerError::Download(format!(
                    "Failed to launch yt-dlp: {}",
                    e
                )));
            }
        };

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(SummarizerError::Download(format!(
                "yt-dlp failed for {}: {}",
                url,
                error.trim()
            )));
        }

        find_downloaded(&self.download_dir, &prefix)?.ok_or_else(|| {
            SummarizerError::Download(format!(
                "yt-dlp finished but no audio file starting with '{}' was found in {}",
                prefix,
                self.download_dir.display()
            ))
        })
    }
}

/// Locate the file yt-dlp wrote for `prefix`, preferring the extracted WAV
fn find_downloaded(dir: &Path, prefix: &str) -> Result<Option<PathBuf>> {
    let entries = fs_err::read_dir(dir).map_err(|e| {
        SummarizerError::Download(format!("Cannot list download directory: {}", e))
    })?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().starts_with(prefix))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();

    let wav = candidates
        .iter()
        .position(|path| path.extension().map(|ext| ext == "wav").unwrap_or(false));
    Ok(match wav {
        Some(index) => Some(candidates.swap_remove(index)),
        None => candidates.into_iter().next(),
    })
}
