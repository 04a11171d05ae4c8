use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub mod local;
pub mod youtube;

use crate::transcribe::Transcriber;
use crate::{Result, SummarizerError};
use local::LocalFileExtractor;

/// Where the text to summarize comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    DirectText(String),
    LocalFile(PathBuf),
    RemoteUrl(String),
}

impl InputSource {
    /// Build a source from optional CLI inputs; exactly one must be given
    pub fn from_parts(
        text: Option<String>,
        file: Option<PathBuf>,
        url: Option<String>,
    ) -> Result<Self> {
        match (text, file, url) {
            (Some(text), None, None) => Ok(InputSource::DirectText(text)),
            (None, Some(file), None) => Ok(InputSource::LocalFile(file)),
            (None, None, Some(url)) => Ok(InputSource::RemoteUrl(url)),
            (None, None, None) => Err(SummarizerError::Validation(
                "Provide exactly one input: --text, --file or --url".to_string(),
            )),
            _ => Err(SummarizerError::Validation(
                "Provide exactly one input, not several: --text, --file or --url".to_string(),
            )),
        }
    }

    /// Human-readable description used in logs and messages
    pub fn description(&self) -> String {
        match self {
            InputSource::DirectText(_) => "direct text".to_string(),
            InputSource::LocalFile(path) => {
                let name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                format!("local file: {}", name)
            }
            InputSource::RemoteUrl(url) => format!("URL: {}", url),
        }
    }
}

/// Fetches the audio track of a remote video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioDownloader: Send + Sync {
    /// Download and return the path of the audio file
    async fn download_audio(&self, url: &str) -> Result<PathBuf>;
}

/// Normalizes any input source to raw text
pub struct InputResolver {
    transcriber: Arc<dyn Transcriber>,
    downloader: Arc<dyn AudioDownloader>,
    local: LocalFileExtractor,
}

impl InputResolver {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        downloader: Arc<dyn AudioDownloader>,
        scratch_dir: PathBuf,
    ) -> Self {
        Self {
            transcriber,
            downloader,
            local: LocalFileExtractor::new(scratch_dir),
        }
    }

    pub async fn resolve(&self, source: &InputSource) -> Result<String> {
        match source {
            InputSource::DirectText(text) => Ok(text.clone()),
            InputSource::LocalFile(path) => {
                self.local
                    .extract_text(path, self.transcriber.as_ref())
                    .await
            }
            InputSource::RemoteUrl(url) => self.resolve_remote(url).await,
        }
    }

    async fn resolve_remote(&self, url: &str) -> Result<String> {
        let audio = self.downloader.download_audio(url).await?;
        // The downloaded file is kept for reuse and inspection
        tracing::info!("Downloaded audio kept at {}", audio.display());
        self.transcriber.transcribe(&audio).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::MockTranscriber;
    use std::path::Path;

    fn resolver(transcriber: MockTranscriber, downloader: MockAudioDownloader) -> InputResolver {
        InputResolver::new(
            Arc::new(transcriber),
            Arc::new(downloader),
            std::env::temp_dir(),
        )
    }

    #[test]
    fn test_exactly_one_input_required() {
        assert_eq!(
            InputSource::from_parts(Some("hi".into()), None, None).unwrap(),
            InputSource::DirectText("hi".into())
        );
        assert!(matches!(
            InputSource::from_parts(None, None, None),
            Err(SummarizerError::Validation(_))
        ));
        assert!(matches!(
            InputSource::from_parts(Some("hi".into()), None, Some("https://x.y".into())),
            Err(SummarizerError::Validation(_))
        ));
        assert!(matches!(
            InputSource::from_parts(None, Some("a.txt".into()), Some("https://x.y".into())),
            Err(SummarizerError::Validation(_))
        ));
    }

    #[test]
    fn test_source_descriptions() {
        assert_eq!(InputSource::DirectText("x".into()).description(), "direct text");
        assert_eq!(
            InputSource::LocalFile("/data/talks/keynote.mp4".into()).description(),
            "local file: keynote.mp4"
        );
        assert_eq!(
            InputSource::RemoteUrl("https://example.com/v?id=1".into()).description(),
            "URL: https://example.com/v?id=1"
        );
    }

    #[tokio::test]
    async fn test_direct_text_passes_through_unchanged() {
        let resolver = resolver(MockTranscriber::new(), MockAudioDownloader::new());
        let text = "  keep\n\nwhitespace  ";
        assert_eq!(
            resolver
                .resolve(&InputSource::DirectText(text.to_string()))
                .await
                .unwrap(),
            text
        );
    }

    #[tokio::test]
    async fn test_remote_url_downloads_then_transcribes() {
        let mut downloader = MockAudioDownloader::new();
        downloader
            .expect_download_audio()
            .withf(|url| url == "https://example.com/watch?v=1")
            .times(1)
            .returning(|_| Ok(PathBuf::from("/downloads/remote_1.wav")));

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .withf(|path| path == Path::new("/downloads/remote_1.wav"))
            .times(1)
            .returning(|_| Ok("spoken words".to_string()));

        let text = resolver(transcriber, downloader)
            .resolve(&InputSource::RemoteUrl("https://example.com/watch?v=1".into()))
            .await
            .unwrap();
        assert_eq!(text, "spoken words");
    }

    #[tokio::test]
    async fn test_download_failure_skips_transcription() {
        let mut downloader = MockAudioDownloader::new();
        downloader
            .expect_download_audio()
            .returning(|_| Err(SummarizerError::Download("video unavailable".into())));

        let err = resolver(MockTranscriber::new(), downloader)
            .resolve(&InputSource::RemoteUrl("https://example.com/gone".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::Download(_)));
    }
}
