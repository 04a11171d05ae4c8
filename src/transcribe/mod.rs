use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{BackendKind, TranscriptionConfig};
use crate::{Result, SummarizerError};

pub mod external;
pub mod native;

use external::WhisperCppBinary;
use native::{ModelCache, NativeWhisper};

/// Turns an audio file into plain text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

/// The configured engine, chosen once at startup
pub enum TranscriptionBackend {
    Native(NativeWhisper),
    External(WhisperCppBinary),
}

/// Routes transcription requests to the configured backend
pub struct TranscriptionDispatcher {
    backend: TranscriptionBackend,
}

impl TranscriptionDispatcher {
    pub fn new(backend: TranscriptionBackend) -> Self {
        Self { backend }
    }

    /// Build the backend selected in `config`; `scratch_dir` receives converted audio
    pub fn from_config(config: &TranscriptionConfig, scratch_dir: PathBuf) -> Self {
        let backend = match config.backend {
            BackendKind::NativeEngine => TranscriptionBackend::Native(NativeWhisper::new(
                &config.native,
                &config.language,
                scratch_dir,
                Arc::new(ModelCache::new()),
            )),
            BackendKind::ExternalBinary => TranscriptionBackend::External(
                WhisperCppBinary::new(&config.external, &config.language, scratch_dir),
            ),
        };

        Self::new(backend)
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            TranscriptionBackend::Native(_) => BackendKind::NativeEngine.as_str(),
            TranscriptionBackend::External(_) => BackendKind::ExternalBinary.as_str(),
        }
    }
}

#[async_trait]
impl Transcriber for TranscriptionDispatcher {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        if !audio_path.is_file() {
            return Err(SummarizerError::FileNotFound(audio_path.to_path_buf()));
        }

        tracing::info!(
            "Transcribing {} with the {} backend",
            audio_path.display(),
            self.backend_name()
        );
        let started = Instant::now();

        let text = match &self.backend {
            TranscriptionBackend::Native(engine) => engine.transcribe(audio_path).await?,
            TranscriptionBackend::External(binary) => binary.transcribe(audio_path).await?,
        };

        tracing::info!(
            "Transcription finished in {:.2}s ({} characters)",
            started.elapsed().as_secs_f64(),
            text.len()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExternalBinaryConfig;

    fn external_config(executable: Option<PathBuf>, model: Option<PathBuf>) -> TranscriptionConfig {
        TranscriptionConfig {
            backend: BackendKind::ExternalBinary,
            external: ExternalBinaryConfig {
                executable_path: executable,
                model_path: model,
                threads: 2,
            },
            ..TranscriptionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_audio_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher =
            TranscriptionDispatcher::from_config(&external_config(None, None), dir.path().into());

        let err = dispatcher
            .transcribe(&dir.path().join("missing.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_binary_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("clip.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let dispatcher =
            TranscriptionDispatcher::from_config(&external_config(None, None), dir.path().into());
        assert_eq!(dispatcher.backend_name(), "external-binary");

        let err = dispatcher.transcribe(&audio).await.unwrap_err();
        assert!(matches!(err, SummarizerError::Configuration(_)));
    }

    #[test]
    fn test_native_backend_selected_from_config() {
        let config = TranscriptionConfig {
            backend: BackendKind::NativeEngine,
            ..TranscriptionConfig::default()
        };
        let dispatcher = TranscriptionDispatcher::from_config(&config, std::env::temp_dir());
        assert_eq!(dispatcher.backend_name(), "native-engine");
    }
}
