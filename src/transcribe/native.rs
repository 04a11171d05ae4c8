//! In-process whisper engine.
//!
//! Models are ggml files named `ggml-<size>[-<quant>].bin` under the models directory.
//! The engine itself is only compiled with the `native-whisper` feature.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::config::NativeEngineConfig;
use crate::utils::{convert_to_canonical_wav, ScratchFile};
use crate::{Result, SummarizerError};

/// Identity of a loaded model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub size: String,
    pub device: String,
    pub precision: String,
}

impl ModelKey {
    pub fn from_config(config: &NativeEngineConfig) -> Self {
        Self {
            size: config.model_size.trim().to_string(),
            device: config.device.trim().to_lowercase(),
            precision: config.compute_type.trim().to_lowercase(),
        }
    }

    /// Model file for this key inside `models_dir`
    pub fn model_file(&self, models_dir: &Path) -> PathBuf {
        let suffix = precision_suffix(&self.precision)
            .map(|quant| format!("-{}", quant))
            .unwrap_or_default();
        models_dir.join(format!("ggml-{}{}.bin", self.size, suffix))
    }

    pub fn use_gpu(&self) -> bool {
        self.device != "cpu"
    }
}

/// Quantization tag for a compute type; full precision types have none
fn precision_suffix(precision: &str) -> Option<String> {
    match precision {
        "" | "default" | "auto" | "float16" | "float32" => None,
        "int8" | "int8_float16" | "int8_float32" => Some("q8_0".to_string()),
        quant if quant.starts_with('q') => Some(quant.to_string()),
        _ => None,
    }
}

/// Holds the most recently loaded model. A different key replaces it.
pub struct ModelCache<M> {
    loaded: RwLock<Option<(ModelKey, Arc<M>)>>,
    load_lock: tokio::sync::Mutex<()>,
}

impl<M: Send + Sync + 'static> ModelCache<M> {
    pub fn new() -> Self {
        Self {
            loaded: RwLock::new(None),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Return the model for `key`, loading it on a blocking thread when absent.
    /// Concurrent callers for the same key share one load.
    pub async fn get_or_load<F>(&self, key: &ModelKey, load: F) -> Result<Arc<M>>
    where
        F: FnOnce(&ModelKey) -> Result<M> + Send + 'static,
    {
        if let Some(model) = self.cached(key) {
            return Ok(model);
        }

        let _guard = self.load_lock.lock().await;
        if let Some(model) = self.cached(key) {
            return Ok(model);
        }

        tracing::info!(
            "Loading whisper model '{}' (device {}, precision {})",
            key.size,
            key.device,
            key.precision
        );
        let owned_key = key.clone();
        let model = tokio::task::spawn_blocking(move || load(&owned_key))
            .await
            .map_err(|e| {
                SummarizerError::Transcription(format!("Model loading task failed: {}", e))
            })??;

        let model = Arc::new(model);
        *self
            .loaded
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) =
            Some((key.clone(), Arc::clone(&model)));
        Ok(model)
    }

    fn cached(&self, key: &ModelKey) -> Option<Arc<M>> {
        self.loaded
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .filter(|(loaded, _)| loaded == key)
            .map(|(_, model)| Arc::clone(model))
    }
}

impl<M: Send + Sync + 'static> Default for ModelCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "native-whisper")]
pub type EngineModel = whisper_rs::WhisperContext;

#[cfg(not(feature = "native-whisper"))]
pub type EngineModel = ();

/// Whisper model running inside this process
pub struct NativeWhisper {
    key: ModelKey,
    models_dir: PathBuf,
    language: Option<String>,
    scratch_dir: PathBuf,
    models: Arc<ModelCache<EngineModel>>,
}

impl NativeWhisper {
    pub fn new(
        config: &NativeEngineConfig,
        language: &str,
        scratch_dir: PathBuf,
        models: Arc<ModelCache<EngineModel>>,
    ) -> Self {
        let language = match language.trim() {
            "" => None,
            lang => Some(lang.to_string()),
        };

        Self {
            key: ModelKey::from_config(config),
            models_dir: config.models_dir.clone(),
            language,
            scratch_dir,
            models,
        }
    }

    pub async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let model_file = self.key.model_file(&self.models_dir);
        let model = self
            .models
            .get_or_load(&self.key, move |key| engine::load(&model_file, key.use_gpu()))
            .await?;

        let scratch = ScratchFile::new_in(&self.scratch_dir, "native_", ".wav")?;
        convert_to_canonical_wav(audio_path, scratch.path())
            .await
            .map_err(|e| match e {
                SummarizerError::FileProcessing(message) => SummarizerError::Transcription(
                    format!("Audio conversion failed: {}", message),
                ),
                other => other,
            })?;

        let wav = scratch.path().to_path_buf();
        let language = self.language.clone();
        tokio::task::spawn_blocking(move || engine::run(&model, &wav, language.as_deref()))
            .await
            .map_err(|e| {
                SummarizerError::Transcription(format!("Transcription task failed: {}", e))
            })?
    }
}

#[cfg(feature = "native-whisper")]
mod engine {
    use std::path::Path;
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    use crate::{Result, SummarizerError};

    pub fn load(model_file: &Path, use_gpu: bool) -> Result<WhisperContext> {
        if !model_file.is_file() {
            return Err(SummarizerError::Transcription(format!(
                "Whisper model not found at {}",
                model_file.display()
            )));
        }

        let mut params = WhisperContextParameters::default();
        params.use_gpu(use_gpu);

        WhisperContext::new_with_params(&model_file.to_string_lossy(), params).map_err(|e| {
            SummarizerError::Transcription(format!("Failed to load whisper model: {:?}", e))
        })
    }

    pub fn run(context: &WhisperContext, wav: &Path, language: Option<&str>) -> Result<String> {
        let reader = hound::WavReader::open(wav).map_err(|e| {
            SummarizerError::Transcription(format!("Cannot read converted audio: {}", e))
        })?;
        let samples = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<i16>, _>>()
            .map_err(|e| {
                SummarizerError::Transcription(format!("Cannot decode converted audio: {}", e))
            })?;

        if samples.is_empty() {
            return Ok(String::new());
        }

        let mut float_samples = vec![0.0f32; samples.len()];
        whisper_rs::convert_integer_to_float_audio(&samples, &mut float_samples).map_err(|e| {
            SummarizerError::Transcription(format!("Audio conversion i16 to f32 failed: {:?}", e))
        })?;

        let mut state = context.create_state().map_err(|e| {
            SummarizerError::Transcription(format!("Failed to create whisper state: {:?}", e))
        })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_language(language);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_translate(false);

        state.full(params, &float_samples[..]).map_err(|e| {
            SummarizerError::Transcription(format!("Whisper transcription failed: {:?}", e))
        })?;

        let segments: Vec<String> = state
            .as_iter()
            .filter_map(|segment| {
                segment
                    .to_str_lossy()
                    .ok()
                    .map(|text| text.trim().to_string())
            })
            .filter(|text| !text.is_empty())
            .collect();

        Ok(segments.join(" "))
    }
}

#[cfg(not(feature = "native-whisper"))]
mod engine {
    use std::path::Path;

    use crate::{Result, SummarizerError};

    const UNAVAILABLE: &str =
        "The native whisper engine is not available in this build (enable the `native-whisper` feature)";

    pub fn load(_model_file: &Path, _use_gpu: bool) -> Result<()> {
        Err(SummarizerError::Configuration(UNAVAILABLE.to_string()))
    }

    pub fn run(_context: &(), _wav: &Path, _language: Option<&str>) -> Result<String> {
        Err(SummarizerError::Configuration(UNAVAILABLE.to_string()))
    }
}
