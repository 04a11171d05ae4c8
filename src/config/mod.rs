use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{Result, SummarizerError};

const APP_DIR: &str = "local-summarizer";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generation backend (Ollama) settings
    pub ollama: OllamaConfig,

    /// Audio transcription settings
    pub transcription: TranscriptionConfig,

    /// Long-text chunking and map phase settings
    pub chunking: ChunkingConfig,

    /// Prompt templates, `{text}` is replaced with the input
    pub prompts: PromptConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server
    pub base_url: String,

    /// Model used for every generation call
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature
    pub temperature: f32,
}

/// Which transcription backend handles audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// In-process whisper model
    #[serde(alias = "whisper-rs", alias = "native")]
    NativeEngine,
    /// whisper.cpp style command line binary
    #[serde(alias = "whisper-cpp", alias = "binary")]
    ExternalBinary,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::NativeEngine => "native-engine",
            BackendKind::ExternalBinary => "external-binary",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = SummarizerError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "native-engine" | "native" | "whisper-rs" => Ok(BackendKind::NativeEngine),
            "external-binary" | "binary" | "whisper-cpp" => Ok(BackendKind::ExternalBinary),
            other => Err(SummarizerError::Configuration(format!(
                "Invalid transcription backend '{}'. Choose 'native-engine' or 'external-binary'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Selected backend, fixed for the process lifetime
    pub backend: BackendKind,

    /// Spoken language passed to the engine ("auto" lets it detect)
    pub language: String,

    pub native: NativeEngineConfig,

    pub external: ExternalBinaryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeEngineConfig {
    /// Model size (tiny, base, small, medium, large-v3, ...)
    pub model_size: String,

    /// auto, cpu or gpu
    pub device: String,

    /// Compute precision, selects the quantized model variant
    pub compute_type: String,

    /// Directory holding ggml model files
    pub models_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalBinaryConfig {
    /// Path to the whisper.cpp executable
    pub executable_path: Option<PathBuf>,

    /// Path to the ggml model used by the executable
    pub model_path: Option<PathBuf>,

    /// Thread count passed with `-t`
    pub threads: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Texts up to this many tokens are summarized in one call; also the chunk size
    pub target_tokens: usize,

    /// Tokens shared by consecutive chunks
    pub overlap_tokens: usize,

    /// Hub identifier or local path of the tokenizer matching the model
    pub tokenizer: String,

    /// Maximum number of map calls in flight
    pub map_concurrency: usize,

    /// Minimum spacing between map calls in milliseconds (0 disables pacing)
    pub map_pacing_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub short: String,
    pub detailed: String,
    pub map: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for downloaded audio and scratch files
    pub download_dir: PathBuf,
}

/// Context window of the default model
const DEFAULT_CONTEXT_TOKENS: usize = 8192;

pub const DEFAULT_SHORT_PROMPT: &str = "SYSTEM: You are an expert at concise, relevant summaries. \
Summarize the following text in 2 or 3 sentences at most. Capture the main idea sharply.
USER: Here is the text:
{text}
ASSISTANT:";

pub const DEFAULT_DETAILED_PROMPT: &str = "SYSTEM: You are an expert at synthesizing information. \
Extract the 5 to 7 most important key points of the following text. Present them as a bulleted \
list (each line starting with '- '). Every point must be clear and informative.
USER: Here is the text:
{text}
ASSISTANT:";

pub const DEFAULT_MAP_PROMPT: &str = "Summarize CONCISELY the following piece of text, keeping \
only the essential facts and key points. No introduction or conclusion, just the key facts of \
the piece.\n\nTEXT OF THE PIECE:\n\n{text}\n\nCONCISE KEY POINTS OF THE PIECE:";

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "mistral:7b-instruct".to_string(),
            timeout_secs: 300,
            temperature: 0.5,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::ExternalBinary,
            language: "auto".to_string(),
            native: NativeEngineConfig::default(),
            external: ExternalBinaryConfig::default(),
        }
    }
}

impl Default for ExternalBinaryConfig {
    fn default() -> Self {
        Self {
            executable_path: None,
            model_path: None,
            threads: 4,
        }
    }
}

impl Default for NativeEngineConfig {
    fn default() -> Self {
        Self {
            model_size: "medium".to_string(),
            device: "auto".to_string(),
            compute_type: "default".to_string(),
            models_dir: app_cache_dir().join("models"),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: DEFAULT_CONTEXT_TOKENS * 3 / 4,
            overlap_tokens: 200,
            tokenizer: "mistralai/Mistral-7B-Instruct-v0.2".to_string(),
            map_concurrency: 1,
            map_pacing_ms: 500,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            short: DEFAULT_SHORT_PROMPT.to_string(),
            detailed: DEFAULT_DETAILED_PROMPT.to_string(),
            map: DEFAULT_MAP_PROMPT.to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_dir: app_cache_dir().join("downloads"),
        }
    }
}

fn app_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl Config {
    /// Load configuration from file (or defaults), then apply environment overrides
    pub async fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                let content = fs_err::read_to_string(&path).map_err(|e| {
                    SummarizerError::Configuration(format!("Failed to read config file: {}", e))
                })?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document, missing sections fall back to defaults
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            SummarizerError::Configuration(format!("Failed to parse config file: {}", e))
        })
    }

    /// Get configuration file path, if one exists
    fn config_path() -> Option<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join("config.yaml"))
            .filter(|path| path.exists())
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OLLAMA_BASE_URL") {
            self.ollama.base_url = v;
        }
        if let Some(v) = get("OLLAMA_MODEL") {
            self.ollama.model = v;
        }
        if let Some(v) = get("OLLAMA_TIMEOUT_SECS") {
            self.ollama.timeout_secs = parse_var("OLLAMA_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("TRANSCRIPTION_BACKEND") {
            self.transcription.backend = v.parse()?;
        }
        if let Some(v) = get("WHISPER_LANGUAGE") {
            self.transcription.language = v;
        }
        if let Some(v) = get("WHISPER_MODEL_SIZE") {
            self.transcription.native.model_size = v;
        }
        if let Some(v) = get("WHISPER_DEVICE") {
            self.transcription.native.device = v;
        }
        if let Some(v) = get("WHISPER_COMPUTE_TYPE") {
            self.transcription.native.compute_type = v;
        }
        if let Some(v) = get("WHISPER_MODELS_DIR") {
            self.transcription.native.models_dir = PathBuf::from(v);
        }
        if let Some(v) = get("WHISPER_CPP_EXECUTABLE_PATH") {
            self.transcription.external.executable_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("WHISPER_CPP_MODEL_PATH") {
            self.transcription.external.model_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("WHISPER_CPP_THREADS") {
            self.transcription.external.threads = parse_var("WHISPER_CPP_THREADS", &v)?;
        }
        if let Some(v) = get("CHUNK_TARGET_TOKENS") {
            self.chunking.target_tokens = parse_var("CHUNK_TARGET_TOKENS", &v)?;
        }
        if let Some(v) = get("CHUNK_OVERLAP_TOKENS") {
            self.chunking.overlap_tokens = parse_var("CHUNK_OVERLAP_TOKENS", &v)?;
        }
        if let Some(v) = get("TOKENIZER_IDENTIFIER") {
            self.chunking.tokenizer = v;
        }
        if let Some(v) = get("MAP_CONCURRENCY") {
            self.chunking.map_concurrency = parse_var("MAP_CONCURRENCY", &v)?;
        }
        if let Some(v) = get("MAP_PACING_MS") {
            self.chunking.map_pacing_ms = parse_var("MAP_PACING_MS", &v)?;
        }
        if let Some(v) = get("PROMPT_TEMPLATE_MAP") {
            self.prompts.map = v;
        }
        if let Some(v) = get("DOWNLOAD_DIR") {
            self.app.download_dir = PathBuf::from(v);
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ollama.base_url.trim().is_empty() {
            return Err(SummarizerError::Configuration(
                "Ollama base URL must be configured".to_string(),
            ));
        }
        if self.ollama.model.trim().is_empty() {
            return Err(SummarizerError::Configuration(
                "Ollama model must be configured".to_string(),
            ));
        }
        if self.chunking.tokenizer.trim().is_empty() {
            return Err(SummarizerError::Configuration(
                "Tokenizer identifier (TOKENIZER_IDENTIFIER) is not configured".to_string(),
            ));
        }
        if self.chunking.map_concurrency == 0 {
            return Err(SummarizerError::Configuration(
                "Map concurrency must be at least 1".to_string(),
            ));
        }
        if self.transcription.external.threads == 0 {
            return Err(SummarizerError::Configuration(
                "whisper.cpp thread count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        let show_path = |path: &Option<PathBuf>| {
            path.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not set)".to_string())
        };

        println!("Current Configuration:");
        println!("  Ollama URL: {}", self.ollama.base_url);
        println!("  Ollama Model: {}", self.ollama.model);
        println!("  Request Timeout: {}s", self.ollama.timeout_secs);
        println!("  Transcription Backend: {}", self.transcription.backend);
        println!("  Language: {}", self.transcription.language);
        match self.transcription.backend {
            BackendKind::NativeEngine => {
                let native = &self.transcription.native;
                println!("  Model Size: {}", native.model_size);
                println!("  Device: {}", native.device);
                println!("  Compute Type: {}", native.compute_type);
                println!("  Models Dir: {}", native.models_dir.display());
            }
            BackendKind::ExternalBinary => {
                let external = &self.transcription.external;
                println!("  Executable: {}", show_path(&external.executable_path));
                println!("  Model: {}", show_path(&external.model_path));
                println!("  Threads: {}", external.threads);
            }
        }
        println!("  Chunk Target Tokens: {}", self.chunking.target_tokens);
        println!("  Chunk Overlap Tokens: {}", self.chunking.overlap_tokens);
        println!("  Tokenizer: {}", self.chunking.tokenizer);
        println!("  Map Concurrency: {}", self.chunking.map_concurrency);
        println!("  Map Pacing: {}ms", self.chunking.map_pacing_ms);
        println!("  Download Dir: {}", self.app.download_dir.display());
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        SummarizerError::Configuration(format!("Invalid value for {}: '{}'", name, value))
    })
}
