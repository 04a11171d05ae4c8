//! Token counting backed by a lazily loaded, shared tokenizer.

use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};
use tokenizers::Tokenizer;

use crate::{Result, SummarizerError};

/// Something that can split text into tokens.
pub trait TokenOracle: Send + Sync {
    /// Byte span of every token in `text`, in order
    fn encode(&self, text: &str) -> Result<Vec<Range<usize>>>;

    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.len())
    }
}

/// Loads a tokenizer from its identifier.
pub trait TokenizerSource: Send + Sync {
    fn load(&self, identifier: &str) -> Result<Arc<dyn TokenOracle>>;
}

/// Loads `tokenizer.json` from a local path or the Hugging Face hub
pub struct HubTokenizerSource;

impl TokenizerSource for HubTokenizerSource {
    fn load(&self, identifier: &str) -> Result<Arc<dyn TokenOracle>> {
        let local = Path::new(identifier);
        let tokenizer_path = if local.is_file() {
            local.to_path_buf()
        } else {
            let api = Api::new().map_err(|e| {
                SummarizerError::Configuration(format!("Cannot initialize hub client: {}", e))
            })?;
            let repo = api.repo(Repo::new(identifier.to_string(), RepoType::Model));
            repo.get("tokenizer.json").map_err(|e| {
                SummarizerError::Configuration(format!(
                    "Cannot load the tokenizer for '{}'. Check the identifier matches the model \
                     and is available on the hub: {}",
                    identifier, e
                ))
            })?
        };

        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            SummarizerError::Configuration(format!(
                "Invalid tokenizer file {}: {}",
                tokenizer_path.display(),
                e
            ))
        })?;

        Ok(Arc::new(HfTokenizer { inner: tokenizer }))
    }
}

struct HfTokenizer {
    inner: Tokenizer,
}

impl TokenOracle for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<Range<usize>>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| SummarizerError::Tokenization(e.to_string()))?;

        Ok(encoding
            .get_offsets()
            .iter()
            .map(|&(start, end)| start..end)
            .collect())
    }
}

struct LoadedTokenizer {
    identifier: String,
    oracle: Arc<dyn TokenOracle>,
}

/// Shared token counting service.
///
/// The tokenizer is loaded on first use and reloaded only when the identifier changes.
/// Concurrent first use performs a single load.
pub struct TokenCounter {
    identifier: RwLock<String>,
    source: Arc<dyn TokenizerSource>,
    loaded: RwLock<Option<LoadedTokenizer>>,
    load_lock: Mutex<()>,
}

impl TokenCounter {
    pub fn new(identifier: impl Into<String>, source: Arc<dyn TokenizerSource>) -> Self {
        Self {
            identifier: RwLock::new(identifier.into()),
            source,
            loaded: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    pub fn identifier(&self) -> String {
        self.identifier
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Switch tokenizer; the next use loads the new one
    pub fn set_identifier(&self, identifier: impl Into<String>) {
        *self
            .identifier
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = identifier.into();
    }

    /// Count tokens; empty text is 0 without loading anything
    pub fn count(&self, text: &str) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }
        self.oracle()?.count(text)
    }

    /// The tokenizer for the current identifier, loading it if needed
    pub fn oracle(&self) -> Result<Arc<dyn TokenOracle>> {
        let wanted = self.identifier();
        if wanted.trim().is_empty() {
            return Err(SummarizerError::Configuration(
                "Tokenizer identifier (TOKENIZER_IDENTIFIER) is not configured".to_string(),
            ));
        }

        if let Some(oracle) = self.cached(&wanted) {
            return Ok(oracle);
        }

        let _guard = self
            .load_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(oracle) = self.cached(&wanted) {
            return Ok(oracle);
        }

        tracing::info!("Loading tokenizer '{}'", wanted);
        let oracle = self.source.load(&wanted)?;
        *self
            .loaded
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(LoadedTokenizer {
            identifier: wanted,
            oracle: Arc::clone(&oracle),
        });

        Ok(oracle)
    }

    fn cached(&self, identifier: &str) -> Option<Arc<dyn TokenOracle>> {
        self.loaded
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .filter(|loaded| loaded.identifier == identifier)
            .map(|loaded| Arc::clone(&loaded.oracle))
    }
}
