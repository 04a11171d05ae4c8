//! Summarization pipeline: resolve, count, then summarize directly or map/reduce.

pub mod backend;
pub mod chunker;
pub mod pacing;
pub mod tokens;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{ChunkingConfig, Config};
use crate::extractors::youtube::YtDlpDownloader;
use crate::extractors::{InputResolver, InputSource};
use crate::transcribe::TranscriptionDispatcher;
use crate::{Result, SummarizerError};
use backend::{OllamaBackend, PromptSet, PromptTemplate, SummaryBackend};
use chunker::{Chunker, TextChunk};
use pacing::Pacer;
use tokens::{HubTokenizerSource, TokenCounter};

/// How much detail the final summary should have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Short,
    Detailed,
}

impl DetailLevel {
    pub fn from_flag(detailed: bool) -> Self {
        if detailed {
            DetailLevel::Detailed
        } else {
            DetailLevel::Short
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Short => "short",
            DetailLevel::Detailed => "detailed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryRequest {
    pub source: InputSource,
    pub detail: DetailLevel,
}

/// Which path produced the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Strategy {
    /// Nothing to summarize, the backend was not called
    NoContent,
    /// A single backend call on the whole text
    Direct,
    MapReduce { chunks: usize, failed_chunks: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutcome {
    pub summary: String,
    pub strategy: Strategy,
    pub token_count: usize,
    pub source_description: String,
}

/// Result of the map step for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateSummary {
    pub index: usize,
    pub text: String,
    pub placeholder: bool,
}

impl IntermediateSummary {
    /// Stand-in for a chunk whose map call failed; `index` is 0-based
    pub fn placeholder(index: usize, error: &SummarizerError) -> Self {
        let text = match error {
            SummarizerError::Backend(_) | SummarizerError::Configuration(_) => format!(
                "[Chunk {}: summary unavailable ({})]",
                index + 1,
                error.kind()
            ),
            other => format!(
                "[Chunk {}: unexpected failure ({})]",
                index + 1,
                other.kind()
            ),
        };

        Self {
            index,
            text,
            placeholder: true,
        }
    }
}

/// Chunking and map phase tuning
#[derive(Debug, Clone)]
pub struct MapReduceSettings {
    pub target_tokens: usize,
    pub overlap_tokens: usize,
    pub concurrency: usize,
    pub pacing: Duration,
}

impl MapReduceSettings {
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            target_tokens: config.target_tokens,
            overlap_tokens: config.overlap_tokens,
            concurrency: config.map_concurrency,
            pacing: Duration::from_millis(config.map_pacing_ms),
        }
    }
}

pub fn no_content_message(source_description: &str) -> String {
    format!(
        "No text content was found or transcribed from '{}'. Nothing to summarize.",
        source_description
    )
}

/// Join intermediate summaries in document order
pub fn combine_intermediate(
    intermediates: &[IntermediateSummary],
    source_description: &str,
) -> Result<String> {
    let combined = intermediates
        .iter()
        .map(|summary| summary.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string();

    if combined.is_empty() {
        return Err(SummarizerError::Pipeline {
            stage: "combine",
            source_description: source_description.to_string(),
            message: "no intermediate summaries were produced".to_string(),
        });
    }

    Ok(combined)
}

/// What the token count decided
enum Plan {
    Direct(String),
    MapReduce(Vec<TextChunk>),
}

/// The summarization orchestrator
pub struct Summarizer {
    resolver: InputResolver,
    tokens: Arc<TokenCounter>,
    backend: Arc<dyn SummaryBackend>,
    prompts: PromptSet,
    settings: MapReduceSettings,
    pacer: Pacer,
}

impl Summarizer {
    pub fn new(
        resolver: InputResolver,
        tokens: Arc<TokenCounter>,
        backend: Arc<dyn SummaryBackend>,
        prompts: PromptSet,
        settings: MapReduceSettings,
    ) -> Self {
        let pacer = Pacer::new(settings.pacing);
        Self {
            resolver,
            tokens,
            backend,
            prompts,
            settings,
            pacer,
        }
    }

    /// Wire up the production services from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let transcriber = TranscriptionDispatcher::from_config(
            &config.transcription,
            config.app.download_dir.clone(),
        );
        let resolver = InputResolver::new(
            Arc::new(transcriber),
            Arc::new(YtDlpDownloader::new(config.app.download_dir.clone())),
            config.app.download_dir.clone(),
        );
        let tokens = Arc::new(TokenCounter::new(
            config.chunking.tokenizer.clone(),
            Arc::new(HubTokenizerSource),
        ));
        let backend = Arc::new(OllamaBackend::new(&config.ollama)?);

        Ok(Self::new(
            resolver,
            tokens,
            backend,
            PromptSet::from_config(&config.prompts),
            MapReduceSettings::from_config(&config.chunking),
        ))
    }

    pub async fn summarize(&self, request: SummaryRequest) -> Result<SummaryOutcome> {
        let source_description = request.source.description();
        tracing::info!("Processing input from {}", source_description);

        let raw_text = self.resolver.resolve(&request.source).await?;

        if raw_text.trim().is_empty() {
            tracing::warn!("No text content found in {}", source_description);
            return Ok(SummaryOutcome {
                summary: no_content_message(&source_description),
                strategy: Strategy::NoContent,
                token_count: 0,
                source_description,
            });
        }

        let template = self.prompts.for_detail(request.detail);
        let (token_count, plan) = self.plan(raw_text, &source_description).await?;

        let chunks = match plan {
            Plan::Direct(text) => {
                tracing::info!(
                    "Text has {} tokens (budget {}), summarizing directly",
                    token_count,
                    self.settings.target_tokens
                );
                let summary = self.backend.generate(&text, template).await?;
                return Ok(SummaryOutcome {
                    summary,
                    strategy: Strategy::Direct,
                    token_count,
                    source_description,
                });
            }
            Plan::MapReduce(chunks) => chunks,
        };

        tracing::info!(
            "Text has {} tokens (budget {}), using map/reduce over {} chunks",
            token_count,
            self.settings.target_tokens,
            chunks.len()
        );

        let intermediates = self.map_chunks(&chunks).await;
        let failed_chunks = intermediates.iter().filter(|s| s.placeholder).count();

        let combined = combine_intermediate(&intermediates, &source_description)?;
        match self.tokens.count(&combined) {
            // The reduce input is not re-chunked even when it exceeds the budget
            Ok(combined_tokens) => tracing::debug!(
                "Combined intermediate summaries: {} tokens",
                combined_tokens
            ),
            Err(e) => tracing::debug!("Could not count combined summaries: {}", e),
        }

        tracing::info!("Generating final summary from {} chunk summaries", chunks.len());
        let summary = self.backend.generate(&combined, template).await?;

        Ok(SummaryOutcome {
            summary,
            strategy: Strategy::MapReduce {
                chunks: chunks.len(),
                failed_chunks,
            },
            token_count,
            source_description,
        })
    }

    /// Count tokens and, when over budget, split into chunks.
    ///
    /// Tokenizer loading, encoding and splitting all run on a blocking thread.
    async fn plan(&self, text: String, source_description: &str) -> Result<(usize, Plan)> {
        let tokens = Arc::clone(&self.tokens);
        let target_tokens = self.settings.target_tokens;
        let overlap_tokens = self.settings.overlap_tokens;

        tokio::task::spawn_blocking(move || -> Result<(usize, Plan)> {
            let token_count = tokens.count(&text)?;
            if token_count <= target_tokens {
                return Ok((token_count, Plan::Direct(text)));
            }

            let chunks =
                Chunker::new(tokens.oracle()?).split(&text, target_tokens, overlap_tokens)?;
            Ok((token_count, Plan::MapReduce(chunks)))
        })
        .await
        .map_err(|e| SummarizerError::Pipeline {
            stage: "count-tokens",
            source_description: source_description.to_string(),
            message: format!("tokenizer task failed: {}", e),
        })?
    }

    /// Summarize every chunk; results are returned in chunk order
    async fn map_chunks(&self, chunks: &[TextChunk]) -> Vec<IntermediateSummary> {
        let total = chunks.len();
        let started = Instant::now();
        tracing::debug!(
            "Map phase: concurrency {}, pacing {:?}",
            self.settings.concurrency.max(1),
            self.pacer.interval()
        );

        let mut intermediates: Vec<IntermediateSummary> = stream::iter(chunks)
            .map(|chunk| self.map_chunk(chunk, total, &self.prompts.map))
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;
        intermediates.sort_by_key(|summary| summary.index);

        tracing::info!(
            "Map phase finished: {} chunks in {:.2}s",
            total,
            started.elapsed().as_secs_f64()
        );
        intermediates
    }

    async fn map_chunk(
        &self,
        chunk: &TextChunk,
        total: usize,
        template: &PromptTemplate,
    ) -> IntermediateSummary {
        let permit = self.pacer.acquire().await;
        tracing::info!("Summarizing chunk {}/{}", chunk.index + 1, total);
        let generated = self.backend.generate(&chunk.text, template).await;
        drop(permit);

        match generated {
            Ok(text) => IntermediateSummary {
                index: chunk.index,
                text,
                placeholder: false,
            },
            Err(e) => {
                tracing::warn!("Chunk {}/{} failed: {}", chunk.index + 1, total, e);
                IntermediateSummary::placeholder(chunk.index, &e)
            }
        }
    }
}
