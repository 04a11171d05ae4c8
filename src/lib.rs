//! Local Summarizer - A Rust CLI tool for summarizing text, media files and remote videos
//!
//! Input is normalized to raw text (reading it, transcribing it, or downloading and then
//! transcribing it), then summarized by a local LLM served over HTTP. Long texts are split
//! into token-bounded chunks and summarized with a map/reduce protocol.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod summarize;
pub mod transcribe;
pub mod utils;

use std::path::PathBuf;

pub use cli::{Cli, OutputFormat};
pub use config::Config;
pub use extractors::{InputResolver, InputSource};
pub use summarize::{DetailLevel, Strategy, SummaryOutcome, SummaryRequest, Summarizer};
pub use transcribe::{TranscriptionDispatcher, Transcriber};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, SummarizerError>;

/// Error types specific to the summarizer
#[derive(thiserror::Error, Debug)]
pub enum SummarizerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("File processing failed: {0}")]
    FileProcessing(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Summary backend error: {0}")]
    Backend(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Token counting failed: {0}")]
    Tokenization(String),

    #[error("Pipeline failed during {stage} ({source_description}): {message}")]
    Pipeline {
        stage: &'static str,
        source_description: String,
        message: String,
    },
}

impl SummarizerError {
    /// Short stable label for the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            SummarizerError::Configuration(_) => "configuration",
            SummarizerError::Transcription(_) => "transcription",
            SummarizerError::FileProcessing(_) => "file-processing",
            SummarizerError::FileNotFound(_) => "file-not-found",
            SummarizerError::Download(_) => "download",
            SummarizerError::Backend(_) => "backend",
            SummarizerError::Validation(_) => "validation",
            SummarizerError::Tokenization(_) => "tokenization",
            SummarizerError::Pipeline { .. } => "pipeline",
        }
    }
}
