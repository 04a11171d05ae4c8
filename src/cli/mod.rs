use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "summarize",
    about = "Local Summarizer - Summarize text, audio/video files and online videos with a local LLM",
    version,
    long_about = "Summarizes direct text, local text/audio/video files, or remote videos. Media is transcribed locally with whisper, and summaries are generated by a local Ollama server. Long inputs are chunked and summarized with a map/reduce pass."
)]
pub struct Cli {
    /// Text to summarize
    #[arg(short = 't', long = "text", value_name = "TEXT")]
    pub text: Option<String>,

    /// Local text, audio or video file to summarize
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Remote video URL to download, transcribe and summarize
    #[arg(short = 'u', long = "url", value_name = "URL")]
    pub url: Option<String>,

    /// Produce a detailed summary instead of a short one
    #[arg(short, long)]
    pub detailed: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write the summary to a file instead of the console
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable progress indicators and informational logs
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON document with the summary and run metadata
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
