use anyhow::Result;
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::summarize::{DetailLevel, Strategy, SummaryOutcome};

/// Serialized form of a finished run
#[derive(Debug, Serialize)]
pub struct SummaryReport<'a> {
    pub summary: &'a str,
    pub source: &'a str,
    pub detail: DetailLevel,
    pub strategy: &'a Strategy,
    pub token_count: usize,
    pub elapsed_seconds: f64,
    pub generated_at: DateTime<Utc>,
}

impl<'a> SummaryReport<'a> {
    pub fn new(outcome: &'a SummaryOutcome, detail: DetailLevel, elapsed_seconds: f64) -> Self {
        Self {
            summary: &outcome.summary,
            source: &outcome.source_description,
            detail,
            strategy: &outcome.strategy,
            token_count: outcome.token_count,
            elapsed_seconds,
            generated_at: Utc::now(),
        }
    }
}

/// Render the report in the requested format
pub fn render(report: &SummaryReport<'_>, format: &OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => format!("{}\n", report.summary),
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
    })
}

/// Save the summary to a file
pub async fn save_to_file(report: &SummaryReport<'_>, path: &Path, format: &OutputFormat) -> Result<()> {
    let content = render(report, format)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print the summary to the console
pub fn print_to_console(report: &SummaryReport<'_>, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let banner = match report.strategy {
                Strategy::NoContent => "Result",
                _ => "Summary",
            };
            println!();
            println!("{}", style(format!("===== {} =====", banner)).bold().cyan());
            println!("{}", report.summary);
            println!("{}", style("=".repeat(banner.len() + 12)).bold().cyan());
        }
        OutputFormat::Json => println!("{}", render(report, format)?),
    }
    Ok(())
}
