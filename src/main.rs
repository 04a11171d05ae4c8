use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use local_summarizer::summarize::{DetailLevel, Strategy, SummaryRequest};
use local_summarizer::output::{self, SummaryReport};
use local_summarizer::utils;
use local_summarizer::{Cli, Config, InputSource, OutputFormat, Summarizer, SummarizerError};

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "local_summarizer=debug,summarize=debug"
    } else if cli.quiet {
        "local_summarizer=warn,summarize=warn"
    } else {
        "local_summarizer=info,summarize=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    let json = std::env::var("LOG_FORMAT")
        .map(|value| value.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn spinner(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new_spinner();
    if let Ok(spinner_style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        progress.set_style(spinner_style);
    }
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

async fn run(cli: &Cli, started: Instant) -> Result<()> {
    let config = Config::load().await?;

    if cli.show_config {
        config.display();
        return Ok(());
    }

    let source = InputSource::from_parts(cli.text.clone(), cli.file.clone(), cli.url.clone())?;

    // Media inputs need ffmpeg, URLs need yt-dlp; a missing tool is only a warning here
    if !matches!(source, InputSource::DirectText(_)) {
        let missing_deps = utils::check_dependencies().await;
        if !missing_deps.is_empty() {
            eprintln!("{}", style("⚠️  Dependency check warnings:").yellow());
            for dep in missing_deps {
                eprintln!("   • {}", dep);
            }
            eprintln!("   (Continuing anyway - tools may be available)");
        }
    }

    let summarizer = Summarizer::from_config(&config)?;
    let detail = DetailLevel::from_flag(cli.detailed);

    let progress = spinner(cli.quiet || cli.format == OutputFormat::Json);
    progress.set_message(format!("Summarizing {}...", source.description()));

    let result = summarizer.summarize(SummaryRequest { source, detail }).await;
    progress.finish_and_clear();
    let outcome = result?;

    if let Strategy::MapReduce {
        chunks,
        failed_chunks,
    } = outcome.strategy
    {
        if failed_chunks > 0 {
            eprintln!(
                "{}",
                style(format!(
                    "⚠️  {} of {} chunks could not be summarized and were replaced by placeholders",
                    failed_chunks, chunks
                ))
                .yellow()
            );
        }
    }

    let report = SummaryReport::new(&outcome, detail, started.elapsed().as_secs_f64());
    match &cli.output {
        Some(path) => {
            output::save_to_file(&report, path, &cli.format)
                .await
                .with_context(|| format!("Failed to save summary to {}", path.display()))?;
            println!("Summary saved to: {}", path.display());
        }
        None => output::print_to_console(&report, &cli.format)
            .context("Failed to print summary")?,
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let started = Instant::now();
    let result = run(&cli, started).await;
    let elapsed = utils::format_elapsed(started.elapsed().as_secs_f64());

    match result {
        Ok(()) => {
            if !cli.show_config {
                eprintln!("{} in {}", style("Done").green().bold(), elapsed);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            match err.downcast_ref::<SummarizerError>() {
                Some(summarizer_error) => eprintln!(
                    "{} {}",
                    style(format!("Error ({}):", summarizer_error.kind())).red().bold(),
                    summarizer_error
                ),
                None => eprintln!("{} {:#}", style("Unexpected error:").red().bold(), err),
            }
            eprintln!("Finished in {}", elapsed);
            ExitCode::FAILURE
        }
    }
}
