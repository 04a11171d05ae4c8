use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::ExternalBinaryConfig;
use crate::utils::{convert_to_canonical_wav, ScratchFile};
use crate::{Result, SummarizerError};

/// whisper.cpp command line binary. Prints the transcript to stdout.
pub struct WhisperCppBinary {
    executable: Option<PathBuf>,
    model: Option<PathBuf>,
    language: String,
    threads: u32,
    scratch_dir: PathBuf,
}

impl WhisperCppBinary {
    pub fn new(config: &ExternalBinaryConfig, language: &str, scratch_dir: PathBuf) -> Self {
        Self {
            executable: config.executable_path.clone(),
            model: config.model_path.clone(),
            language: language.trim().to_string(),
            threads: config.threads,
            scratch_dir,
        }
    }

    /// Executable and model paths, both must exist
    fn resolve_paths(&self) -> Result<(&Path, &Path)> {
        let executable = existing(
            self.executable.as_deref(),
            "whisper.cpp executable (WHISPER_CPP_EXECUTABLE_PATH)",
        )?;
        let model = existing(
            self.model.as_deref(),
            "whisper.cpp model (WHISPER_CPP_MODEL_PATH)",
        )?;
        Ok((executable, model))
    }

    pub async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        // Checked every call so a binary removed after startup is reported clearly
        let (executable, model) = self.resolve_paths()?;

        let scratch = ScratchFile::new_in(&self.scratch_dir, "whisper_cpp_", ".wav")?;
        convert_to_canonical_wav(audio_path, scratch.path())
            .await
            .map_err(|e| match e {
                SummarizerError::FileProcessing(message) => SummarizerError::Transcription(
                    format!("Audio preparation for whisper.cpp failed: {}", message),
                ),
                other => other,
            })?;

        let args = command_args(model, scratch.path(), &self.language, self.threads);
        tracing::debug!("Running {} {}", executable.display(), args.join(" "));

        run_binary(executable, &args).await
    }
}

/// Run whisper.cpp and return its trimmed stdout
async fn run_binary(executable: &Path, args: &[String]) -> Result<String> {
    let output = Command::new(executable)
        .args(args)
        .output()
        .await
        .map_err(|e| {
            SummarizerError::Transcription(format!(
                "Failed to launch whisper.cpp at {}: {}",
                executable.display(),
                e
            ))
        })?;

    if !output.status.success() {
        let code = output
            .status
            .code()
            .map(|code| code.to_string())
            .unwrap_or_else(|| "terminated by signal".to_string());
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SummarizerError::Transcription(format!(
            "whisper.cpp exited with code {}: {}",
            code,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn existing<'a>(path: Option<&'a Path>, what: &str) -> Result<&'a Path> {
    match path {
        None => Err(SummarizerError::Configuration(format!("{} is not configured", what))),
        Some(path) if !path.is_file() => Err(SummarizerError::Configuration(format!(
            "{} not found at {}",
            what,
            path.display()
        ))),
        Some(path) => Ok(path),
    }
}

/// `-m model -f wav -l lang -otxt -nt -t threads`
fn command_args(model: &Path, wav: &Path, language: &str, threads: u32) -> Vec<String> {
    let language = if language.is_empty() { "auto" } else { language };
    vec![
        "-m".to_string(),
        model.to_string_lossy().into_owned(),
        "-f".to_string(),
        wav.to_string_lossy().into_owned(),
        "-l".to_string(),
        language.to_string(),
        "-otxt".to_string(),
        "-nt".to_string(),
        "-t".to_string(),
        threads.to_string(),
    ]
}
