use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use crate::transcribe::Transcriber;
use crate::utils::{convert_to_canonical_wav, sanitize_filename, ScratchFile};
use crate::{Result, SummarizerError};

/// Broad category of a local file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Text,
    Audio,
    Video,
}

/// Detected content type of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaType {
    pub kind: MediaKind,
    pub mime: &'static str,
}

impl MediaType {
    const fn new(kind: MediaKind, mime: &'static str) -> Self {
        Self { kind, mime }
    }
}

const SNIFF_LEN: usize = 512;

/// Guess the content type from the file extension
pub fn from_extension(path: &Path) -> Option<MediaType> {
    use MediaKind::*;

    let extension = path.extension()?.to_str()?.to_lowercase();
    let media = match extension.as_str() {
        "txt" | "text" | "log" => MediaType::new(Text, "text/plain"),
        "md" | "markdown" => MediaType::new(Text, "text/markdown"),
        "rst" => MediaType::new(Text, "text/x-rst"),
        "csv" => MediaType::new(Text, "text/csv"),
        "html" | "htm" => MediaType::new(Text, "text/html"),
        "xml" => MediaType::new(Text, "text/xml"),
        "toml" => MediaType::new(Text, "application/toml"),
        "yaml" | "yml" => MediaType::new(Text, "application/yaml"),
        "json" => MediaType::new(Text, "application/json"),
        "py" => MediaType::new(Text, "text/x-python"),
        "rs" => MediaType::new(Text, "text/x-rust"),
        "srt" => MediaType::new(Text, "application/x-subrip"),
        "vtt" => MediaType::new(Text, "text/vtt"),
        "mp3" => MediaType::new(Audio, "audio/mpeg"),
        "wav" => MediaType::new(Audio, "audio/wav"),
        "m4a" => MediaType::new(Audio, "audio/mp4"),
        "aac" => MediaType::new(Audio, "audio/aac"),
        "ogg" | "oga" | "opus" => MediaType::new(Audio, "audio/ogg"),
        "flac" => MediaType::new(Audio, "audio/flac"),
        "wma" => MediaType::new(Audio, "audio/x-ms-wma"),
        "mp4" | "m4v" => MediaType::new(Video, "video/mp4"),
        "mkv" => MediaType::new(Video, "video/x-matroska"),
        "mov" => MediaType::new(Video, "video/quicktime"),
        "avi" => MediaType::new(Video, "video/x-msvideo"),
        "webm" => MediaType::new(Video, "video/webm"),
        "flv" => MediaType::new(Video, "video/x-flv"),
        "wmv" => MediaType::new(Video, "video/x-ms-wmv"),
        "mpeg" | "mpg" => MediaType::new(Video, "video/mpeg"),
        _ => return None,
    };
    Some(media)
}

/// Recognize well-known binary container signatures
pub fn sniff_signature(header: &[u8]) -> Option<MediaType> {
    use MediaKind::*;

    let starts = |magic: &[u8]| header.starts_with(magic);

    if starts(b"RIFF") && header.get(8..12) == Some(&b"WAVE"[..]) {
        Some(MediaType::new(Audio, "audio/wav"))
    } else if starts(b"RIFF") && header.get(8..12) == Some(&b"AVI "[..]) {
        Some(MediaType::new(Video, "video/x-msvideo"))
    } else if starts(b"ID3") || (header.len() > 1 && header[0] == 0xFF && header[1] & 0xE0 == 0xE0)
    {
        Some(MediaType::new(Audio, "audio/mpeg"))
    } else if starts(b"fLaC") {
        Some(MediaType::new(Audio, "audio/flac"))
    } else if starts(b"OggS") {
        Some(MediaType::new(Audio, "audio/ogg"))
    } else if starts(&[0x1A, 0x45, 0xDF, 0xA3]) {
        Some(MediaType::new(Video, "video/x-matroska"))
    } else if header.get(4..8) == Some(&b"ftyp"[..]) {
        match header.get(8..12) {
            Some(b"M4A ") | Some(b"M4B ") => Some(MediaType::new(Audio, "audio/mp4")),
            Some(b"qt  ") => Some(MediaType::new(Video, "video/quicktime")),
            _ => Some(MediaType::new(Video, "video/mp4")),
        }
    } else {
        None
    }
}

/// Whether a file header looks like UTF-8 text
fn looks_like_text(header: &[u8]) -> bool {
    if header.contains(&0) {
        return false;
    }
    match std::str::from_utf8(header) {
        Ok(_) => true,
        // A multi-byte char cut off by the sniff window is still text
        Err(e) => e.error_len().is_none(),
    }
}

/// Extracts text from local files: read, transcribe, or extract audio then transcribe
pub struct LocalFileExtractor {
    scratch_dir: PathBuf,
}

impl LocalFileExtractor {
    pub fn new(scratch_dir: PathBuf) -> Self {
        Self { scratch_dir }
    }

    /// Signature sniffing first, then the extension table, then a text heuristic
    pub async fn detect(&self, path: &Path) -> Result<Option<MediaType>> {
        let mut file = tokio::fs::File::open(path).await.map_err(|e| {
            SummarizerError::FileProcessing(format!("Cannot open {}: {}", path.display(), e))
        })?;

        let mut header = Vec::with_capacity(SNIFF_LEN);
        (&mut file)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut header)
            .await
            .map_err(|e| {
                SummarizerError::FileProcessing(format!("Cannot read {}: {}", path.display(), e))
            })?;

        let detected = sniff_signature(&header)
            .or_else(|| from_extension(path))
            .or_else(|| {
                looks_like_text(&header).then_some(MediaType::new(MediaKind::Text, "text/plain"))
            });
        Ok(detected)
    }

    pub async fn extract_text(&self, path: &Path, transcriber: &dyn Transcriber) -> Result<String> {
        if !path.is_file() {
            return Err(SummarizerError::FileNotFound(path.to_path_buf()));
        }

        let media = self.detect(path).await?.ok_or_else(|| {
            SummarizerError::FileProcessing(format!(
                "Unsupported file type: {}",
                path.display()
            ))
        })?;
        tracing::info!("Detected {} for {}", media.mime, path.display());

        match media.kind {
            MediaKind::Text => read_text(path).await,
            MediaKind::Audio => transcriber.transcribe(path).await,
            MediaKind::Video => self.transcribe_video(path, transcriber).await,
        }
    }

    async fn transcribe_video(&self, path: &Path, transcriber: &dyn Transcriber) -> Result<String> {
        let stem = path
            .file_stem()
            .map(|stem| sanitize_filename(&stem.to_string_lossy()))
            .unwrap_or_default();
        let scratch = ScratchFile::new_in(
            &self.scratch_dir,
            &format!("extracted_audio_{}_", stem),
            ".wav",
        )?;

        tracing::info!("Extracting audio track from {}", path.display());
        convert_to_canonical_wav(path, scratch.path()).await?;

        // The scratch file is removed when `scratch` drops, whatever the outcome
        transcriber.transcribe(scratch.path()).await
    }
}

async fn read_text(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        SummarizerError::FileProcessing(format!("Cannot read {}: {}", path.display(), e))
    })?;

    String::from_utf8(bytes).map_err(|e| {
        SummarizerError::FileProcessing(format!(
            "{} is not valid UTF-8 text: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::MockTranscriber;

    fn wav_header() -> Vec<u8> {
        let mut header = b"RIFF".to_vec();
        header.extend_from_slice(&[0x24, 0, 0, 0]);
        header.extend_from_slice(b"WAVEfmt ");
        header
    }

    #[test]
    fn test_signatures() {
        assert_eq!(sniff_signature(&wav_header()).unwrap().kind, MediaKind::Audio);
        assert_eq!(sniff_signature(b"ID3\x03\x00").unwrap().mime, "audio/mpeg");
        assert_eq!(
            sniff_signature(b"\x00\x00\x00\x20ftypisom").unwrap().kind,
            MediaKind::Video
        );
        assert_eq!(
            sniff_signature(b"\x00\x00\x00\x20ftypM4A ").unwrap().kind,
            MediaKind::Audio
        );
        assert!(sniff_signature(b"plain words").is_none());
    }

    #[test]
    fn test_extension_table() {
        assert_eq!(
            from_extension(Path::new("notes.MD")).unwrap().kind,
            MediaKind::Text
        );
        assert_eq!(
            from_extension(Path::new("talk.mkv")).unwrap().kind,
            MediaKind::Video
        );
        assert!(from_extension(Path::new("archive.zip")).is_none());
        assert!(from_extension(Path::new("README")).is_none());
    }

    #[test]
    fn test_text_heuristic() {
        assert!(looks_like_text("héllo wörld".as_bytes()));
        assert!(looks_like_text(&"é".as_bytes()[..1]));
        assert!(!looks_like_text(&[0x00, 0x01, 0x02]));
        assert!(!looks_like_text(&[0xC3, 0x28]));
    }

    #[tokio::test]
    async fn test_text_file_is_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Line one.\n\nLine two.").unwrap();

        let extractor = LocalFileExtractor::new(dir.path().to_path_buf());
        let text = extractor
            .extract_text(&path, &MockTranscriber::new())
            .await
            .unwrap();
        assert_eq!(text, "Line one.\n\nLine two.");
    }

    #[tokio::test]
    async fn test_extensionless_text_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("README");
        std::fs::write(&path, "just text").unwrap();

        let extractor = LocalFileExtractor::new(dir.path().to_path_buf());
        let media = extractor.detect(&path).await.unwrap().unwrap();
        assert_eq!(media.kind, MediaKind::Text);
    }

    #[tokio::test]
    async fn test_invalid_utf8_text_is_file_processing_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        std::fs::write(&path, [b'o', b'k', 0xFF, 0xFE]).unwrap();

        let extractor = LocalFileExtractor::new(dir.path().to_path_buf());
        let err = extractor
            .extract_text(&path, &MockTranscriber::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::FileProcessing(_)));
    }

    #[tokio::test]
    async fn test_audio_file_goes_to_transcriber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice.bin");
        std::fs::write(&path, wav_header()).unwrap();

        let expected = path.clone();
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .withf(move |p| p == expected.as_path())
            .times(1)
            .returning(|_| Ok("hello there".to_string()));

        let extractor = LocalFileExtractor::new(dir.path().to_path_buf());
        assert_eq!(
            extractor.extract_text(&path, &transcriber).await.unwrap(),
            "hello there"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = LocalFileExtractor::new(dir.path().to_path_buf());
        let err = extractor
            .extract_text(&dir.path().join("nope.txt"), &MockTranscriber::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_binary_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.dat");
        std::fs::write(&path, [0x00, 0x9F, 0x92, 0x96, 0x00]).unwrap();

        let extractor = LocalFileExtractor::new(dir.path().to_path_buf());
        let err = extractor
            .extract_text(&path, &MockTranscriber::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SummarizerError::FileProcessing(_)));
        assert!(err.to_string().contains("Unsupported"));
    }

    /// 0.1 s of 16 kHz mono 16-bit silence
    fn silent_wav() -> Vec<u8> {
        let data_len: u32 = 1600 * 2;
        let mut wav = b"RIFF".to_vec();
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&16_000u32.to_le_bytes());
        wav.extend_from_slice(&32_000u32.to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav.resize(wav.len() + data_len as usize, 0);
        wav
    }

    async fn ffmpeg_available() -> bool {
        tokio::process::Command::new("ffmpeg")
            .arg("-version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_failed_audio_extraction_leaves_no_scratch_file() {
        let inputs = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let path = inputs.path().join("talk.mp4");
        let mut garbage = b"\x00\x00\x00\x20ftypisom".to_vec();
        garbage.extend_from_slice(&[0xAB; 256]);
        std::fs::write(&path, garbage).unwrap();

        let extractor = LocalFileExtractor::new(scratch.path().to_path_buf());
        // ffmpeg either rejects the container or is missing; both are file-processing errors
        let err = extractor
            .extract_text(&path, &MockTranscriber::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SummarizerError::FileProcessing(_)));
        assert_eq!(entries(scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_failed_transcription_leaves_no_scratch_file() {
        if !ffmpeg_available().await {
            return;
        }

        let inputs = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let path = inputs.path().join("clip.wav");
        std::fs::write(&path, silent_wav()).unwrap();

        let scratch_dir = scratch.path().to_path_buf();
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .withf(move |p| p.starts_with(&scratch_dir) && p.is_file())
            .times(1)
            .returning(|_| Err(SummarizerError::Transcription("engine crashed".to_string())));

        let extractor = LocalFileExtractor::new(scratch.path().to_path_buf());
        let err = extractor
            .transcribe_video(&path, &transcriber)
            .await
            .unwrap_err();

        assert!(matches!(err, SummarizerError::Transcription(_)));
        assert_eq!(entries(scratch.path()), 0);
    }
}
