use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::domain::AudioFormat;

/// One progress tick exactly as the engine reported it.
pub type RawProgress = Map<String, Value>;

pub const PROGRAM_ENV: &str = "TUBE_GRABBER_YTDLP";
pub const FFMPEG_ENV: &str = "TUBE_GRABBER_FFMPEG";

/// What to download and how to post-process it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub url: String,
    /// Format selector, e.g. `bestaudio/best`.
    pub format: String,
    /// Output template with engine placeholders such as `%(title)s`.
    pub output_template: PathBuf,
    pub postprocessors: Vec<Postprocessor>,
    /// Rewrites applied to metadata fields before the output name is built.
    pub metadata_replacements: Vec<MetadataReplacement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Postprocessor {
    ExtractAudio { codec: AudioFormat, quality: String },
    RemuxVideo { container: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataReplacement {
    pub field: String,
    pub pattern: String,
    pub replacement: String,
}

/// What the engine tells us once the download is done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineReport {
    pub title: Option<String>,
    /// Final location of the file, after the engine's own name cleanup.
    pub filepath: Option<PathBuf>,
}

/// Configuration for the yt-dlp binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub program: PathBuf,
    pub ffmpeg_location: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            ffmpeg_location: None,
        }
    }
}

impl EngineSettings {
    /// Defaults overridden by `TUBE_GRABBER_YTDLP` and `TUBE_GRABBER_FFMPEG`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(program) = std::env::var_os(PROGRAM_ENV).filter(|v| !v.is_empty()) {
            settings.program = PathBuf::from(program);
        }
        if let Some(ffmpeg) = std::env::var_os(FFMPEG_ENV).filter(|v| !v.is_empty()) {
            settings.ffmpeg_location = Some(PathBuf::from(ffmpeg));
        }
        settings
    }
}
