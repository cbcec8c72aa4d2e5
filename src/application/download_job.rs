use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::{
    domain::{AppError, AudioFormat, JobOutcome, MediaKind, ProgressEvent},
    engine::{Engine, EngineConfig, MetadataReplacement, Postprocessor},
    utils::{hostile_filename_pattern, sanitize_filename},
};

pub const VIDEO_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
pub const AUDIO_FORMAT: &str = "bestaudio/best";
const AUDIO_QUALITY: &str = "192";
const VIDEO_CONTAINER: &str = "mp4";
const FALLBACK_TITLE: &str = "video";

/// One user request. Consumed by `execute`, never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub source_url: String,
    pub media_kind: MediaKind,
    pub audio_format: AudioFormat,
    pub destination_directory: PathBuf,
}

impl DownloadJob {
    /// Rejects an empty (or blank) URL before any job exists.
    pub fn new(
        source_url: &str,
        media_kind: MediaKind,
        audio_format: AudioFormat,
        destination_directory: PathBuf,
    ) -> Result<Self, AppError> {
        let source_url = source_url.trim();
        if source_url.is_empty() {
            return Err(AppError::InvalidInput);
        }

        Ok(Self {
            source_url: source_url.to_string(),
            media_kind,
            audio_format,
            destination_directory,
        })
    }

    pub fn extension(&self) -> &'static str {
        match self.media_kind {
            MediaKind::Video => VIDEO_CONTAINER,
            MediaKind::Audio => self.audio_format.codec(),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        let (format, postprocessors) = match self.media_kind {
            MediaKind::Video => (
                VIDEO_FORMAT,
                vec![Postprocessor::RemuxVideo {
                    container: VIDEO_CONTAINER.to_string(),
                }],
            ),
            MediaKind::Audio => (
                AUDIO_FORMAT,
                vec![Postprocessor::ExtractAudio {
                    codec: self.audio_format,
                    quality: AUDIO_QUALITY.to_string(),
                }],
            ),
        };

        EngineConfig {
            url: self.source_url.clone(),
            format: format.to_string(),
            output_template: self.destination_directory.join("%(title)s.%(ext)s"),
            postprocessors,
            // Keeps the name on disk identical to `output_path`.
            metadata_replacements: vec![MetadataReplacement {
                field: "title".to_string(),
                pattern: hostile_filename_pattern(),
                replacement: "_".to_string(),
            }],
        }
    }

    /// `<destination>/<sanitized title>.<ext>`, used when the engine does not
    /// say where it put the file.
    pub fn output_path(&self, title: Option<&str>) -> PathBuf {
        let name = title.map(sanitize_filename).unwrap_or_default();
        let name = if name.is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            name
        };
        self.destination_directory
            .join(format!("{}.{}", name, self.extension()))
    }

    /// Runs the download on the calling thread. `on_progress` sees every
    /// parsable tick in order; `on_outcome` is called exactly once, last.
    pub fn execute(
        self,
        engine: &dyn Engine,
        mut on_progress: impl FnMut(ProgressEvent),
        on_outcome: impl FnOnce(JobOutcome),
    ) {
        info!(url = %self.source_url, kind = ?self.media_kind, "Starting download");

        let outcome = match self.run(engine, &mut on_progress) {
            Ok(path) => {
                info!(path = %path.display(), "Download finished");
                JobOutcome::Success(path)
            }
            Err(e) => {
                error!(url = %self.source_url, error = %e, "Download failed");
                match e {
                    AppError::Engine(message) => JobOutcome::Failure(message),
                    other => JobOutcome::Failure(other.to_string()),
                }
            }
        };

        on_outcome(outcome);
    }

    fn run(
        &self,
        engine: &dyn Engine,
        on_progress: &mut dyn FnMut(ProgressEvent),
    ) -> Result<PathBuf, AppError> {
        std::fs::create_dir_all(&self.destination_directory).map_err(|e| {
            AppError::Io(format!(
                "Failed to create {}: {}",
                self.destination_directory.display(),
                e
            ))
        })?;

        let report = engine
            .download(&self.engine_config(), &mut |raw| {
                match ProgressEvent::from_raw(&raw) {
                    Some(event) => on_progress(event),
                    None => warn!(?raw, "Ignoring progress tick without a known status"),
                }
            })
            .map_err(|e| AppError::Engine(e.to_string()))?;

        match report.filepath {
            Some(path) => Ok(path),
            None => Ok(self.output_path(report.title.as_deref())),
        }
    }
}
