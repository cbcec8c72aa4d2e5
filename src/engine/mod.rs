pub mod models;
pub mod ytdlp;

use thiserror::Error;

pub use models::{
    EngineConfig, EngineReport, EngineSettings, MetadataReplacement, Postprocessor, RawProgress,
};
pub use ytdlp::YtDlp;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read engine output: {0}")]
    Io(#[from] std::io::Error),

    /// The engine ran and gave up; the message is its own.
    #[error("{0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// The external download/transcode engine.
///
/// `download` blocks for the whole transfer, post-processing included, and
/// calls `on_progress` zero or more times on the calling thread.
pub trait Engine: Send + Sync {
    fn download(
        &self,
        config: &EngineConfig,
        on_progress: &mut dyn FnMut(RawProgress),
    ) -> Result<EngineReport>;
}

#[cfg(test)]
pub mod testing {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use serde_json::Value;

    use super::*;

    /// Replays canned ticks, then succeeds with `title` (and `filepath` if set)
    /// or fails with `error`.
    #[derive(Default)]
    pub struct ScriptedEngine {
        pub ticks: Vec<Value>,
        pub title: Option<String>,
        pub filepath: Option<PathBuf>,
        pub error: Option<String>,
        pub seen: Arc<Mutex<Vec<EngineConfig>>>,
    }

    impl ScriptedEngine {
        pub fn succeeding(title: &str) -> Self {
            Self {
                title: Some(title.to_string()),
                ..Default::default()
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                error: Some(message.to_string()),
                ..Default::default()
            }
        }

        pub fn with_filepath(mut self, filepath: PathBuf) -> Self {
            self.filepath = Some(filepath);
            self
        }

        pub fn with_ticks(mut self, ticks: Vec<Value>) -> Self {
            self.ticks = ticks;
            self
        }
    }

    impl Engine for ScriptedEngine {
        fn download(
            &self,
            config: &EngineConfig,
            on_progress: &mut dyn FnMut(RawProgress),
        ) -> Result<EngineReport> {
            self.seen.lock().unwrap().push(config.clone());
            for tick in &self.ticks {
                if let Value::Object(map) = tick {
                    on_progress(map.clone());
                }
            }
            match &self.error {
                Some(message) => Err(EngineError::Failed(message.clone())),
                None => Ok(EngineReport {
                    title: self.title.clone(),
                    filepath: self.filepath.clone(),
                }),
            }
        }
    }
}
