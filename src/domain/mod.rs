pub mod error;
pub mod model;
pub mod progress;

pub use error::AppError;
pub use model::{AudioFormat, DownloadPhase, JobOutcome, MediaKind};
pub use progress::ProgressEvent;
