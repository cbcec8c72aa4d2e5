pub mod download_job;
pub mod job_runner;

pub use download_job::DownloadJob;
pub use job_runner::{JobEvent, JobRunner};
