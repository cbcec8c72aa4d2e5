use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use futures::{stream::BoxStream, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error};

use crate::{
    application::DownloadJob,
    domain::{AppError, JobOutcome, ProgressEvent},
    engine::Engine,
};

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress(ProgressEvent),
    Finished(JobOutcome),
}

/// Runs one job at a time on a dedicated worker thread.
///
/// Every accepted job yields its progress events in order, followed by
/// exactly one `Finished`, after which the event stream ends. The slot is
/// freed before `Finished` is sent, so a consumer that has seen the outcome
/// can submit again immediately.
#[derive(Clone)]
pub struct JobRunner {
    engine: Arc<dyn Engine>,
    busy: Arc<AtomicBool>,
}

/// Receiving end of a submitted job.
pub struct JobEvents {
    rx: UnboundedReceiver<JobEvent>,
}

struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl JobRunner {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn submit(&self, job: DownloadJob) -> Result<JobEvents, AppError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::Busy);
        }
        let slot = SlotGuard(self.busy.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        let engine = self.engine.clone();

        thread::Builder::new()
            .name("download-worker".to_string())
            .spawn(move || {
                let progress_tx = tx.clone();
                let mut outcome = None;

                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    job.execute(
                        engine.as_ref(),
                        |event| {
                            let _ = progress_tx.send(JobEvent::Progress(event));
                        },
                        |finished| outcome = Some(finished),
                    );
                }));

                let outcome = match (result, outcome) {
                    (Ok(()), Some(outcome)) => outcome,
                    (Ok(()), None) => {
                        JobOutcome::Failure("The download ended without a result".to_string())
                    }
                    (Err(payload), _) => {
                        let message = panic_message(payload.as_ref());
                        error!(%message, "Download worker panicked");
                        JobOutcome::Failure(format!("The download worker crashed: {}", message))
                    }
                };

                drop(slot);
                if tx.send(JobEvent::Finished(outcome)).is_err() {
                    debug!("Job outcome dropped, nobody is listening");
                }
            })
            .map_err(|e| AppError::Io(format!("Failed to start download worker: {}", e)))?;

        Ok(JobEvents { rx })
    }
}

impl JobEvents {
    /// Blocks the current thread until the next event. Must not be called
    /// from inside an async runtime.
    #[cfg(test)]
    pub fn blocking_recv(&mut self) -> Option<JobEvent> {
        self.rx.blocking_recv()
    }

    pub fn into_stream(self) -> BoxStream<'static, JobEvent> {
        futures::stream::unfold(self.rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AudioFormat, MediaKind};
    use crate::engine::{testing::ScriptedEngine, EngineConfig, EngineReport, RawProgress};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;

    fn audio_job(dir: &Path) -> DownloadJob {
        DownloadJob::new(
            "https://youtu.be/abc",
            MediaKind::Audio,
            AudioFormat::Wav,
            dir.to_path_buf(),
        )
        .unwrap()
    }

    fn drain(mut events: JobEvents) -> Vec<JobEvent> {
        let mut all = Vec::new();
        while let Some(event) = events.blocking_recv() {
            all.push(event);
        }
        all
    }

    /// Blocks inside `download` until the test lets it go.
    struct GatedEngine {
        gate: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl Engine for GatedEngine {
        fn download(
            &self,
            _config: &EngineConfig,
            _on_progress: &mut dyn FnMut(RawProgress),
        ) -> crate::engine::Result<EngineReport> {
            let _ = self.gate.lock().unwrap().recv();
            Ok(EngineReport {
                title: Some("Gated".to_string()),
                filepath: None,
            })
        }
    }

    struct PanickingEngine;

    impl Engine for PanickingEngine {
        fn download(
            &self,
            _config: &EngineConfig,
            on_progress: &mut dyn FnMut(RawProgress),
        ) -> crate::engine::Result<EngineReport> {
            let tick = json!({ "status": "downloading", "downloaded_bytes": 1 });
            if let serde_json::Value::Object(tick) = tick {
                on_progress(tick);
            }
            panic!("engine exploded");
        }
    }

    #[test]
    fn test_progress_precedes_single_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::succeeding("Song").with_ticks(vec![
            json!({ "status": "downloading", "downloaded_bytes": 10, "total_bytes": 100 }),
            json!({ "status": "downloading", "downloaded_bytes": 60, "total_bytes": 100 }),
            json!({ "status": "finished", "downloaded_bytes": 100, "total_bytes": 100 }),
        ]);
        let runner = JobRunner::new(Arc::new(engine));

        let events = drain(runner.submit(audio_job(dir.path())).unwrap());

        assert_eq!(events.len(), 4);
        let percents: Vec<Option<u8>> = events[..3]
            .iter()
            .map(|e| match e {
                JobEvent::Progress(p) => p.percentage(),
                other => panic!("expected progress, got {:?}", other),
            })
            .collect();
        assert_eq!(percents, vec![Some(10), Some(60), Some(100)]);
        assert_eq!(
            events[3],
            JobEvent::Finished(JobOutcome::Success(dir.path().join("Song.wav")))
        );
        assert!(!runner.is_busy());
    }

    #[test]
    fn test_failure_is_the_last_event() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::failing("HTTP Error 404: Not Found")
            .with_ticks(vec![json!({ "status": "downloading", "downloaded_bytes": 1 })]);
        let runner = JobRunner::new(Arc::new(engine));

        let events = drain(runner.submit(audio_job(dir.path())).unwrap());

        let finished: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, JobEvent::Finished(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(finished, vec![events.len() - 1]);
        assert_eq!(
            events.last(),
            Some(&JobEvent::Finished(JobOutcome::Failure(
                "HTTP Error 404: Not Found".to_string()
            )))
        );
    }

    #[test]
    fn test_second_submission_is_rejected_while_busy() {
        let dir = tempfile::tempdir().unwrap();
        let (release, gate) = std::sync::mpsc::channel();
        let runner = JobRunner::new(Arc::new(GatedEngine {
            gate: Mutex::new(gate),
        }));

        let first = runner.submit(audio_job(dir.path())).unwrap();
        assert!(runner.is_busy());
        assert!(matches!(runner.submit(audio_job(dir.path())), Err(AppError::Busy)));

        release.send(()).unwrap();
        let events = drain(first);
        assert!(matches!(events.last(), Some(JobEvent::Finished(JobOutcome::Success(_)))));

        // Slot is free as soon as the outcome has been observed.
        assert!(!runner.is_busy());
        release.send(()).unwrap();
        let again = drain(runner.submit(audio_job(dir.path())).unwrap());
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_worker_panic_still_produces_one_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = JobRunner::new(Arc::new(PanickingEngine));

        let events = drain(runner.submit(audio_job(dir.path())).unwrap());

        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], JobEvent::Progress(_)));
        match &events[1] {
            JobEvent::Finished(JobOutcome::Failure(message)) => {
                assert!(message.contains("engine exploded"))
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(!runner.is_busy());
    }

    #[test]
    fn test_events_as_stream() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::succeeding("Clip").with_ticks(vec![json!({
            "status": "downloading", "downloaded_bytes": 5, "total_bytes": 10
        })]);
        let runner = JobRunner::new(Arc::new(engine));
        let stream = runner.submit(audio_job(dir.path())).unwrap().into_stream();

        let events: Vec<JobEvent> = futures::executor::block_on(stream.collect());

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], JobEvent::Finished(JobOutcome::Success(_))));
    }
}
