use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use iced::Task;
use tracing::{info, warn};

use crate::application::{DownloadJob, JobEvent, JobRunner};
use crate::domain::{AppError, DownloadPhase, JobOutcome, ProgressEvent};
use crate::engine::{EngineSettings, YtDlp};
use crate::platform::{Shell, SystemShell};
use crate::ui::dialogs::{self, CompletionChoice};
use crate::ui::{DownloadMessage, DownloadView};
use crate::utils::default_output_dir;

pub struct DownloadApp {
    view: DownloadView,
    runner: JobRunner,
    shell: Arc<dyn Shell>,
    phase: DownloadPhase,
    // Most recent successful download, target of the open actions
    completed_file: Option<PathBuf>,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadApp {
    pub fn new() -> Self {
        let settings = EngineSettings::from_env();
        info!(program = %settings.program.display(), "Using download engine");

        let runner = JobRunner::new(Arc::new(YtDlp::new(settings)));
        Self::with_services(runner, Arc::new(SystemShell))
    }

    pub fn with_services(runner: JobRunner, shell: Arc<dyn Shell>) -> Self {
        Self {
            view: DownloadView::default(),
            runner,
            shell,
            phase: DownloadPhase::Idle,
            completed_file: None,
        }
    }

    fn start_download(&mut self) -> Task<Message> {
        if self.phase == DownloadPhase::Running || self.runner.is_busy() {
            return Task::none();
        }

        let destination = match self.view.destination.trim() {
            "" => default_output_dir(),
            dir => PathBuf::from(dir),
        };

        let job = match DownloadJob::new(
            &self.view.youtube_url,
            self.view.media_kind,
            self.view.audio_format,
            destination,
        ) {
            Ok(job) => job,
            Err(e) => {
                self.view.status_message = e.to_string();
                return Task::perform(dialogs::show_warning(e.to_string()), |_| {
                    Message::DialogClosed
                });
            }
        };

        match self.runner.submit(job) {
            Ok(events) => {
                self.phase = DownloadPhase::Running;
                self.completed_file = None;
                self.view.is_downloading = true;
                self.view.download_progress = 0.0;
                self.view.status_message = "Downloading...".to_string();

                Task::stream(events.into_stream().map(Message::Job))
            }
            Err(e) => {
                warn!(error = %e, "Download was not started");
                self.view.status_message = e.to_string();
                Task::none()
            }
        }
    }

    fn render_progress(&mut self, event: &ProgressEvent) {
        if self.phase != DownloadPhase::Running {
            return;
        }

        let line = event.status_line();
        if let Some(percent) = line.percent {
            self.view.download_progress = f32::from(percent);
        }
        self.view.status_message = line.text;
    }

    fn finish(&mut self, outcome: JobOutcome) -> Task<Message> {
        self.phase = DownloadPhase::Idle;
        self.view.is_downloading = false;

        match outcome {
            JobOutcome::Success(path) => {
                self.view.download_progress = 100.0;
                self.view.status_message = format!("Download complete: {}", display_name(&path));
                self.completed_file = Some(path.clone());

                Task::perform(dialogs::ask_completion(path), Message::CompletionChosen)
            }
            JobOutcome::Failure(message) => {
                self.view.status_message = format!("Error: {}", message);
                Task::perform(
                    dialogs::show_error(format!(
                        "An error occurred during the download:\n{}",
                        message
                    )),
                    |_| Message::DialogClosed,
                )
            }
        }
    }

    fn open_completed(&mut self, choice: CompletionChoice) -> Task<Message> {
        let Some(file) = self.completed_file.clone() else {
            return Task::none();
        };

        match shell_action(self.shell.clone(), choice, file) {
            Some(action) => Task::perform(run_shell(action), Message::ShellFinished),
            None => Task::none(),
        }
    }
}

type ShellAction = Box<dyn FnOnce() -> Result<String, AppError> + Send>;

/// The open request behind a completion choice, yielding the status text.
fn shell_action(
    shell: Arc<dyn Shell>,
    choice: CompletionChoice,
    file: PathBuf,
) -> Option<ShellAction> {
    let action: ShellAction = match choice {
        CompletionChoice::OpenFile => Box::new(move || {
            shell.open_file(&file)?;
            Ok(format!("Opened file: {}", display_name(&file)))
        }),
        CompletionChoice::OpenFolder => {
            let folder = dialogs::containing_folder(&file);
            Box::new(move || {
                shell.open_folder(&folder)?;
                Ok(format!("Opened folder: {}", display_name(&folder)))
            })
        }
        CompletionChoice::Dismiss => return None,
    };
    Some(action)
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    FolderSelected(Option<PathBuf>),
    Job(JobEvent),
    CompletionChosen(CompletionChoice),
    /// Status text on success, warning text on failure
    ShellFinished(Result<String, String>),
    DialogClosed,
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::DownloadPressed => return app.start_download(),
                DownloadMessage::BrowsePressed => {
                    let start = PathBuf::from(app.view.destination.trim());
                    return Task::perform(dialogs::pick_folder(start), Message::FolderSelected);
                }
                _ => {}
            }
        }
        Message::FolderSelected(Some(folder)) => {
            app.view.destination = folder.display().to_string();
        }
        Message::FolderSelected(None) => {}
        Message::Job(JobEvent::Progress(event)) => app.render_progress(&event),
        Message::Job(JobEvent::Finished(outcome)) => return app.finish(outcome),
        Message::CompletionChosen(choice) => return app.open_completed(choice),
        Message::ShellFinished(Ok(status)) => {
            app.view.status_message = status;
        }
        Message::ShellFinished(Err(warning)) => {
            app.view.status_message = warning.clone();
            return Task::perform(dialogs::show_warning(warning), |_| Message::DialogClosed);
        }
        Message::DialogClosed => {}
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}

// Launching a handler can block, so keep it off the UI thread.
async fn run_shell<F>(open: F) -> Result<String, String>
where
    F: FnOnce() -> Result<String, AppError> + Send + 'static,
{
    match tokio::task::spawn_blocking(open).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(AppError::Shell(e.to_string()).to_string()),
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
