use std::path::{Path, PathBuf};

use rfd::{MessageButtons, MessageDialogResult, MessageLevel};

const OPEN_FILE: &str = "Open file";
const OPEN_FOLDER: &str = "Open folder";
const CLOSE: &str = "Close";

/// What the user wants to do with a finished download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionChoice {
    OpenFile,
    OpenFolder,
    Dismiss,
}

pub async fn pick_folder(start: PathBuf) -> Option<PathBuf> {
    let mut dialog = rfd::AsyncFileDialog::new().set_title("Choose a download folder");
    if start.is_dir() {
        dialog = dialog.set_directory(&start);
    }
    dialog
        .pick_folder()
        .await
        .map(|handle| handle.path().to_path_buf())
}

pub async fn ask_completion(path: PathBuf) -> CompletionChoice {
    let result = rfd::AsyncMessageDialog::new()
        .set_level(MessageLevel::Info)
        .set_title("Download complete")
        .set_description(format!("The download has finished.\nFile: {}", path.display()))
        .set_buttons(MessageButtons::YesNoCancelCustom(
            OPEN_FILE.to_string(),
            OPEN_FOLDER.to_string(),
            CLOSE.to_string(),
        ))
        .show()
        .await;

    completion_choice(result)
}

pub async fn show_warning(message: String) {
    show(MessageLevel::Warning, "Warning", message).await;
}

pub async fn show_error(message: String) {
    show(MessageLevel::Error, "Error", message).await;
}

async fn show(level: MessageLevel, title: &str, message: String) {
    rfd::AsyncMessageDialog::new()
        .set_level(level)
        .set_title(title)
        .set_description(message)
        .set_buttons(MessageButtons::Ok)
        .show()
        .await;
}

// Backends report either the custom label or the positional button.
fn completion_choice(result: MessageDialogResult) -> CompletionChoice {
    match result {
        MessageDialogResult::Yes => CompletionChoice::OpenFile,
        MessageDialogResult::No => CompletionChoice::OpenFolder,
        MessageDialogResult::Custom(label) if label == OPEN_FILE => CompletionChoice::OpenFile,
        MessageDialogResult::Custom(label) if label == OPEN_FOLDER => CompletionChoice::OpenFolder,
        _ => CompletionChoice::Dismiss,
    }
}

/// Folder to reveal for a finished file.
pub fn containing_folder(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
