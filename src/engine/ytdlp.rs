use std::borrow::Cow;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{mpsc, LazyLock};
use std::thread;

use regex::Regex;
use tracing::{debug, warn};

use super::models::{EngineConfig, EngineReport, EngineSettings, Postprocessor, RawProgress};
use super::{Engine, EngineError, Result};

const PROGRESS_MARKER: &str = "[progress] ";
const TITLE_MARKER: &str = "[title] ";
const FILEPATH_MARKER: &str = "[filepath] ";

static ANSI_ESCAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").ok());

/// Drives the `yt-dlp` command line program.
///
/// Progress is requested as one JSON object per line through a progress
/// template. Once the file has been moved into place its title and final
/// path are printed. With `--print` the program runs in quiet mode, which
/// sends progress to stderr, so both streams are scanned for markers.
#[derive(Debug, Clone, Default)]
pub struct YtDlp {
    settings: EngineSettings,
}

#[derive(Debug, Clone, PartialEq)]
enum EngineLine {
    Progress(RawProgress),
    Title(String),
    FilePath(PathBuf),
    Error(String),
    Message(String),
    Malformed(String),
    Blank,
}

/// Kills and reaps the child unless it has already exited.
struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            debug!(pid = self.0.id(), "Killing yt-dlp");
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }
}

impl YtDlp {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

impl Engine for YtDlp {
    fn download(
        &self,
        config: &EngineConfig,
        on_progress: &mut dyn FnMut(RawProgress),
    ) -> Result<EngineReport> {
        let args = build_args(config, &self.settings);
        debug!(program = %self.settings.program.display(), ?args, "Starting yt-dlp");

        let child = Command::new(&self.settings.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.settings.program.display().to_string(),
                source,
            })?;
        let mut child = ChildGuard(child);

        let (tx, rx) = mpsc::channel();
        let readers = [
            child.0.stdout.take().map(|out| forward_lines(out, tx.clone())),
            child.0.stderr.take().map(|err| forward_lines(err, tx.clone())),
        ];
        drop(tx);

        let mut report = EngineReport::default();
        let mut last_error = None;
        let mut last_message = None;

        for line in rx {
            let line = line?;

            match parse_line(&line) {
                EngineLine::Progress(progress) => on_progress(progress),
                EngineLine::Title(title) => report.title = Some(title),
                EngineLine::FilePath(path) => report.filepath = Some(path),
                EngineLine::Error(message) => {
                    debug!(%message, "yt-dlp reported an error");
                    last_error = Some(message);
                }
                EngineLine::Message(message) => {
                    debug!(%message, "yt-dlp output");
                    last_message = Some(message);
                }
                EngineLine::Malformed(line) => warn!(%line, "Dropping unparsable progress line"),
                EngineLine::Blank => {}
            }
        }

        let status = child.0.wait()?;
        for reader in readers.into_iter().flatten() {
            let _ = reader.join();
        }

        if !status.success() {
            let message = last_error
                .or(last_message)
                .unwrap_or_else(|| format!("yt-dlp exited with {}", status));
            return Err(EngineError::Failed(message));
        }

        Ok(report)
    }
}

/// Command line for one download.
fn build_args(config: &EngineConfig, settings: &EngineSettings) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "--newline",
        "--no-playlist",
        "--no-colors",
        "--progress",
        "--progress-template",
        "download:[progress] %(progress)j",
        "--print",
        "after_move:[title] %(title)s",
        "--print",
        "after_move:[filepath] %(filepath)s",
        "-f",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    args.push(config.format.clone().into());
    args.push("-o".into());
    args.push(config.output_template.clone().into_os_string());

    for postprocessor in &config.postprocessors {
        match postprocessor {
            Postprocessor::ExtractAudio { codec, quality } => {
                args.push("-x".into());
                args.push("--audio-format".into());
                args.push(codec.codec().into());
                args.push("--audio-quality".into());
                args.push(format!("{}K", quality).into());
            }
            Postprocessor::RemuxVideo { container } => {
                args.push("--remux-video".into());
                args.push(container.into());
            }
        }
    }

    for replacement in &config.metadata_replacements {
        args.push("--replace-in-metadata".into());
        args.push(replacement.field.clone().into());
        args.push(replacement.pattern.clone().into());
        args.push(replacement.replacement.clone().into());
    }

    if let Some(ffmpeg) = &settings.ffmpeg_location {
        args.push("--ffmpeg-location".into());
        args.push(ffmpeg.clone().into_os_string());
    }

    args.push("--".into());
    args.push(config.url.clone().into());
    args
}

fn forward_lines<R>(reader: R, tx: mpsc::Sender<std::io::Result<String>>) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        for chunk in BufReader::new(reader).split(b'\n') {
            let line = chunk.map(|bytes| {
                String::from_utf8_lossy(&bytes)
                    .trim_end_matches('\r')
                    .to_string()
            });
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    })
}

fn strip_ansi(line: &str) -> Cow<'_, str> {
    match ANSI_ESCAPE.as_ref() {
        Some(re) => re.replace_all(line, ""),
        None => Cow::Borrowed(line),
    }
}

fn parse_line(line: &str) -> EngineLine {
    let line = strip_ansi(line);
    let line = line.trim();

    if line.is_empty() {
        return EngineLine::Blank;
    }
    if let Some(json) = line.strip_prefix(PROGRESS_MARKER) {
        return match serde_json::from_str::<RawProgress>(json) {
            Ok(progress) => EngineLine::Progress(progress),
            Err(_) => EngineLine::Malformed(line.to_string()),
        };
    }
    if let Some(title) = line.strip_prefix(TITLE_MARKER) {
        return EngineLine::Title(title.trim().to_string());
    }
    if let Some(path) = line.strip_prefix(FILEPATH_MARKER) {
        return EngineLine::FilePath(PathBuf::from(path));
    }
    if let Some(message) = line.strip_prefix("ERROR:") {
        return EngineLine::Error(message.trim().to_string());
    }
    EngineLine::Message(line.to_string())
}
