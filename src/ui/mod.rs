pub mod dialogs;

use iced::{
    widget::{button, column, progress_bar, radio, row, text, text_input, Space},
    Element, Length,
};

use crate::domain::{AudioFormat, MediaKind};
use crate::utils::default_output_dir;

/// Main view state
pub struct DownloadView {
    pub youtube_url: String,
    pub media_kind: MediaKind,
    pub audio_format: AudioFormat,
    pub destination: String,
    pub status_message: String,
    /// Bar value, 0 to 100.
    pub download_progress: f32,
    pub is_downloading: bool,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            youtube_url: String::new(),
            media_kind: MediaKind::default(),
            audio_format: AudioFormat::default(),
            destination: default_output_dir().display().to_string(),
            status_message: "Ready".to_string(),
            download_progress: 0.0,
            is_downloading: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    MediaKindSelected(MediaKind),
    AudioFormatSelected(AudioFormat),
    DestinationChanged(String),
    BrowsePressed,
    DownloadPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.youtube_url = url;
            }
            DownloadMessage::MediaKindSelected(kind) => {
                self.media_kind = kind;
            }
            DownloadMessage::AudioFormatSelected(format) => {
                self.audio_format = format;
            }
            DownloadMessage::DestinationChanged(destination) => {
                self.destination = destination;
            }
            DownloadMessage::BrowsePressed | DownloadMessage::DownloadPressed => {
                // Will be handled by the app
            }
        }
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let idle = !self.is_downloading;

        let media_kind = row![
            radio(
                "Video (MP4)",
                MediaKind::Video,
                Some(self.media_kind),
                DownloadMessage::MediaKindSelected
            ),
            radio(
                "Audio",
                MediaKind::Audio,
                Some(self.media_kind),
                DownloadMessage::MediaKindSelected
            ),
        ]
        .spacing(20);

        let mut content = column![
            text("Tube Grabber").size(32),
            Space::new().height(Length::Fixed(10.0)),
            text("Video URL:").size(16),
            text_input("https://www.youtube.com/watch?v=...", &self.youtube_url)
                .on_input(DownloadMessage::UrlChanged)
                .padding(10),
            text("Download type").size(16),
            media_kind,
        ]
        .padding(20)
        .spacing(10);

        if self.media_kind == MediaKind::Audio {
            content = content.push(text("Audio format").size(16)).push(
                row![
                    radio(
                        "WAV",
                        AudioFormat::Wav,
                        Some(self.audio_format),
                        DownloadMessage::AudioFormatSelected
                    ),
                    radio(
                        "MP3",
                        AudioFormat::Mp3,
                        Some(self.audio_format),
                        DownloadMessage::AudioFormatSelected
                    ),
                ]
                .spacing(20),
            );
        }

        content
            .push(text("Save to:").size(16))
            .push(
                row![
                    text_input("Destination folder", &self.destination)
                        .on_input(DownloadMessage::DestinationChanged)
                        .padding(10)
                        .width(Length::Fill),
                    button("Browse")
                        .on_press_maybe(idle.then_some(DownloadMessage::BrowsePressed))
                        .padding([10, 20]),
                ]
                .spacing(10),
            )
            .push(Space::new().height(Length::Fixed(10.0)))
            .push(progress_bar(0.0..=100.0, self.download_progress))
            .push(text(&self.status_message).size(14))
            .push(
                button("Download")
                    .on_press_maybe(idle.then_some(DownloadMessage::DownloadPressed))
                    .padding([10, 20]),
            )
            .into()
    }
}
