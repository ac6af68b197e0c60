use iced::{
    widget::{button, column, row, text, text_input, Column, Space},
    Element, Length,
};

use crate::{
    domain::{DownloadError, DownloadRecord, LocalFiles, TransferProgress},
    utils::format_bytes,
};

/// Main view state
pub struct DownloadView {
    pub source_url: String,
    pub status_message: String,
    pub is_downloading: bool,
    pub progress: TransferProgress,
    pub records: Vec<DownloadRecord>,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            source_url: String::new(),
            status_message: "Paste a YouTube URL to download".to_string(),
            is_downloading: false,
            progress: TransferProgress::default(),
            records: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    UrlChanged(String),
    DownloadPressed,
    ShowFilesPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::UrlChanged(url) => {
                self.source_url = url;
            }
            DownloadMessage::DownloadPressed | DownloadMessage::ShowFilesPressed => {
                // Will be handled by the app
            }
        }
    }

    /// Line shown under the button while a download runs
    pub fn progress_line(&self) -> String {
        let percent = self.progress.percent();
        if percent > 0.0 {
            format!("Downloading: {}%", percent.round())
        } else {
            "Processing...".to_string()
        }
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let download_label = if self.is_downloading {
            "Downloading..."
        } else {
            "Download MP3"
        };

        let mut content = column![
            text("YouTube to MP3").size(32),
            text("Download YouTube videos as MP3 files").size(14),
            Space::new().height(Length::Fixed(20.0)),
            text_input("Paste YouTube URL here...", &self.source_url)
                .on_input(DownloadMessage::UrlChanged)
                .padding(10),
            Space::new().height(Length::Fixed(10.0)),
            button(download_label)
                .on_press_maybe((!self.is_downloading).then_some(DownloadMessage::DownloadPressed))
                .padding([10, 20]),
        ]
        .padding(20)
        .spacing(10);

        if self.is_downloading {
            content = content.push(text(self.progress_line()).size(14));
        }

        content = content.push(text(&self.status_message).size(14));

        let mut header = row![text("Recent Downloads").size(20)].spacing(20);
        if !self.records.is_empty() {
            header = header.push(button("Show Files").on_press(DownloadMessage::ShowFilesPressed));
        }
        content = content.push(Space::new().height(Length::Fixed(20.0))).push(header);

        if self.records.is_empty() {
            content = content.push(text("No downloads yet").size(14));
        } else {
            let list = self.records.iter().fold(Column::new().spacing(8), |list, record| {
                list.push(
                    column![
                        text(&record.title).size(16),
                        text(record_summary(record)).size(12),
                    ]
                    .spacing(2),
                )
            });
            content = content.push(list);
        }

        content.into()
    }
}

pub fn record_summary(record: &DownloadRecord) -> String {
    let location = if record.is_public {
        "In Downloads folder"
    } else {
        "In app storage"
    };
    format!("Size: {} • {}", format_bytes(record.size_bytes), location)
}

/// Dialog title and body for a finished download
pub fn success_notice(record: &DownloadRecord, extension: &str) -> (&'static str, String) {
    let location = if record.is_public {
        "Saved to Downloads folder"
    } else {
        "Saved to app storage (permission denied for Downloads)"
    };
    (
        "Success",
        format!("Downloaded: {}.{}\n\n{}", record.title, extension, location),
    )
}

/// Dialog title and body explaining a failed download to the user
pub fn failure_guidance(error: &DownloadError, backend_url: &str) -> (&'static str, String) {
    match error {
        DownloadError::BackendUnreachable(_) => (
            "Connection Error",
            format!(
                "Cannot connect to backend server.\n\nMake sure the backend is running at {}",
                backend_url
            ),
        ),
        DownloadError::ResolutionRejected(message) => (
            "Error",
            format!(
                "{}\n\nThe video might be private or restricted.",
                message
            ),
        ),
        DownloadError::InvalidInput => ("Error", "Please enter a YouTube URL".to_string()),
        other => ("Error", other.to_string()),
    }
}

/// Body of the "Show Files" dialog
pub fn describe_local_files(files: &LocalFiles, extension: &str) -> String {
    let mut sections = Vec::new();

    if !files.public_files.is_empty() {
        sections.push(file_section("In Downloads folder:", &files.public_files));
    }
    if !files.private_files.is_empty() {
        sections.push(file_section("In app storage:", &files.private_files));
    }

    format!(
        "Found {} {} files:\n\n{}",
        files.total(),
        extension.to_uppercase(),
        sections.join("\n\n")
    )
}

fn file_section(heading: &str, files: &[crate::domain::FileInfo]) -> String {
    let lines: Vec<String> = files
        .iter()
        .map(|file| format!("• {} ({})", file.name, format_bytes(file.size_bytes)))
        .collect();
    format!("{}\n{}", heading, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileInfo;
    use chrono::Utc;
    use std::path::PathBuf;

    fn record(is_public: bool) -> DownloadRecord {
        DownloadRecord {
            title: "Song".to_string(),
            path: PathBuf::from("/tmp/Song.mp3"),
            created_at: Utc::now(),
            size_bytes: 1536,
            is_public,
        }
    }

    #[test]
    fn test_progress_line() {
        let mut view = DownloadView::default();
        assert_eq!(view.progress_line(), "Processing...");

        view.progress = TransferProgress {
            bytes_written: 1,
            total_bytes: 3,
        };
        assert_eq!(view.progress_line(), "Downloading: 33%");
    }

    #[test]
    fn test_record_summary() {
        assert_eq!(record_summary(&record(true)), "Size: 1.5 KB • In Downloads folder");
        assert_eq!(record_summary(&record(false)), "Size: 1.5 KB • In app storage");
    }

    #[test]
    fn test_success_notice_mentions_location() {
        let (_, body) = success_notice(&record(false), "mp3");
        assert!(body.starts_with("Downloaded: Song.mp3"));
        assert!(body.contains("app storage"));
    }

    #[test]
    fn test_failure_guidance_by_kind() {
        let (title, body) = failure_guidance(
            &DownloadError::BackendUnreachable("connection refused".to_string()),
            "http://localhost:3000",
        );
        assert_eq!(title, "Connection Error");
        assert!(body.contains("http://localhost:3000"));

        let (_, body) = failure_guidance(
            &DownloadError::ResolutionRejected("private video".to_string()),
            "",
        );
        assert!(body.starts_with("private video"));
        assert!(body.contains("restricted"));

        let (title, body) = failure_guidance(&DownloadError::TransferFailed { status: 403 }, "");
        assert_eq!(title, "Error");
        assert_eq!(body, "Download failed with status: 403");
    }

    #[test]
    fn test_describe_local_files() {
        let files = LocalFiles {
            public_files: vec![FileInfo {
                name: "a.mp3".to_string(),
                path: PathBuf::from("/dl/a.mp3"),
                size_bytes: 2048,
            }],
            private_files: vec![FileInfo {
                name: "b.mp3".to_string(),
                path: PathBuf::from("/app/b.mp3"),
                size_bytes: 10,
            }],
        };

        assert_eq!(
            describe_local_files(&files, "mp3"),
            "Found 2 MP3 files:\n\nIn Downloads folder:\n• a.mp3 (2 KB)\n\nIn app storage:\n• b.mp3 (10 Bytes)"
        );
    }
}
