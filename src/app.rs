use std::sync::Arc;

use futures::{
    future::BoxFuture,
    stream::{BoxStream, StreamExt},
    FutureExt,
};
use iced::Task;
use tokio::sync::watch;
use tracing::info;

use crate::application::DownloadOrchestrator;
use crate::config::DownloaderConfig;
use crate::domain::{DownloadError, DownloadRecord, LocalFiles, TransferProgress};
use crate::ui::{self, DownloadMessage, DownloadView};

pub struct DownloadApp {
    view: DownloadView,
    orchestrator: Arc<DownloadOrchestrator>,
    // Latest progress published by the orchestrator's observer
    progress_rx: watch::Receiver<TransferProgress>,
}

impl Default for DownloadApp {
    fn default() -> Self {
        Self::new(DownloaderConfig::from_env())
    }
}

impl DownloadApp {
    pub fn new(config: DownloaderConfig) -> Self {
        info!(
            backend = %config.api.base_url,
            private_dir = %config.private_dir.display(),
            public_dir = %config.public_dir.display(),
            "starting"
        );

        let (progress_tx, progress_rx) = watch::channel(TransferProgress::default());
        let orchestrator = DownloadOrchestrator::new(config)
            .with_progress_observer(move |progress: TransferProgress| {
                progress_tx.send_replace(progress);
            });

        Self {
            view: DownloadView::default(),
            orchestrator: Arc::new(orchestrator),
            progress_rx,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    UiMessage(DownloadMessage),
    Progress(TransferProgress),
    DownloadFinished(Result<DownloadRecord, DownloadError>),
    FilesListed(Result<LocalFiles, String>),
    DialogClosed,
}

/// Internal state for the download event stream
enum RunState {
    Running {
        run: BoxFuture<'static, Result<DownloadRecord, DownloadError>>,
        progress: watch::Receiver<TransferProgress>,
    },
    Finished,
}

enum Step {
    Done(Result<DownloadRecord, DownloadError>),
    Progressed,
    ObserverGone,
}

/// Drive one orchestrator run, yielding progress updates until it finishes.
fn download_events(
    orchestrator: Arc<DownloadOrchestrator>,
    mut progress: watch::Receiver<TransferProgress>,
    source_url: String,
) -> BoxStream<'static, Message> {
    // Values from an earlier run are stale
    let _ = progress.borrow_and_update();
    let run = async move { orchestrator.start(&source_url).await }.boxed();

    futures::stream::unfold(RunState::Running { run, progress }, |state| async move {
        match state {
            RunState::Running {
                mut run,
                mut progress,
            } => {
                let step = tokio::select! {
                    biased;
                    result = &mut run => Step::Done(result),
                    changed = progress.changed() => match changed {
                        Ok(()) => Step::Progressed,
                        Err(_) => Step::ObserverGone,
                    },
                };

                match step {
                    Step::Done(result) => {
                        Some((Message::DownloadFinished(result), RunState::Finished))
                    }
                    Step::Progressed => {
                        let latest = *progress.borrow_and_update();
                        Some((Message::Progress(latest), RunState::Running { run, progress }))
                    }
                    Step::ObserverGone => {
                        let result = run.await;
                        Some((Message::DownloadFinished(result), RunState::Finished))
                    }
                }
            }
            RunState::Finished => None,
        }
    })
    .boxed()
}

async fn show_dialog(title: &'static str, description: String) {
    let _ = rfd::AsyncMessageDialog::new()
        .set_level(rfd::MessageLevel::Info)
        .set_title(title)
        .set_description(description)
        .set_buttons(rfd::MessageButtons::Ok)
        .show()
        .await;
}

fn dialog_task(title: &'static str, description: String) -> Task<Message> {
    Task::perform(show_dialog(title, description), |_| Message::DialogClosed)
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::UiMessage(ui_msg) => {
            app.view.update(ui_msg.clone());

            match ui_msg {
                DownloadMessage::DownloadPressed if !app.view.is_downloading => {
                    let source_url = app.view.source_url.trim().to_string();
                    if source_url.is_empty() {
                        let (title, body) =
                            ui::failure_guidance(&DownloadError::InvalidInput, "");
                        return dialog_task(title, body);
                    }

                    app.view.is_downloading = true;
                    app.view.progress = TransferProgress::default();
                    app.view.status_message = String::new();

                    return Task::stream(download_events(
                        app.orchestrator.clone(),
                        app.progress_rx.clone(),
                        source_url,
                    ));
                }
                DownloadMessage::ShowFilesPressed => {
                    let orchestrator = app.orchestrator.clone();
                    return Task::perform(
                        async move {
                            orchestrator
                                .list_local_files()
                                .await
                                .map_err(|e| e.to_string())
                        },
                        Message::FilesListed,
                    );
                }
                _ => {}
            }
        }
        Message::Progress(progress) => {
            app.view.progress = progress;
        }
        Message::DownloadFinished(result) => {
            app.view.is_downloading = false;
            app.view.progress = TransferProgress::default();
            app.view.records = app.orchestrator.list_records();

            let config = app.orchestrator.config();
            let (title, body) = match result {
                Ok(record) => {
                    app.view.source_url.clear();
                    app.view.status_message = format!("Saved: {}", record.path.display());
                    ui::success_notice(&record, &config.file_extension)
                }
                Err(e) => {
                    app.view.status_message = format!("Download failed: {}", e);
                    ui::failure_guidance(&e, &config.api.base_url)
                }
            };
            return dialog_task(title, body);
        }
        Message::FilesListed(result) => {
            let (title, body) = match result {
                Ok(files) if files.total() == 0 => ("No Files", "No MP3 files found".to_string()),
                Ok(files) => (
                    "Downloaded Files",
                    ui::describe_local_files(&files, &app.orchestrator.config().file_extension),
                ),
                Err(e) => {
                    tracing::error!(error = %e, "could not read files");
                    ("Error", "Could not read files".to_string())
                }
            };
            return dialog_task(title, body);
        }
        Message::DialogClosed => {}
    }
    Task::none()
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::UiMessage)
}
