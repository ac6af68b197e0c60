use std::path::{Path, PathBuf};

use futures::{stream::BoxStream, StreamExt};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::domain::{DownloadError, TransferOutcome, TransferProgress};

/// Receives progress while a transfer runs.
///
/// Called inline from the transfer loop, so implementations must return
/// immediately (push into a channel, store an atomic, ...).
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, progress: TransferProgress);
}

impl<F> ProgressObserver for F
where
    F: Fn(TransferProgress) + Send + Sync,
{
    fn on_progress(&self, progress: TransferProgress) {
        self(progress)
    }
}

/// Observer that discards every event
pub struct IgnoreProgress;

impl ProgressObserver for IgnoreProgress {
    fn on_progress(&self, _progress: TransferProgress) {}
}

#[derive(Debug)]
pub enum TransferEvent {
    Progress(TransferProgress),
    Completed(TransferOutcome),
    Failed(DownloadError),
}

/// Streams a remote resource into a local file.
#[derive(Clone)]
pub struct TransferEngine {
    http: Client,
    progress_every: usize,
}

impl TransferEngine {
    /// `progress_every` is the number of received chunks between two progress
    /// events; 0 is treated as 1.
    pub fn new(progress_every: usize) -> Self {
        Self {
            http: Client::new(),
            progress_every: progress_every.max(1),
        }
    }

    /// Download `url` into `destination`, reporting progress to `observer`.
    ///
    /// Only a 2xx response is written to disk. A failure after the file was
    /// created removes the partial file.
    pub async fn transfer(
        &self,
        url: &str,
        destination: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<TransferOutcome, DownloadError> {
        let mut events = self.transfer_stream(url.to_string(), destination.to_path_buf());

        while let Some(event) = events.next().await {
            match event {
                TransferEvent::Progress(progress) => observer.on_progress(progress),
                TransferEvent::Completed(outcome) => return Ok(outcome),
                TransferEvent::Failed(err) => return Err(err),
            }
        }

        Err(DownloadError::NetworkInterrupted(
            "transfer ended without a result".to_string(),
        ))
    }

    /// Event stream behind [`TransferEngine::transfer`]. Ends right after the
    /// first `Completed` or `Failed` event.
    pub fn transfer_stream(&self, url: String, path: PathBuf) -> BoxStream<'static, TransferEvent> {
        let every = self.progress_every;

        futures::stream::unfold(
            TransferState::Start {
                http: self.http.clone(),
                url,
                path,
            },
            move |state| async move {
                match state {
                    TransferState::Start { http, url, path } => {
                        let response = match http.get(&url).send().await {
                            Ok(response) => response,
                            Err(e) => {
                                return Some((
                                    TransferEvent::Failed(DownloadError::NetworkInterrupted(
                                        e.to_string(),
                                    )),
                                    TransferState::Finished,
                                ));
                            }
                        };

                        let status = response.status();
                        if !status.is_success() {
                            return Some((
                                TransferEvent::Failed(DownloadError::TransferFailed {
                                    status: status.as_u16(),
                                }),
                                TransferState::Finished,
                            ));
                        }

                        let (file, partial) = match create_file(path).await {
                            Ok(file) => file,
                            Err(e) => {
                                return Some((
                                    TransferEvent::Failed(DownloadError::DiskWriteError(format!(
                                        "Failed to create file: {}",
                                        e
                                    ))),
                                    TransferState::Finished,
                                ));
                            }
                        };

                        let total = response.content_length().unwrap_or(0);
                        debug!(path = %partial.path.display(), total, "transfer started");

                        Some((
                            TransferEvent::Progress(TransferProgress {
                                bytes_written: 0,
                                total_bytes: total,
                            }),
                            TransferState::Downloading {
                                file,
                                stream: response.bytes_stream().boxed(),
                                written: 0,
                                total,
                                chunks: 0,
                                status: status.as_u16(),
                                partial,
                            },
                        ))
                    }
                    TransferState::Downloading {
                        mut file,
                        mut stream,
                        mut written,
                        total,
                        mut chunks,
                        status,
                        partial,
                    } => loop {
                        match stream.next().await {
                            Some(Ok(chunk)) => {
                                if let Err(e) = file.write_all(&chunk).await {
                                    drop(file);
                                    drop(partial);
                                    return Some((
                                        TransferEvent::Failed(DownloadError::DiskWriteError(
                                            format!("Write error: {}", e),
                                        )),
                                        TransferState::Finished,
                                    ));
                                }

                                written += chunk.len() as u64;
                                chunks += 1;

                                if chunks % every == 0 {
                                    return Some((
                                        TransferEvent::Progress(TransferProgress {
                                            bytes_written: written,
                                            total_bytes: total,
                                        }),
                                        TransferState::Downloading {
                                            file,
                                            stream,
                                            written,
                                            total,
                                            chunks,
                                            status,
                                            partial,
                                        },
                                    ));
                                }
                            }
                            Some(Err(e)) => {
                                drop(file);
                                drop(partial);
                                return Some((
                                    TransferEvent::Failed(DownloadError::NetworkInterrupted(
                                        e.to_string(),
                                    )),
                                    TransferState::Finished,
                                ));
                            }
                            None => {
                                let synced = match file.flush().await {
                                    Ok(()) => file.sync_all().await,
                                    Err(e) => Err(e),
                                };
                                if let Err(e) = synced {
                                    drop(file);
                                    drop(partial);
                                    return Some((
                                        TransferEvent::Failed(DownloadError::DiskWriteError(
                                            format!("Failed to sync file: {}", e),
                                        )),
                                        TransferState::Finished,
                                    ));
                                }

                                drop(file);
                                let path = partial.keep();
                                debug!(path = %path.display(), written, "transfer finished");
                                return Some((
                                    TransferEvent::Completed(TransferOutcome {
                                        bytes_written: written,
                                        status,
                                    }),
                                    TransferState::Finished,
                                ));
                            }
                        }
                    },
                    TransferState::Finished => None,
                }
            },
        )
        .boxed()
    }
}

enum TransferState {
    Start {
        http: Client,
        url: String,
        path: PathBuf,
    },
    Downloading {
        file: tokio::fs::File,
        stream: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
        written: u64,
        total: u64,
        chunks: usize,
        status: u16,
        partial: PartialFile,
    },
    Finished,
}

/// A file this transfer created and has not finished yet. Removed on drop
/// unless [`PartialFile::keep`] was called, so failures and a dropped stream
/// both leave nothing behind.
struct PartialFile {
    path: PathBuf,
    kept: bool,
}

impl PartialFile {
    fn keep(mut self) -> PathBuf {
        self.kept = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partial file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not remove partial file")
            }
        }
    }
}

async fn create_file(path: PathBuf) -> std::io::Result<(tokio::fs::File, PartialFile)> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file = tokio::fs::File::create(&path).await?;
    Ok((file, PartialFile { path, kept: false }))
}
