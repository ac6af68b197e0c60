use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::placement::{list_files, StoragePlacement};
use super::transfer::{IgnoreProgress, ProgressObserver, TransferEngine};
use crate::{
    api::ResolutionClient,
    config::DownloaderConfig,
    domain::{DownloadError, DownloadPhase, DownloadRecord, LocalFiles},
    utils::{fallback_title, sanitize_title},
};

/// Turns a source URL into a stored audio file.
///
/// One request runs at a time: `Idle → Resolving → Transferring → Placing →
/// Completed`, or `Failed` from the first two working states. Whatever the
/// outcome, the phase is back to `Idle` once [`start`](Self::start) returns
/// (or its future is dropped).
pub struct DownloadOrchestrator {
    config: DownloaderConfig,
    resolver: ResolutionClient,
    engine: TransferEngine,
    placement: StoragePlacement,
    observer: Arc<dyn ProgressObserver>,
    phase: Mutex<DownloadPhase>,
    registry: RwLock<Vec<DownloadRecord>>,
}

impl DownloadOrchestrator {
    pub fn new(config: DownloaderConfig) -> Self {
        let resolver = ResolutionClient::new(config.api.clone());
        let engine = TransferEngine::new(config.progress_every);
        let placement =
            StoragePlacement::new(config.public_dir.clone(), config.file_extension.clone());

        Self {
            config,
            resolver,
            engine,
            placement,
            observer: Arc::new(IgnoreProgress),
            phase: Mutex::new(DownloadPhase::Idle),
            registry: RwLock::new(Vec::new()),
        }
    }

    /// Register the observer that receives every progress event while a
    /// request is in `Transferring`.
    pub fn with_progress_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    pub fn phase(&self) -> DownloadPhase {
        *lock(&self.phase)
    }

    /// Snapshot of the completed downloads, oldest first.
    pub fn list_records(&self) -> Vec<DownloadRecord> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Managed files currently on disk. An unreadable public directory is
    /// reported as empty; a missing private directory likewise.
    pub async fn list_local_files(&self) -> io::Result<LocalFiles> {
        let extension = &self.config.file_extension;

        let private_files = match list_files(&self.config.private_dir, extension).await {
            Ok(files) => files,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };

        let public_files = list_files(self.placement.public_dir(), extension)
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "could not read public directory");
                Vec::new()
            });

        Ok(LocalFiles {
            public_files,
            private_files,
        })
    }

    /// Run one download to completion.
    ///
    /// Fails with [`DownloadError::InvalidInput`] for a blank URL and with
    /// [`DownloadError::Busy`] while another request is in flight; neither
    /// affects a running request. A record is appended to the registry only
    /// when the transfer succeeded.
    pub async fn start(&self, source_url: &str) -> Result<DownloadRecord, DownloadError> {
        let source_url = source_url.trim();
        if source_url.is_empty() {
            return Err(DownloadError::InvalidInput);
        }

        let run = RunGuard::begin(&self.phase)?;
        let result = self.run(&run, source_url).await;

        match &result {
            Ok(record) => {
                run.advance(DownloadPhase::Completed);
                info!(
                    title = %record.title,
                    path = %record.path.display(),
                    size = record.size_bytes,
                    public = record.is_public,
                    "download completed"
                );
            }
            Err(e) => {
                run.advance(DownloadPhase::Failed);
                warn!(kind = ?e.kind(), error = %e, "download failed");
            }
        }

        result
    }

    async fn run(&self, run: &RunGuard<'_>, source_url: &str) -> Result<DownloadRecord, DownloadError> {
        info!(source_url, "resolving");
        let media = self.resolver.resolve(source_url).await?;

        let title = match sanitize_title(&media.title) {
            title if title.trim().is_empty() => {
                let fallback = fallback_title();
                debug!(raw = %media.title, %fallback, "resolved title is empty after sanitizing");
                fallback
            }
            title => title,
        };
        let private_path = self.config.private_dir.join(self.config.file_name(&title));

        run.advance(DownloadPhase::Transferring);
        let outcome = self
            .engine
            .transfer(&media.stream_url, &private_path, self.observer.as_ref())
            .await?;

        if !(200..300).contains(&outcome.status) {
            return Err(DownloadError::TransferFailed {
                status: outcome.status,
            });
        }

        run.advance(DownloadPhase::Placing);
        let placement = self
            .placement
            .place_in_public_storage(&private_path, &title)
            .await;

        let record = DownloadRecord {
            title,
            path: placement.final_path,
            created_at: Utc::now(),
            size_bytes: outcome.bytes_written,
            is_public: placement.is_public,
        };

        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());

        Ok(record)
    }
}

fn lock(phase: &Mutex<DownloadPhase>) -> MutexGuard<'_, DownloadPhase> {
    phase.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Claims the orchestrator for one request and puts it back to `Idle` on drop.
struct RunGuard<'a> {
    phase: &'a Mutex<DownloadPhase>,
}

impl<'a> RunGuard<'a> {
    fn begin(phase: &'a Mutex<DownloadPhase>) -> Result<Self, DownloadError> {
        let mut current = lock(phase);
        if current.is_in_flight() {
            return Err(DownloadError::Busy);
        }
        *current = DownloadPhase::Resolving;
        Ok(Self { phase })
    }

    fn advance(&self, next: DownloadPhase) {
        let mut current = lock(self.phase);
        debug!(from = ?*current, to = ?next, "phase change");
        *current = next;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *lock(self.phase) = DownloadPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiConfig;
    use crate::domain::{ErrorKind, TransferProgress};
    use mockito::{Mock, ServerGuard};
    use serde_json::json;
    use std::path::Path;
    use std::time::Duration;

    const ONE_MIB: usize = 1024 * 1024;

    fn config_for(server: &ServerGuard, root: &Path) -> DownloaderConfig {
        let public_dir = root.join("public");
        std::fs::create_dir_all(&public_dir).unwrap();
        DownloaderConfig {
            api: ApiConfig {
                base_url: server.url(),
            },
            private_dir: root.join("private"),
            public_dir,
            ..DownloaderConfig::default()
        }
    }

    async fn mock_resolution(server: &mut ServerGuard, title: &str) -> Mock {
        let audio_url = format!("{}/media/audio.mp3", server.url());
        server
            .mock("POST", "/api/get-audio-url")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "success": true, "audioUrl": audio_url, "title": title }).to_string())
            .create_async()
            .await
    }

    async fn mock_media(server: &mut ServerGuard, status: usize, body: Vec<u8>) -> Mock {
        server
            .mock("GET", "/media/audio.mp3")
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_successful_run_records_public_copy() {
        let mut server = mockito::Server::new_async().await;
        let _resolve = mock_resolution(&mut server, "My Video! #1").await;
        let _media = mock_media(&mut server, 200, vec![1u8; 4096]).await;

        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, dir.path());
        let public_path = config.public_dir.join("My Video 1.mp3");
        let private_path = config.private_dir.join("My Video 1.mp3");

        let seen = Arc::new(Mutex::new(Vec::<TransferProgress>::new()));
        let sink = seen.clone();
        let orchestrator = DownloadOrchestrator::new(config)
            .with_progress_observer(move |p: TransferProgress| sink.lock().unwrap().push(p));

        let record = orchestrator.start("https://youtu.be/abc").await.unwrap();

        assert_eq!(record.title, "My Video 1");
        assert_eq!(record.path, public_path);
        assert!(record.is_public);
        assert_eq!(record.size_bytes, 4096);
        assert!(private_path.exists());
        assert!(public_path.exists());

        assert_eq!(orchestrator.list_records(), vec![record]);
        assert_eq!(orchestrator.phase(), DownloadPhase::Idle);
        assert_eq!(seen.lock().unwrap().last().unwrap().bytes_written, 4096);
    }

    #[tokio::test]
    async fn test_denied_public_copy_still_records() {
        let mut server = mockito::Server::new_async().await;
        let _resolve = mock_resolution(&mut server, "Song").await;
        let _media = mock_media(&mut server, 200, vec![0u8; ONE_MIB]).await;

        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let config = DownloaderConfig {
            public_dir: blocker.join("Downloads"),
            ..config_for(&server, dir.path())
        };
        let private_path = config.private_dir.join("Song.mp3");

        let orchestrator = DownloadOrchestrator::new(config);
        let record = orchestrator.start("https://youtu.be/abc").await.unwrap();

        assert_eq!(record.size_bytes, ONE_MIB as u64);
        assert!(!record.is_public);
        assert_eq!(record.path, private_path);
        assert_eq!(orchestrator.list_records().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_resolution_writes_nothing() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/get-audio-url")
            .with_status(200)
            .with_body(json!({ "success": false, "error": "private video" }).to_string())
            .create_async()
            .await;
        let media = server
            .mock("GET", "/media/audio.mp3")
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, dir.path());
        let private_dir = config.private_dir.clone();
        let orchestrator = DownloadOrchestrator::new(config);

        let err = orchestrator.start("https://youtu.be/abc").await.unwrap_err();

        assert_eq!(err, DownloadError::ResolutionRejected("private video".to_string()));
        assert!(orchestrator.list_records().is_empty());
        assert!(!private_dir.exists());
        assert_eq!(orchestrator.phase(), DownloadPhase::Idle);
        media.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_transfer_creates_no_record() {
        let mut server = mockito::Server::new_async().await;
        let _resolve = mock_resolution(&mut server, "Song").await;
        let _media = mock_media(&mut server, 503, b"busy".to_vec()).await;

        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, dir.path());
        let private_path = config.private_dir.join("Song.mp3");
        let orchestrator = DownloadOrchestrator::new(config);

        let err = orchestrator.start("https://youtu.be/abc").await.unwrap_err();

        assert_eq!(err, DownloadError::TransferFailed { status: 503 });
        assert!(orchestrator.list_records().is_empty());
        assert!(!private_path.exists());
        assert_eq!(orchestrator.phase(), DownloadPhase::Idle);
    }

    #[tokio::test]
    async fn test_dropped_connection_leaves_no_record() {
        let mut server = mockito::Server::new_async().await;
        let _resolve = mock_resolution(&mut server, "Song").await;
        let _media = server
            .mock("GET", "/media/audio.mp3")
            .with_status(200)
            .with_chunked_body(|w| {
                w.write_all(&[3u8; 4096])?;
                w.flush()?;
                Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset))
            })
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&server, dir.path());
        let private_path = config.private_dir.join("Song.mp3");
        let public_path = config.public_dir.join("Song.mp3");
        let orchestrator = DownloadOrchestrator::new(config);

        let err = orchestrator.start("https://youtu.be/abc").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NetworkInterrupted);
        assert!(!private_path.exists());
        assert!(!public_path.exists());
        assert!(orchestrator.list_records().is_empty());
        assert_eq!(orchestrator.phase(), DownloadPhase::Idle);
    }

    #[tokio::test]
    async fn test_blank_url_is_invalid_input() {
        let orchestrator = DownloadOrchestrator::new(DownloaderConfig::default());

        assert_eq!(orchestrator.start("").await, Err(DownloadError::InvalidInput));
        assert_eq!(orchestrator.start("   ").await, Err(DownloadError::InvalidInput));
        assert_eq!(orchestrator.phase(), DownloadPhase::Idle);
    }

    #[tokio::test]
    async fn test_second_start_while_transferring_is_busy() {
        let mut server = mockito::Server::new_async().await;
        let _resolve = mock_resolution(&mut server, "Slow Song").await;
        let _mock = server
            .mock("GET", "/media/audio.mp3")
            .with_status(200)
            .with_chunked_body(|w| {
                w.write_all(&[1u8; 1024])?;
                std::thread::sleep(Duration::from_millis(400));
                w.write_all(&[2u8; 1024])
            })
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Arc::new(DownloadOrchestrator::new(config_for(&server, dir.path())));

        let first = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.start("https://youtu.be/slow").await }
        });

        let mut waited = Duration::ZERO;
        while orchestrator.phase() != DownloadPhase::Transferring {
            assert!(waited < Duration::from_secs(5), "never reached Transferring");
            tokio::time::sleep(Duration::from_millis(5)).await;
            waited += Duration::from_millis(5);
        }

        let err = orchestrator.start("https://youtu.be/other").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Busy);

        let record = first.await.unwrap().unwrap();
        assert_eq!(record.title, "Slow Song");
        assert_eq!(record.size_bytes, 2048);
        assert_eq!(orchestrator.list_records().len(), 1);
        assert_eq!(orchestrator.phase(), DownloadPhase::Idle);
    }

    #[tokio::test]
    async fn test_empty_title_gets_fallback_name() {
        let mut server = mockito::Server::new_async().await;
        let _resolve = mock_resolution(&mut server, "!!! ???").await;
        let _media = mock_media(&mut server, 200, vec![1u8; 8]).await;

        let dir = tempfile::tempdir().unwrap();
        let orchestrator = DownloadOrchestrator::new(config_for(&server, dir.path()));
        let record = orchestrator.start("https://youtu.be/abc").await.unwrap();

        assert!(record.title.starts_with("audio "));
        assert_eq!(sanitize_title(&record.title), record.title);
        assert!(record.path.ends_with(format!("{}.mp3", record.title)));
    }

    #[tokio::test]
    async fn test_registry_keeps_insertion_order() {
        let mut server = mockito::Server::new_async().await;
        let first = mock_resolution(&mut server, "First").await;
        let _media = mock_media(&mut server, 200, vec![1u8; 8]).await;

        let dir = tempfile::tempdir().unwrap();
        let orchestrator = DownloadOrchestrator::new(config_for(&server, dir.path()));
        orchestrator.start("https://youtu.be/1").await.unwrap();

        first.remove_async().await;
        let _resolve = mock_resolution(&mut server, "Second").await;
        orchestrator.start("https://youtu.be/2").await.unwrap();

        let titles: Vec<_> = orchestrator
            .list_records()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn test_list_local_files_splits_locations() {
        let dir = tempfile::tempdir().unwrap();
        let private_dir = dir.path().join("private");
        let public_dir = dir.path().join("public");
        std::fs::create_dir_all(&private_dir).unwrap();
        std::fs::create_dir_all(&public_dir).unwrap();
        std::fs::write(private_dir.join("one.mp3"), b"1").unwrap();
        std::fs::write(private_dir.join("cover.jpg"), b"x").unwrap();
        std::fs::write(public_dir.join("two.mp3"), b"22").unwrap();

        let orchestrator = DownloadOrchestrator::new(DownloaderConfig {
            private_dir,
            public_dir,
            ..DownloaderConfig::default()
        });
        let files = orchestrator.list_local_files().await.unwrap();

        assert_eq!(files.total(), 2);
        assert_eq!(files.private_files[0].name, "one.mp3");
        assert_eq!(files.public_files[0].name, "two.mp3");
        assert_eq!(files.public_files[0].size_bytes, 2);
    }

    #[tokio::test]
    async fn test_list_local_files_tolerates_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = DownloadOrchestrator::new(DownloaderConfig {
            private_dir: dir.path().join("never-created"),
            public_dir: dir.path().join("also-missing"),
            ..DownloaderConfig::default()
        });

        let files = orchestrator.list_local_files().await.unwrap();
        assert_eq!(files, LocalFiles::default());
    }
}
