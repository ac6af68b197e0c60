use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// Output of the resolution service for one source URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub stream_url: String,
    pub title: String,
}

/// Snapshot of a running transfer. `total_bytes` is 0 when the host did not
/// announce a length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_written: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    /// Progress in percent (0.0 to 100.0). Unknown totals report 0.
    pub fn percent(&self) -> f32 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.bytes_written as f32 / self.total_bytes as f32 * 100.0).min(100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    pub bytes_written: u64,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementOutcome {
    pub final_path: PathBuf,
    pub is_public: bool,
}

/// A finished download. Only ever created after a successful transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRecord {
    pub title: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalFiles {
    pub public_files: Vec<FileInfo>,
    pub private_files: Vec<FileInfo>,
}

impl LocalFiles {
    pub fn total(&self) -> usize {
        self.public_files.len() + self.private_files.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Resolving,
    Transferring,
    Placing,
    Completed,
    Failed,
}

impl DownloadPhase {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            DownloadPhase::Resolving | DownloadPhase::Transferring | DownloadPhase::Placing
        )
    }
}
