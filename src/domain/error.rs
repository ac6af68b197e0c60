use thiserror::Error;

/// Discriminant of [`DownloadError`], for callers that branch on the failure
/// class without matching on payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Busy,
    BackendUnreachable,
    ResolutionRejected,
    MalformedResponse,
    TransferFailed,
    NetworkInterrupted,
    DiskWriteError,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Source URL is empty")]
    InvalidInput,

    #[error("Another download is already in progress")]
    Busy,

    #[error("Cannot reach backend: {0}")]
    BackendUnreachable(String),

    #[error("{0}")]
    ResolutionRejected(String),

    #[error("Invalid response from backend: {0}")]
    MalformedResponse(String),

    #[error("Download failed with status: {status}")]
    TransferFailed { status: u16 },

    #[error("Network interrupted: {0}")]
    NetworkInterrupted(String),

    #[error("Disk write error: {0}")]
    DiskWriteError(String),
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::InvalidInput => ErrorKind::InvalidInput,
            DownloadError::Busy => ErrorKind::Busy,
            DownloadError::BackendUnreachable(_) => ErrorKind::BackendUnreachable,
            DownloadError::ResolutionRejected(_) => ErrorKind::ResolutionRejected,
            DownloadError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            DownloadError::TransferFailed { .. } => ErrorKind::TransferFailed,
            DownloadError::NetworkInterrupted(_) => ErrorKind::NetworkInterrupted,
            DownloadError::DiskWriteError(_) => ErrorKind::DiskWriteError,
        }
    }
}
