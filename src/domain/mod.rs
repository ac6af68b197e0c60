pub mod error;
pub mod model;

pub use error::{DownloadError, ErrorKind};
pub use model::{
    DownloadPhase, DownloadRecord, FileInfo, LocalFiles, PlacementOutcome, ResolvedMedia,
    TransferOutcome, TransferProgress,
};
