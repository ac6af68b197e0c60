pub mod orchestrator;
pub mod placement;
pub mod transfer;

pub use orchestrator::DownloadOrchestrator;
