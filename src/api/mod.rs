pub mod client;
pub mod models;

pub use client::ResolutionClient;
pub use models::ApiConfig;
