use std::env;
use std::path::PathBuf;

use serde::Deserialize;

use crate::api::ApiConfig;

/// Directory name used under the platform data dir for private storage.
pub const APP_DIR_NAME: &str = "mp3-grabber";

/// Extension of the files this app writes and lists.
pub const DEFAULT_EXTENSION: &str = "mp3";

pub const ENV_BACKEND_URL: &str = "MP3_BACKEND_URL";
pub const ENV_PRIVATE_DIR: &str = "MP3_PRIVATE_DIR";
pub const ENV_PUBLIC_DIR: &str = "MP3_PUBLIC_DIR";

/// Top-level configuration for the download orchestrator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    pub api: ApiConfig,
    /// App-scoped directory that receives every transfer.
    pub private_dir: PathBuf,
    /// User-visible directory finished files are copied into.
    pub public_dir: PathBuf,
    pub file_extension: String,
    /// Emit a progress event every N received chunks.
    pub progress_every: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        let private_dir = dirs::data_dir()
            .unwrap_or_else(env::temp_dir)
            .join(APP_DIR_NAME);
        let public_dir = dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
            .unwrap_or_else(|| private_dir.clone());

        Self {
            api: ApiConfig::default(),
            private_dir,
            public_dir,
            file_extension: DEFAULT_EXTENSION.to_string(),
            progress_every: 1,
        }
    }
}

impl DownloaderConfig {
    /// Defaults overlaid with `MP3_BACKEND_URL`, `MP3_PRIVATE_DIR` and
    /// `MP3_PUBLIC_DIR` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var(ENV_BACKEND_URL) {
            config.api.base_url = url;
        }
        if let Some(dir) = env::var_os(ENV_PRIVATE_DIR) {
            config.private_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env::var_os(ENV_PUBLIC_DIR) {
            config.public_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn file_name(&self, title: &str) -> String {
        format!("{}.{}", title, self.file_extension)
    }
}
