use serde::{Deserialize, Serialize};

/// Body sent to /api/get-audio-url
#[derive(Debug, Clone, Serialize)]
pub struct ResolveRequest<'a> {
    pub url: &'a str,
}

/// Response from /api/get-audio-url
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub success: bool,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Configuration for the resolution client
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
        }
    }
}
