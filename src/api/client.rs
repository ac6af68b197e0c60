use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::models::{ApiConfig, ResolveRequest, ResolveResponse};
use crate::domain::{DownloadError, ResolvedMedia};

const RESOLVE_PATH: &str = "api/get-audio-url";
const DEFAULT_REJECTION: &str = "Failed to process video";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Invalid backend URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Audio URL not found")]
    NoDownloadUrl,
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<ApiError> for DownloadError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::RequestError(e) => DownloadError::BackendUnreachable(e.to_string()),
            ApiError::InvalidBaseUrl(e) => DownloadError::BackendUnreachable(e.to_string()),
            ApiError::ApiError(message) => DownloadError::ResolutionRejected(message),
            ApiError::InvalidResponse(message) => DownloadError::MalformedResponse(message),
            ApiError::NoDownloadUrl => {
                DownloadError::MalformedResponse("audioUrl missing from response".to_string())
            }
        }
    }
}

/// Client for the resolution service that turns a video URL into a direct
/// audio stream URL plus a display title.
#[derive(Clone)]
pub struct ResolutionClient {
    config: ApiConfig,
    http: Client,
}

impl ResolutionClient {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn endpoint(&self) -> Result<Url> {
        let mut base = self.config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Url::parse(&base)?.join(RESOLVE_PATH)?)
    }

    /// Ask the backend for the audio stream behind `source_url`.
    ///
    /// A single attempt is made. Transport failures come back as
    /// [`ApiError::RequestError`], a refusal by the service as
    /// [`ApiError::ApiError`], and anything that does not decode as
    /// [`ApiError::InvalidResponse`] or [`ApiError::NoDownloadUrl`].
    pub async fn resolve(&self, source_url: &str) -> Result<ResolvedMedia> {
        let endpoint = self.endpoint()?;
        debug!(%endpoint, "requesting audio url");

        let response = self
            .http
            .post(endpoint)
            .json(&ResolveRequest { url: source_url })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        let parsed = serde_json::from_slice::<ResolveResponse>(&body);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|json| json.error)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| format!("backend returned status {}", status.as_u16()));
            return Err(ApiError::ApiError(message));
        }

        let json =
            parsed.map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))?;

        if !json.success {
            let message = json
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_REJECTION.to_string());
            return Err(ApiError::ApiError(message));
        }

        let stream_url = json
            .audio_url
            .filter(|u| !u.is_empty())
            .ok_or(ApiError::NoDownloadUrl)?;

        Ok(ResolvedMedia {
            stream_url,
            title: json.title.unwrap_or_default(),
        })
    }
}
