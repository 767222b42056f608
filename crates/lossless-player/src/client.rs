use async_trait::async_trait;
use lossless_models::{ListeningTime, ListeningTimeUpdate};
use serde::Deserialize;
use uuid::Uuid;

use crate::listening::ListeningTimeSink;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("not signed in")]
    Unauthenticated,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Thin HTTP client for the endpoints the player talks to.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stream_url(&self, song_id: Uuid) -> String {
        format!("{}/api/songs/{song_id}/stream", self.base_url)
    }

    /// Absolute form of a server-relative `cover_url`.
    pub fn cover_url(&self, cover_path: &str) -> String {
        format!("{}{cover_path}", self.base_url)
    }

    /// POST /api/users/listening-time, returning the new server total.
    pub async fn add_listening_time(&self, seconds: f64) -> Result<ListeningTime, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::Unauthenticated)?;
        let response = self
            .http
            .post(format!("{}/api/users/listening-time", self.base_url))
            .bearer_auth(token)
            .json(&ListeningTimeUpdate {
                time_in_seconds: seconds,
            })
            .send()
            .await?;
        Self::parse(response).await
    }

    /// GET /api/users/listening-time
    pub async fn listening_time(&self) -> Result<ListeningTime, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::Unauthenticated)?;
        let response = self
            .http
            .get(format!("{}/api/users/listening-time", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);
        tracing::debug!(%status, %message, "API request rejected");
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ListeningTimeSink for ApiClient {
    async fn add_listening_time(&self, seconds: f64) -> Result<ListeningTime, ClientError> {
        ApiClient::add_listening_time(self, seconds).await
    }
}
