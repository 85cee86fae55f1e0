//! Story Endpoint REST Client
//!
//! HTTP client for the hosted story functions.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::dto::*;
use super::envelope;
use super::error::{RemoteError, RemoteResult};
use super::RemoteService;
use crate::config::{EndpointConfig, HttpConfig};
use crate::story::{Language, StoryEntry};

/// REST client for the hosted story functions
pub struct HttpRemote {
    client: Client,
    endpoints: EndpointConfig,
}

impl HttpRemote {
    /// Create a client for the given endpoints
    pub fn new(endpoints: EndpointConfig, http: &HttpConfig) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(http.request_timeout_ms))
            .user_agent(http.user_agent.clone())
            .build()?;

        Ok(Self { client, endpoints })
    }

    /// Send a request and decode the (possibly wrapped) JSON payload
    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let response = request.send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failure_from_body(status.as_u16(), text));
        }

        let value: Value = response.json().await.map_err(|e| {
            if e.is_decode() {
                RemoteError::Decode(e.to_string())
            } else {
                classify(e)
            }
        })?;
        envelope::decode(value)
    }
}

/// Map a send/receive failure to the error kinds sessions tell apart
fn classify(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else if e.is_connect() {
        RemoteError::Unavailable
    } else {
        RemoteError::Transport(e)
    }
}

/// Turn a non-2xx body into an error, preferring the wrapped `error` text
fn failure_from_body(status: u16, text: String) -> RemoteError {
    let message = match serde_json::from_str::<Value>(&text) {
        Ok(value) => envelope::unwrap_envelope(value)
            .map(|payload| envelope::error_message(&payload))
            .unwrap_or_else(|inner| inner.detail()),
        Err(_) => text,
    };

    if status == 404 {
        RemoteError::NotFound(message)
    } else {
        RemoteError::Api { status, message }
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    fn name(&self) -> &str {
        "http"
    }

    async fn list(&self) -> RemoteResult<Vec<StoryEntry>> {
        tracing::debug!(endpoint = %self.endpoints.list, "Listing stories");
        let response: ListResponse = self.call(self.client.get(&self.endpoints.list)).await?;
        Ok(response.stories)
    }

    async fn load(&self, filename: &str) -> RemoteResult<String> {
        tracing::debug!(endpoint = %self.endpoints.load, filename, "Loading");
        let body = FilenameRequest {
            filename: filename.to_string(),
        };
        let response: LoadResponse = self
            .call(self.client.post(&self.endpoints.load).json(&body))
            .await?;
        Ok(response.content)
    }

    async fn save(&self, name: &str, content: &str) -> RemoteResult<String> {
        tracing::debug!(endpoint = %self.endpoints.save, name, bytes = content.len(), "Saving");
        let body = SaveRequest {
            story: content.to_string(),
            name: name.to_string(),
            is_canvas: false,
        };
        let response: SaveResponse = self
            .call(self.client.post(&self.endpoints.save).json(&body))
            .await?;
        response
            .stored_filename()
            .ok_or_else(|| RemoteError::Decode("save response has no filename".to_string()))
    }

    async fn delete(&self, filename: &str) -> RemoteResult<()> {
        tracing::debug!(endpoint = %self.endpoints.delete, filename, "Deleting");
        let body = FilenameRequest {
            filename: filename.to_string(),
        };
        let _: Value = self
            .call(self.client.delete(&self.endpoints.delete).json(&body))
            .await?;
        Ok(())
    }

    async fn save_canvas(&self, name: &str, png_base64: &str) -> RemoteResult<String> {
        tracing::debug!(endpoint = %self.endpoints.save, name, "Saving canvas");
        let body = SaveRequest {
            story: png_base64.to_string(),
            name: name.to_string(),
            is_canvas: true,
        };
        let response: SaveResponse = self
            .call(self.client.post(&self.endpoints.save).json(&body))
            .await?;
        response
            .stored_filename()
            .ok_or_else(|| RemoteError::Decode("save response has no filename".to_string()))
    }

    async fn load_canvas(&self, filename: &str) -> RemoteResult<Option<String>> {
        tracing::debug!(endpoint = %self.endpoints.canvas, filename, "Loading canvas");
        let body = FilenameRequest {
            filename: filename.to_string(),
        };
        let response: CanvasResponse = self
            .call(self.client.post(&self.endpoints.canvas).json(&body))
            .await?;
        Ok(response.image_data.filter(|data| !data.is_empty()))
    }

    async fn suggestions(&self, text: &str, language: Language) -> RemoteResult<Option<String>> {
        tracing::debug!(endpoint = %self.endpoints.suggestions, %language, "Requesting suggestions");
        let body = SuggestionRequest {
            text: text.to_string(),
            language: language.tag().to_string(),
        };
        let response: SuggestionResponse = self
            .call(self.client.post(&self.endpoints.suggestions).json(&body))
            .await?;
        Ok(response.suggestions.filter(|s| !s.is_empty()))
    }

    async fn generate_image(&self, text: &str) -> RemoteResult<Option<String>> {
        tracing::debug!(endpoint = %self.endpoints.image, "Requesting illustration");
        let body = ImageRequest {
            text: text.to_string(),
        };
        let response: ImageResponse = self
            .call(self.client.post(&self.endpoints.image).json(&body))
            .await?;
        Ok(response.image_url.filter(|url| !url.is_empty()))
    }
}
