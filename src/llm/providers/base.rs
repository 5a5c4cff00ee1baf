//! Base HTTP client shared by cloud generator providers

use crate::error::{body_excerpt, LlmError, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

/// HTTP client with per-call timeout and uniform error mapping
pub struct HttpProviderClient {
    client: Client,
    timeout: Duration,
}

impl HttpProviderClient {
    /// Create a new HTTP provider client
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Execute a POST request with JSON body
    pub async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, String)],
    ) -> Result<R> {
        // Query strings can carry credentials, so they stay out of the log.
        debug!(
            "Making POST request to: {}",
            url.split('?').next().unwrap_or(url)
        );

        let mut request = self.client.post(url).json(body);
        for (key, value) in headers {
            request = request.header(*key, value.as_str());
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| LlmError::Timeout)?
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Execute a GET request
    pub async fn get<R: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> Result<R> {
        debug!(
            "Making GET request to: {}",
            url.split('?').next().unwrap_or(url)
        );

        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(*key, value.as_str());
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| LlmError::Timeout)?
            .map_err(|e| LlmError::ConnectionFailed(e.to_string()))?;

        self.handle_response(response).await
    }

    /// Handle HTTP response and deserialize
    async fn handle_response<R: DeserializeOwned>(&self, response: Response) -> Result<R> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| format!("HTTP {} error", status));

            error!("Provider API error ({})", status);
            debug!("Provider error body: {}", error_text);

            return Err(LlmError::GenerationFailed {
                status: status.as_u16(),
                excerpt: body_excerpt(&error_text),
            }
            .into());
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()).into())
    }
}
