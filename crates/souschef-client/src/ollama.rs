use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use souschef_core::config::{DEFAULT_IMAGE_TIMEOUT, DEFAULT_TEXT_TIMEOUT, ExtractorConfig};
use souschef_core::error::AppError;
use souschef_core::models::SourceKind;
use souschef_core::prompt::GenerationRequest;
use souschef_core::traits::GenerationClient;

/// Client for an Ollama-compatible `/api/generate` endpoint.
///
/// One POST per call, no retries. Idle connections are not kept, so nothing
/// outlives the request that opened it. The timeout is chosen per request:
/// vision models are much slower than text ones.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    generate_url: String,
    text_timeout: Duration,
    image_timeout: Duration,
}

impl OllamaClient {
    pub fn new(generate_url: impl Into<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            generate_url: generate_url.into(),
            text_timeout: DEFAULT_TEXT_TIMEOUT,
            image_timeout: DEFAULT_IMAGE_TIMEOUT,
        })
    }

    pub fn from_config(config: &ExtractorConfig) -> Result<Self, AppError> {
        Ok(Self::new(&config.generate_url)?.with_timeouts(config.text_timeout, config.image_timeout))
    }

    pub fn with_timeouts(mut self, text: Duration, image: Duration) -> Self {
        self.text_timeout = text;
        self.image_timeout = image;
        self
    }

    pub fn generate_url(&self) -> &str {
        &self.generate_url
    }

    fn timeout_for(&self, kind: SourceKind) -> Duration {
        match kind {
            SourceKind::Web => self.text_timeout,
            SourceKind::Image => self.image_timeout,
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    error: Option<String>,
    /// Nanoseconds.
    total_duration: Option<u64>,
    eval_count: Option<u64>,
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

impl GenerationClient for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, AppError> {
        let timeout = self.timeout_for(request.kind());
        let timeout_secs = timeout.as_secs();

        tracing::debug!(
            model = %request.model,
            kind = %request.kind(),
            prompt_bytes = request.prompt.len(),
            timeout_secs,
            "Sending generation request"
        );

        let response = self
            .client
            .post(&self.generate_url)
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(timeout_secs)
                } else if e.is_connect() {
                    AppError::NetworkError(format!("Connection failed: {e}"))
                } else {
                    AppError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();

            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("HTTP {status_code}: {body}"));

            return Err(AppError::GenerationError {
                message,
                status_code,
                retryable: status_code == 429 || status_code >= 500,
            });
        }

        let status_code = status.as_u16();
        let body: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(timeout_secs)
            } else {
                AppError::GenerationError {
                    message: format!("Failed to parse generation response: {e}"),
                    status_code,
                    retryable: false,
                }
            }
        })?;

        if let Some(error) = body.error {
            return Err(AppError::GenerationError {
                message: error,
                status_code,
                retryable: false,
            });
        }

        let text = body.response.ok_or_else(|| AppError::GenerationError {
            message: "Generation response has no `response` field".into(),
            status_code,
            retryable: false,
        })?;

        tracing::debug!(
            model = %request.model,
            response_bytes = text.len(),
            eval_count = body.eval_count,
            total_ms = body.total_duration.map(|ns| ns / 1_000_000),
            "Generation response received"
        );

        Ok(text)
    }
}
