use thiserror::Error;

use crate::models::ExtractionStage;

/// Errors raised inside individual pipeline stages.
///
/// These never leave the orchestrator: [`ExtractionFailure::from_stage`]
/// folds them into the terminal taxonomy returned to callers.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a page or calling the generation service).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Generation service answered with a non-success status or an unusable body.
    #[error("Generation error (HTTP {status_code}): {message}")]
    GenerationError {
        message: String,
        status_code: u16,
        retryable: bool,
    },

    /// Headless browser could not be launched or driven.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Page rendered, but the visible text is too short to be a recipe.
    #[error("Extracted text too short ({length} < {minimum} characters)")]
    SourceTooShort { length: usize, minimum: usize },

    /// Source payload is missing or empty.
    #[error("Empty source: {0}")]
    EmptySource(String),

    /// Generated output is not valid JSON or violates the recipe schema.
    #[error("Decode error: {message}")]
    DecodeError { message: String, raw: String },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Operation exceeded its time budget.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The caller cancelled the request.
    #[error("Cancelled")]
    Cancelled,
}

impl AppError {
    /// Returns true if this error is transient and a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) => true,
            AppError::GenerationError { retryable, .. } => *retryable,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}

/// Terminal outcome of a failed extraction.
///
/// Exactly one of these is returned for every request that does not produce
/// a recipe. None of them is retried inside the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// Navigation timed out, the render was blocked, or the page text was too short.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Generation service failed, timed out, or returned an unusable envelope.
    #[error("Generation transport error: {message}")]
    GenerationTransport {
        message: String,
        status_code: Option<u16>,
        retryable: bool,
    },

    /// Generated text is not valid JSON or does not satisfy the recipe schema.
    #[error("Decode error: {message}")]
    Decode { message: String, raw: String },

    /// The caller cancelled the request before completion.
    #[error("Extraction cancelled")]
    Cancelled,
}

impl ExtractionFailure {
    /// Map a stage error onto the terminal taxonomy.
    pub fn from_stage(stage: ExtractionStage, err: AppError) -> Self {
        if matches!(err, AppError::Cancelled) {
            return ExtractionFailure::Cancelled;
        }

        match stage {
            ExtractionStage::Acquiring => ExtractionFailure::SourceUnavailable(err.to_string()),
            ExtractionStage::Prompting | ExtractionStage::Generating => {
                let retryable = err.is_retryable();
                let (message, status_code) = match err {
                    AppError::GenerationError {
                        message,
                        status_code,
                        ..
                    } => (message, Some(status_code)),
                    other => (other.to_string(), None),
                };
                ExtractionFailure::GenerationTransport {
                    message,
                    status_code,
                    retryable,
                }
            }
            ExtractionStage::Decoding => match err {
                AppError::DecodeError { message, raw } => ExtractionFailure::Decode { message, raw },
                other => ExtractionFailure::Decode {
                    message: other.to_string(),
                    raw: String::new(),
                },
            },
        }
    }

    /// Short machine-readable label, used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionFailure::SourceUnavailable(_) => "source_unavailable",
            ExtractionFailure::GenerationTransport { .. } => "generation_transport_error",
            ExtractionFailure::Decode { .. } => "decode_error",
            ExtractionFailure::Cancelled => "cancelled",
        }
    }

    /// Hint for the caller deciding whether to offer a retry to the end user.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExtractionFailure::GenerationTransport { retryable, .. } => *retryable,
            ExtractionFailure::SourceUnavailable(_) | ExtractionFailure::Decode { .. } => true,
            ExtractionFailure::Cancelled => false,
        }
    }
}

/// Rejections from the persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The grouping (or recipe) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A recipe with the same name already exists in the grouping.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other storage failure.
    #[error("Store error: {0}")]
    Backend(String),
}

/// Failure of an extract-then-persist run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),

    #[error(transparent)]
    Store(#[from] StoreError),
}
