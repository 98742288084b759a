use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::prompt::{DEFAULT_NUM_CTX, DEFAULT_TEXT_MODEL, DEFAULT_VISION_MODEL};
use crate::source::DEFAULT_MIN_TEXT_CHARS;

pub const DEFAULT_GENERATE_URL: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_TEXT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Settings for the extraction pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// Full URL of the generation endpoint.
    pub generate_url: String,
    pub text_model: String,
    pub vision_model: String,
    /// Hard wall-clock budget for rendering a page.
    pub navigation_timeout: Duration,
    /// Generation budget for page-text requests.
    pub text_timeout: Duration,
    /// Generation budget for image requests.
    pub image_timeout: Duration,
    pub min_text_chars: usize,
    pub num_ctx: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            generate_url: DEFAULT_GENERATE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            text_timeout: DEFAULT_TEXT_TIMEOUT,
            image_timeout: DEFAULT_IMAGE_TIMEOUT,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            num_ctx: DEFAULT_NUM_CTX,
        }
    }
}

impl ExtractorConfig {
    /// Read configuration from environment variables.
    ///
    /// All optional, falling back to the defaults:
    /// - `SOUSCHEF_GENERATE_URL`
    /// - `SOUSCHEF_TEXT_MODEL`, `SOUSCHEF_VISION_MODEL`
    /// - `SOUSCHEF_NAVIGATION_TIMEOUT_SECS` (60)
    /// - `SOUSCHEF_TEXT_TIMEOUT_SECS` (120), `SOUSCHEF_IMAGE_TIMEOUT_SECS` (300)
    /// - `SOUSCHEF_MIN_TEXT_CHARS` (350)
    /// - `SOUSCHEF_NUM_CTX` (8192)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary key lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, AppError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let string = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let secs = |key: &str, default: Duration| -> Result<Duration, AppError> {
            parse_positive(&lookup, key, default.as_secs()).map(Duration::from_secs)
        };

        Ok(Self {
            generate_url: string("SOUSCHEF_GENERATE_URL", defaults.generate_url),
            text_model: string("SOUSCHEF_TEXT_MODEL", defaults.text_model),
            vision_model: string("SOUSCHEF_VISION_MODEL", defaults.vision_model),
            navigation_timeout: secs(
                "SOUSCHEF_NAVIGATION_TIMEOUT_SECS",
                defaults.navigation_timeout,
            )?,
            text_timeout: secs("SOUSCHEF_TEXT_TIMEOUT_SECS", defaults.text_timeout)?,
            image_timeout: secs("SOUSCHEF_IMAGE_TIMEOUT_SECS", defaults.image_timeout)?,
            min_text_chars: parse_positive(
                &lookup,
                "SOUSCHEF_MIN_TEXT_CHARS",
                defaults.min_text_chars,
            )?,
            num_ctx: parse_positive(&lookup, "SOUSCHEF_NUM_CTX", defaults.num_ctx)?,
        })
    }
}

fn parse_positive<L, T>(lookup: &L, key: &str, default: T) -> Result<T, AppError>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    let parsed: T = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!("Invalid {key} '{raw}': must be a positive integer"))
    })?;
    if parsed <= T::default() {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(parsed)
}
