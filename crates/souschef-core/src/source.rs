use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{SourceKind, SourcePayload};
use crate::traits::{PageRenderer, SourceAcquirer};

/// Pages with less visible text than this are treated as blocked or
/// not-a-recipe.
pub const DEFAULT_MIN_TEXT_CHARS: usize = 350;

/// Web page source: renders the URL and checks the text is long enough.
#[derive(Clone)]
pub struct WebSource<R: PageRenderer> {
    renderer: R,
    url: String,
    min_chars: usize,
}

impl<R: PageRenderer> WebSource<R> {
    pub fn new(renderer: R, url: impl Into<String>) -> Self {
        Self {
            renderer,
            url: url.into(),
            min_chars: DEFAULT_MIN_TEXT_CHARS,
        }
    }

    pub fn with_min_chars(mut self, min_chars: usize) -> Self {
        self.min_chars = min_chars;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl<R: PageRenderer> SourceAcquirer for WebSource<R> {
    fn kind(&self) -> SourceKind {
        SourceKind::Web
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Result<SourcePayload, AppError> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let text = self.renderer.render_text(&self.url, cancel).await?;
        let trimmed = text.trim();
        let length = trimmed.chars().count();
        tracing::debug!(url = %self.url, length, "Rendered page text");

        if length < self.min_chars {
            return Err(AppError::SourceTooShort {
                length,
                minimum: self.min_chars,
            });
        }

        Ok(SourcePayload::Text(trimmed.to_string()))
    }
}

/// Renderer for services that only ever handle image requests.
///
/// Any URL request fails in acquisition as if the page could not be loaded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRenderer;

impl PageRenderer for NoRenderer {
    async fn render_text(&self, url: &str, _cancel: &CancellationToken) -> Result<String, AppError> {
        Err(AppError::BrowserError(format!(
            "no page renderer configured, cannot load {url}"
        )))
    }
}

/// Image source: base64-encodes bytes already in hand.
///
/// Content is not inspected; a bad photo surfaces later as a decode failure.
#[derive(Debug, Clone)]
pub struct ImageSource {
    bytes: Vec<u8>,
}

impl ImageSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl SourceAcquirer for ImageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Image
    }

    async fn acquire(&self, cancel: &CancellationToken) -> Result<SourcePayload, AppError> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.bytes.is_empty() {
            return Err(AppError::EmptySource("image contains no bytes".into()));
        }

        Ok(SourcePayload::Image {
            base64: STANDARD.encode(&self.bytes),
        })
    }
}
