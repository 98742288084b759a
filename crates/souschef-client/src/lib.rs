use std::time::Duration;

use souschef_core::error::AppError;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "browser")]
pub mod browser_renderer;
pub mod ollama;
pub mod static_renderer;

#[cfg(feature = "browser")]
pub use browser_renderer::BrowserRenderer;
pub use ollama::OllamaClient;
pub use static_renderer::StaticRenderer;

/// Desktop Chrome user agent sent by both renderers.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Elements removed from the page before its text is read.
pub const STRIPPED_TAGS: &[&str] = &["script", "style", "header", "footer", "nav", "aside"];

/// Run `work` under a wall-clock budget, giving up early on cancellation.
///
/// Dropping `work` on either exit releases whatever it still holds.
pub(crate) async fn within_budget<T>(
    budget: Duration,
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        result = tokio::time::timeout(budget, work) => {
            result.unwrap_or(Err(AppError::Timeout(budget.as_secs())))
        }
    }
}
