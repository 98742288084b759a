/// Smoke-test for `BrowserRenderer`.
///
/// Launches a headless Chromium, renders a page (default
/// <https://example.com>), and prints the visible text the extractor would
/// see, with its length against the minimum.
///
/// Run with:
///   cargo run --example browser_smoke --features browser -- [URL]
use souschef_client::BrowserRenderer;
use souschef_core::source::DEFAULT_MIN_TEXT_CHARS;
use souschef_core::traits::PageRenderer;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("souschef=debug,info")
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com".to_string());

    println!("Rendering {url} …");
    let text = BrowserRenderer::new()
        .render_text(&url, &CancellationToken::new())
        .await?;

    let chars = text.trim().chars().count();
    assert!(!text.is_empty(), "Rendered page has no visible text");

    println!(
        "OK: {chars} visible characters ({})",
        if chars >= DEFAULT_MIN_TEXT_CHARS {
            "long enough to extract"
        } else {
            "below the extraction minimum"
        }
    );
    println!("First 300 chars:\n{}", text.chars().take(300).collect::<String>());
    Ok(())
}
