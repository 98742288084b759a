use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use souschef_core::config::DEFAULT_NAVIGATION_TIMEOUT;
use souschef_core::error::AppError;
use souschef_core::traits::PageRenderer;
use souschef_core::util::saturating_millis;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{STRIPPED_TAGS, USER_AGENT, within_budget};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long each teardown step may take before the process is killed.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

const CHROME_CANDIDATES: &[&str] = &[
    // Snap (Ubuntu default)
    "/snap/chromium/current/usr/lib/chromium-browser/chrome",
    // Flatpak
    "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
];

/// Headless-Chromium page renderer driven over the Chrome DevTools Protocol.
///
/// Every [`PageRenderer::render_text`] call launches its own short-lived
/// Chromium process with a throwaway profile and closes it before returning,
/// whatever the outcome. Launch, navigation and text extraction share the
/// navigation budget; teardown gets a short grace period of its own. Nothing is shared between calls, so concurrent
/// requests cannot see each other's cookies or crash each other's tabs.
///
/// Navigation waits for the DOM to be parsed rather than for the network to
/// go idle; pages with endless trackers would otherwise never finish.
///
/// # Example
///
/// ```rust,no_run
/// use souschef_client::BrowserRenderer;
/// use souschef_core::traits::PageRenderer;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let renderer = BrowserRenderer::new();
/// let text = renderer
///     .render_text("https://example.com", &CancellationToken::new())
///     .await?;
/// println!("{text}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BrowserRenderer {
    timeout: Duration,
    chrome_bin: Option<PathBuf>,
}

impl Default for BrowserRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserRenderer {
    /// Renderer with the default **60 s** navigation budget.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_NAVIGATION_TIMEOUT)
    }

    /// Renderer with a custom wall-clock budget covering browser launch,
    /// navigation and text extraction.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            chrome_bin: find_chrome_binary(),
        }
    }

    /// Use this Chrome/Chromium binary instead of the discovered one.
    pub fn with_chrome_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_bin = Some(path.into());
        self
    }

    fn config(&self, profile: &Path) -> Result<BrowserConfig, AppError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .user_data_dir(profile);

        if let Some(bin) = &self.chrome_bin {
            builder = builder.chrome_executable(bin);
        }

        builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--single-process")
            .arg("--no-first-run")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={USER_AGENT}"))
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))
    }
}

impl PageRenderer for BrowserRenderer {
    async fn render_text(&self, url: &str, cancel: &CancellationToken) -> Result<String, AppError> {
        let mut session = None;
        let outcome = within_budget(self.timeout, cancel, async {
            let session = session.insert(BrowserSession::launch(self).await?);
            session.read_body_text(url).await
        })
        .await;

        if let Some(mut session) = session {
            session.close().await;
        }
        outcome
    }
}

/// The process-control calls teardown needs from a running browser.
trait BrowserProcess: Send + 'static {
    fn close(&mut self) -> impl Future<Output = Result<(), String>> + Send;
    fn kill(&mut self) -> impl Future<Output = ()> + Send;
    fn wait(&mut self) -> impl Future<Output = Result<(), String>> + Send;
}

impl BrowserProcess for Browser {
    async fn close(&mut self) -> Result<(), String> {
        Browser::close(self).await.map(|_| ()).map_err(|e| e.to_string())
    }

    async fn kill(&mut self) {
        if let Some(Err(e)) = Browser::kill(self).await {
            tracing::warn!(error = %e, "Failed to kill browser process");
        }
    }

    async fn wait(&mut self) -> Result<(), String> {
        Browser::wait(self).await.map(|_| ()).map_err(|e| e.to_string())
    }
}

/// Owns a browser process until it has been shut down.
///
/// [`shutdown`](Self::shutdown) asks the process to close, falling back to a
/// kill when closing fails or stalls, then reaps it. Every step is bounded by
/// the grace period. A guard dropped before shutdown kills the process from a
/// background task.
struct ProcessGuard<P: BrowserProcess> {
    process: Option<P>,
}

impl<P: BrowserProcess> ProcessGuard<P> {
    fn new(process: P) -> Self {
        Self {
            process: Some(process),
        }
    }

    fn get(&self) -> Option<&P> {
        self.process.as_ref()
    }

    async fn shutdown(&mut self, grace: Duration) {
        let Some(mut process) = self.process.take() else {
            return;
        };

        let killed = match tokio::time::timeout(grace, process.close()).await {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Browser did not close cleanly, killing it");
                true
            }
            Err(_) => {
                tracing::warn!(
                    grace_ms = saturating_millis(grace),
                    "Browser close stalled, killing it"
                );
                true
            }
        };
        if killed && tokio::time::timeout(grace, process.kill()).await.is_err() {
            tracing::warn!("Browser kill stalled");
        }

        match tokio::time::timeout(grace, process.wait()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to reap browser process"),
            Err(_) => tracing::warn!("Browser process was not reaped in time"),
        }
    }
}

impl<P: BrowserProcess> Drop for ProcessGuard<P> {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            tracing::debug!("Browser session dropped while open, killing process");
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move { process.kill().await });
            }
        }
    }
}

/// One Chromium process plus its CDP handler task and profile directory.
struct BrowserSession {
    browser: ProcessGuard<Browser>,
    handler: JoinHandle<()>,
    _profile: TempDir,
}

impl BrowserSession {
    async fn launch(renderer: &BrowserRenderer) -> Result<Self, AppError> {
        let profile = tempfile::Builder::new()
            .prefix("souschef-chromium-")
            .tempdir()
            .map_err(|e| AppError::BrowserError(format!("Failed to create profile dir: {e}")))?;

        let config = renderer.config(profile.path())?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::debug!("Browser CDP handler stopped: {event:?}");
                    break;
                }
            }
        });

        tracing::debug!(profile = %profile.path().display(), "Browser launched");

        Ok(Self {
            browser: ProcessGuard::new(browser),
            handler,
            _profile: profile,
        })
    }

    async fn read_body_text(&self, url: &str) -> Result<String, AppError> {
        let browser = self
            .browser
            .get()
            .ok_or_else(|| AppError::BrowserError("Browser already closed".into()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to open page: {e}")))?;

        let navigation = page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to navigate to {url}: {e}")))?;
        if let Some(error_text) = navigation.result.error_text.as_deref() {
            return Err(AppError::HttpError(format!(
                "Failed to navigate to {url}: {error_text}"
            )));
        }

        wait_for_dom(&page).await;

        let text: String = page
            .evaluate(body_text_script())
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to read page text: {e}")))?
            .into_value()
            .map_err(|e| AppError::BrowserError(format!("Page text is not a string: {e}")))?;

        tracing::debug!(url, text_chars = text.chars().count(), "Read rendered page");
        Ok(text)
    }

    async fn close(&mut self) {
        self.browser.shutdown(CLOSE_GRACE).await;
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Poll until `document.readyState` leaves `loading` for the navigated document.
///
/// Evaluation errors while the old document is torn down are expected and
/// just mean "not yet". Bounded by the caller's timeout.
async fn wait_for_dom(page: &Page) {
    const READY_STATE: &str =
        "document.location.href === 'about:blank' ? 'loading' : document.readyState";

    loop {
        let state = match page.evaluate(READY_STATE).await {
            Ok(result) => result.into_value::<String>().ok(),
            Err(_) => None,
        };
        if matches!(state.as_deref(), Some("interactive" | "complete")) {
            return;
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}

/// Script that removes non-content elements and returns the body's visible text.
fn body_text_script() -> String {
    format!(
        "(() => {{ document.querySelectorAll('{}').forEach(el => el.remove()); \
         return document.body ? document.body.innerText : ''; }})()",
        STRIPPED_TAGS.join(", ")
    )
}

/// Locate a Chrome/Chromium binary.
///
/// `CHROME_BIN` wins when it points at an existing file. Snap-packaged
/// Chromium exposes a wrapper at `/snap/bin/chromium` that strips unknown
/// flags, so the real binary inside the snap is tried first. `None` lets
/// chromiumoxide run its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    chrome_binary_from(std::env::var_os("CHROME_BIN").map(PathBuf::from), CHROME_CANDIDATES)
}

fn chrome_binary_from(explicit: Option<PathBuf>, candidates: &[&str]) -> Option<PathBuf> {
    if let Some(path) = explicit.filter(|p| p.exists()) {
        return Some(path);
    }
    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}
