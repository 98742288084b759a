use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use souschef_core::config::DEFAULT_NAVIGATION_TIMEOUT;
use souschef_core::error::AppError;
use souschef_core::traits::PageRenderer;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{STRIPPED_TAGS, USER_AGENT, within_budget};

/// Elements whose children start on a new line of text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table",
    "td", "th", "tr", "ul",
];

/// Elements that never contribute visible text.
const IGNORED_TAGS: &[&str] = &["noscript", "template", "svg", "iframe"];

/// Page renderer that downloads raw HTML and reads the body text without
/// executing JavaScript.
///
/// Used where no Chromium binary is available. Pages that build their
/// content client-side usually come back too short and are rejected by the
/// minimum-length check.
///
/// SSRF protection is **enabled** by default: requests to private/reserved
/// IP ranges are blocked. Use [`allow_private_urls`](Self::allow_private_urls)
/// to disable it for CLI usage where the user controls the machine.
#[derive(Clone)]
pub struct StaticRenderer {
    client: Client,
    timeout: Duration,
    ssrf_protection: bool,
}

impl StaticRenderer {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(DEFAULT_NAVIGATION_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout,
            ssrf_protection: true,
        })
    }

    /// Disable SSRF protection, allowing requests to private/reserved IPs.
    pub fn allow_private_urls(mut self) -> Self {
        self.ssrf_protection = false;
        self
    }

    async fn fetch_html(&self, url: &str) -> Result<String, AppError> {
        if self.ssrf_protection {
            validate_url(url).await?;
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpError(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout.as_secs())
            } else {
                AppError::HttpError(format!("Failed to read response body: {e}"))
            }
        })
    }
}

impl PageRenderer for StaticRenderer {
    /// Host resolution, the request and the body read share one budget.
    async fn render_text(&self, url: &str, cancel: &CancellationToken) -> Result<String, AppError> {
        let html = within_budget(self.timeout, cancel, self.fetch_html(url)).await?;
        let text = visible_text(&html);
        tracing::debug!(url, html_bytes = html.len(), text_chars = text.chars().count(), "Read static page");
        Ok(text)
    }
}

/// Visible text of the document body, one line per block element.
///
/// `script`, `style`, `header`, `footer`, `nav` and `aside` subtrees are
/// dropped, as are elements that never render text.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("body") else {
        return String::new();
    };
    let Some(body) = document.select(&selector).next() else {
        return String::new();
    };

    let mut lines = Vec::new();
    let mut current = String::new();
    collect_text(body, &mut lines, &mut current);
    flush_line(&mut lines, &mut current);
    lines.join("\n")
}

fn collect_text(element: ElementRef<'_>, lines: &mut Vec<String>, current: &mut String) {
    let name = element.value().name();
    if STRIPPED_TAGS.contains(&name) || IGNORED_TAGS.contains(&name) {
        return;
    }
    if name == "br" {
        flush_line(lines, current);
        return;
    }

    let block = BLOCK_TAGS.contains(&name);
    if block {
        flush_line(lines, current);
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                for word in text.split_whitespace() {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(word);
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, lines, current);
                }
            }
            _ => {}
        }
    }

    if block {
        flush_line(lines, current);
    }
}

fn flush_line(lines: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        lines.push(std::mem::take(current));
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Reject URLs that are not http(s) or that resolve to a private address.
async fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::HttpError(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::HttpError("URL has no host".to_string()))?;

    // Bracketed IPv6 literals come back from host_str() with brackets.
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        if is_private_ip(ip) {
            return Err(AppError::HttpError(format!(
                "SSRF blocked: {host} is a private/reserved IP"
            )));
        }
        return Ok(());
    }

    let port = parsed.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| AppError::NetworkError(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(AppError::NetworkError(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }

    if let Some(blocked) = addrs.iter().find(|a| is_private_ip(a.ip())) {
        return Err(AppError::HttpError(format!(
            "SSRF blocked: {host} resolves to private/reserved IP {}",
            blocked.ip()
        )));
    }

    Ok(())
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local() // cloud metadata lives here
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || (a == 100 && (b & 0xC0) == 64) // CGN 100.64.0.0/10
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xFFC0) == 0xFE80
                || (first & 0xFE00) == 0xFC00
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}
