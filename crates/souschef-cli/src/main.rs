use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use souschef_client::{OllamaClient, StaticRenderer};
use souschef_core::schema::recipe_schema_json;
use souschef_core::traits::PageRenderer;
use souschef_core::{
    ExtractionRequest, ExtractionService, ExtractorConfig, NoRenderer, PromptBuilder,
};

/// Exit status for a request that ran but produced no recipe.
const EXTRACTION_FAILED: u8 = 2;

#[derive(Parser)]
#[command(name = "souschef", version, about = "Turn recipe pages and photos into structured recipes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a recipe from a web page
    Url {
        /// Recipe page URL
        #[arg(short, long)]
        url: String,

        /// Dish (grouping) id the recipe belongs to
        #[arg(short, long)]
        dish: i64,

        /// How the page is loaded
        #[arg(long, value_enum, default_value_t = RendererKind::default())]
        renderer: RendererKind,

        /// Allow the static renderer to fetch private/loopback addresses
        #[arg(long, default_value_t = false)]
        allow_private_urls: bool,

        #[command(flatten)]
        settings: Settings,
    },

    /// Extract a recipe from a photo of a handwritten or printed recipe
    Image {
        /// Path to the image file
        #[arg(short, long)]
        file: PathBuf,

        /// Dish (grouping) id the recipe belongs to
        #[arg(short, long)]
        dish: i64,

        #[command(flatten)]
        settings: Settings,
    },

    /// Print the JSON schema extracted recipes must satisfy
    Schema,
}

#[derive(Clone, Copy, ValueEnum)]
enum RendererKind {
    /// Headless Chromium (needs the `browser` feature)
    Browser,
    /// Plain HTTP GET, no JavaScript
    Static,
}

impl Default for RendererKind {
    fn default() -> Self {
        if cfg!(feature = "browser") {
            RendererKind::Browser
        } else {
            RendererKind::Static
        }
    }
}

/// Extractor settings. Unset flags fall back to the environment, then to
/// the built-in defaults.
#[derive(Args)]
struct Settings {
    /// Generation endpoint, e.g. http://localhost:11434/api/generate
    #[arg(long, env = "SOUSCHEF_GENERATE_URL")]
    generate_url: Option<String>,

    /// Model for page text
    #[arg(long, env = "SOUSCHEF_TEXT_MODEL")]
    text_model: Option<String>,

    /// Model for images
    #[arg(long, env = "SOUSCHEF_VISION_MODEL")]
    vision_model: Option<String>,

    /// Page rendering budget in seconds
    #[arg(long, env = "SOUSCHEF_NAVIGATION_TIMEOUT_SECS")]
    navigation_timeout_secs: Option<String>,

    /// Generation budget for page text, in seconds
    #[arg(long, env = "SOUSCHEF_TEXT_TIMEOUT_SECS")]
    text_timeout_secs: Option<String>,

    /// Generation budget for images, in seconds
    #[arg(long, env = "SOUSCHEF_IMAGE_TIMEOUT_SECS")]
    image_timeout_secs: Option<String>,

    /// Minimum visible page text, in characters
    #[arg(long, env = "SOUSCHEF_MIN_TEXT_CHARS")]
    min_text_chars: Option<String>,

    /// Context window for page text
    #[arg(long, env = "SOUSCHEF_NUM_CTX")]
    num_ctx: Option<String>,
}

impl Settings {
    fn lookup(&self, key: &str) -> Option<String> {
        let value = match key {
            "SOUSCHEF_GENERATE_URL" => &self.generate_url,
            "SOUSCHEF_TEXT_MODEL" => &self.text_model,
            "SOUSCHEF_VISION_MODEL" => &self.vision_model,
            "SOUSCHEF_NAVIGATION_TIMEOUT_SECS" => &self.navigation_timeout_secs,
            "SOUSCHEF_TEXT_TIMEOUT_SECS" => &self.text_timeout_secs,
            "SOUSCHEF_IMAGE_TIMEOUT_SECS" => &self.image_timeout_secs,
            "SOUSCHEF_MIN_TEXT_CHARS" => &self.min_text_chars,
            "SOUSCHEF_NUM_CTX" => &self.num_ctx,
            _ => return None,
        };
        value.clone()
    }

    fn config(&self) -> Result<ExtractorConfig> {
        ExtractorConfig::from_lookup(|key| self.lookup(key)).context("Invalid extractor settings")
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries only the recipe JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("souschef=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    match cli.command {
        Commands::Url {
            url,
            dish,
            renderer,
            allow_private_urls,
            settings,
        } => {
            let config = settings.config()?;
            let request = ExtractionRequest::from_url(url, dish);
            match renderer {
                RendererKind::Static => {
                    let renderer = StaticRenderer::with_timeout(config.navigation_timeout)
                        .context("Failed to create HTTP client")?;
                    let renderer = if allow_private_urls {
                        renderer.allow_private_urls()
                    } else {
                        renderer
                    };
                    cmd_extract(renderer, &config, request, &cancel).await
                }
                RendererKind::Browser => browser_extract(&config, request, &cancel).await,
            }
        }
        Commands::Image {
            file,
            dish,
            settings,
        } => {
            let config = settings.config()?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read image file: {}", file.display()))?;
            let request = ExtractionRequest::from_image(bytes, dish);

            cmd_extract(NoRenderer, &config, request, &cancel).await
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(recipe_schema_json())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(feature = "browser")]
async fn browser_extract(
    config: &ExtractorConfig,
    request: ExtractionRequest,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    let renderer = souschef_client::BrowserRenderer::with_timeout(config.navigation_timeout);
    cmd_extract(renderer, config, request, cancel).await
}

#[cfg(not(feature = "browser"))]
async fn browser_extract(
    _config: &ExtractorConfig,
    _request: ExtractionRequest,
    _cancel: &CancellationToken,
) -> Result<ExitCode> {
    anyhow::bail!("This build has no browser support; rebuild with `--features browser` or pass `--renderer static`")
}

async fn cmd_extract<R: PageRenderer>(
    renderer: R,
    config: &ExtractorConfig,
    request: ExtractionRequest,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    let client = OllamaClient::from_config(config).context("Failed to create generation client")?;
    let prompts = PromptBuilder::new(&config.text_model, &config.vision_model)
        .with_num_ctx(config.num_ctx);
    let service = ExtractionService::new(renderer, client, prompts)
        .context("Failed to initialise the recipe decoder")?
        .with_min_text_chars(config.min_text_chars);

    tracing::info!(
        request_id = %request.request_id,
        dish = request.grouping_id,
        source = %request.source.kind(),
        "Extracting recipe"
    );

    match service.extract_request(request, cancel).await {
        Ok(recipe) => {
            println!("{}", serde_json::to_string_pretty(&recipe)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            eprintln!("error[{}]: {failure}", failure.kind());
            if failure.is_retryable() {
                eprintln!("hint: this failure may succeed if retried");
            }
            Ok(ExitCode::from(EXTRACTION_FAILED))
        }
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Interrupt received, cancelling");
        cancel.cancel();
    }
}
