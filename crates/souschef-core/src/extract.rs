use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::decode::RecipeDecoder;
use crate::error::{AppError, ExtractionFailure, ImportError};
use crate::models::{
    ExtractionRequest, ExtractionStage, RecipeSource, SourceKind, StoredRecipe, StructuredRecipe,
};
use crate::prompt::PromptBuilder;
use crate::source::{DEFAULT_MIN_TEXT_CHARS, ImageSource, WebSource};
use crate::traits::{GenerationClient, PageRenderer, RecipeStore, SourceAcquirer};
use crate::util::saturating_millis;

/// Events emitted while a request moves through the pipeline.
#[derive(Debug, Clone)]
pub enum ExtractionEvent<'a> {
    Started {
        request_id: Uuid,
        grouping_id: i64,
        kind: SourceKind,
    },
    StageEntered {
        request_id: Uuid,
        stage: ExtractionStage,
    },
    SourceAcquired {
        request_id: Uuid,
        bytes: usize,
    },
    Generated {
        request_id: Uuid,
        bytes: usize,
    },
    Succeeded {
        request_id: Uuid,
        recipe: &'a StructuredRecipe,
        elapsed_ms: u64,
    },
    Failed {
        request_id: Uuid,
        stage: ExtractionStage,
        failure: &'a ExtractionFailure,
        elapsed_ms: u64,
    },
}

/// Trait for receiving extraction events (decoupled logging).
pub trait ExtractionReporter: Send + Sync {
    fn report(&self, event: ExtractionEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ExtractionReporter for TracingReporter {
    fn report(&self, event: ExtractionEvent<'_>) {
        match event {
            ExtractionEvent::Started {
                request_id,
                grouping_id,
                kind,
            } => {
                tracing::info!(%request_id, grouping_id, %kind, "Extraction started");
            }
            ExtractionEvent::StageEntered { request_id, stage } => {
                tracing::debug!(%request_id, %stage, "Entering stage");
            }
            ExtractionEvent::SourceAcquired { request_id, bytes } => {
                tracing::info!(%request_id, bytes, "Source acquired");
            }
            ExtractionEvent::Generated { request_id, bytes } => {
                tracing::info!(%request_id, bytes, "Generation complete");
            }
            ExtractionEvent::Succeeded {
                request_id,
                recipe,
                elapsed_ms,
            } => {
                tracing::info!(
                    %request_id,
                    name = %recipe.name,
                    components = recipe.components.len(),
                    ingredients = recipe.ingredient_count(),
                    instructions = recipe.instruction_count(),
                    elapsed_ms,
                    "Extraction succeeded"
                );
            }
            ExtractionEvent::Failed {
                request_id,
                stage,
                failure,
                elapsed_ms,
            } => {
                tracing::warn!(
                    %request_id,
                    %stage,
                    kind = failure.kind(),
                    error = %failure,
                    elapsed_ms,
                    "Extraction failed"
                );
            }
        }
    }
}

/// Orchestrates one extraction: acquire → prompt → generate → decode.
///
/// Generic over the page renderer and generation client so tests can run
/// the whole state machine without a browser or a model. Single shot: a
/// failure in any stage ends the request.
pub struct ExtractionService<R, G, P = TracingReporter>
where
    R: PageRenderer,
    G: GenerationClient,
    P: ExtractionReporter,
{
    renderer: R,
    client: G,
    prompts: PromptBuilder,
    decoder: RecipeDecoder,
    min_text_chars: usize,
    reporter: P,
}

impl<R, G> ExtractionService<R, G, TracingReporter>
where
    R: PageRenderer,
    G: GenerationClient,
{
    pub fn new(renderer: R, client: G, prompts: PromptBuilder) -> Result<Self, AppError> {
        Ok(Self {
            renderer,
            client,
            prompts,
            decoder: RecipeDecoder::new()?,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            reporter: TracingReporter,
        })
    }
}

impl<R, G, P> ExtractionService<R, G, P>
where
    R: PageRenderer,
    G: GenerationClient,
    P: ExtractionReporter,
{
    pub fn with_min_text_chars(mut self, min_text_chars: usize) -> Self {
        self.min_text_chars = min_text_chars;
        self
    }

    pub fn with_reporter<P2: ExtractionReporter>(self, reporter: P2) -> ExtractionService<R, G, P2> {
        ExtractionService {
            renderer: self.renderer,
            client: self.client,
            prompts: self.prompts,
            decoder: self.decoder,
            min_text_chars: self.min_text_chars,
            reporter,
        }
    }

    pub fn reporter(&self) -> &P {
        &self.reporter
    }

    /// Run an inbound request, picking the web or image acquirer.
    pub async fn extract_request(
        &self,
        request: ExtractionRequest,
        cancel: &CancellationToken,
    ) -> Result<StructuredRecipe, ExtractionFailure> {
        let ExtractionRequest {
            request_id,
            grouping_id,
            source,
        } = request;

        match source {
            RecipeSource::Url(url) => {
                let source = WebSource::new(self.renderer.clone(), url)
                    .with_min_chars(self.min_text_chars);
                self.extract(&source, grouping_id, request_id, cancel).await
            }
            RecipeSource::Image(bytes) => {
                let source = ImageSource::new(bytes);
                self.extract(&source, grouping_id, request_id, cancel).await
            }
        }
    }

    /// Extract, then hand the recipe unchanged to the persistence collaborator.
    pub async fn extract_and_store<S: RecipeStore>(
        &self,
        request: ExtractionRequest,
        store: &S,
        cancel: &CancellationToken,
    ) -> Result<StoredRecipe, ImportError> {
        let grouping_id = request.grouping_id;
        let recipe = self.extract_request(request, cancel).await?;
        let stored = store.create_recipe(grouping_id, &recipe).await?;
        tracing::info!(recipe_id = stored.id, grouping_id, "Recipe stored");
        Ok(stored)
    }

    /// Run the pipeline for any source acquirer.
    ///
    /// Never returns a partial recipe, and never lets a stage error escape
    /// unmapped.
    pub async fn extract<A: SourceAcquirer>(
        &self,
        acquirer: &A,
        grouping_id: i64,
        request_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<StructuredRecipe, ExtractionFailure> {
        let span = tracing::info_span!("extract", %request_id, grouping_id);
        let started = Instant::now();

        self.reporter.report(ExtractionEvent::Started {
            request_id,
            grouping_id,
            kind: acquirer.kind(),
        });

        let result = self
            .run(acquirer, grouping_id, request_id, cancel)
            .instrument(span)
            .await;
        let elapsed_ms = saturating_millis(started.elapsed());

        match result {
            Ok(recipe) => {
                self.reporter.report(ExtractionEvent::Succeeded {
                    request_id,
                    recipe: &recipe,
                    elapsed_ms,
                });
                Ok(recipe)
            }
            Err((stage, failure)) => {
                self.reporter.report(ExtractionEvent::Failed {
                    request_id,
                    stage,
                    failure: &failure,
                    elapsed_ms,
                });
                Err(failure)
            }
        }
    }

    async fn run<A: SourceAcquirer>(
        &self,
        acquirer: &A,
        grouping_id: i64,
        request_id: Uuid,
        cancel: &CancellationToken,
    ) -> Result<StructuredRecipe, (ExtractionStage, ExtractionFailure)> {
        let fail = |stage: ExtractionStage| {
            move |err: AppError| (stage, ExtractionFailure::from_stage(stage, err))
        };

        // Acquiring: the acquirer releases its session before resolving.
        self.enter(request_id, ExtractionStage::Acquiring);
        let payload = acquirer
            .acquire(cancel)
            .await
            .map_err(fail(ExtractionStage::Acquiring))?;
        self.reporter.report(ExtractionEvent::SourceAcquired {
            request_id,
            bytes: payload.len(),
        });

        // Prompting
        self.enter(request_id, ExtractionStage::Prompting);
        ensure_not_cancelled(cancel).map_err(fail(ExtractionStage::Prompting))?;
        let request = self.prompts.build(&payload, grouping_id);
        drop(payload);

        // Generating: dropping the call future aborts the HTTP request.
        self.enter(request_id, ExtractionStage::Generating);
        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            result = self.client.generate(&request) => result,
        }
        .map_err(fail(ExtractionStage::Generating))?;
        self.reporter.report(ExtractionEvent::Generated {
            request_id,
            bytes: raw.len(),
        });

        // Decoding
        self.enter(request_id, ExtractionStage::Decoding);
        ensure_not_cancelled(cancel).map_err(fail(ExtractionStage::Decoding))?;
        self.decoder
            .decode_for_group(&raw, grouping_id)
            .map_err(fail(ExtractionStage::Decoding))
    }

    fn enter(&self, request_id: Uuid, stage: ExtractionStage) {
        self.reporter
            .report(ExtractionEvent::StageEntered { request_id, stage });
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), AppError> {
    if cancel.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}
