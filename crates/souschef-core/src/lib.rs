pub mod config;
pub mod decode;
pub mod error;
pub mod extract;
pub mod models;
pub mod prompt;
pub mod schema;
pub mod source;
pub mod traits;
pub mod util;

#[cfg(test)]
pub mod testutil;

pub use config::ExtractorConfig;
pub use decode::RecipeDecoder;
pub use error::{AppError, ExtractionFailure, ImportError, StoreError};
pub use extract::{ExtractionEvent, ExtractionReporter, ExtractionService, TracingReporter};
pub use models::{
    Component, ExtractionRequest, ExtractionStage, Ingredient, Instruction, RecipeSource,
    RecipeSummary, SourceKind, SourcePayload, StoredRecipe, StructuredRecipe,
};
pub use prompt::{GenerationOptions, GenerationRequest, PromptBuilder};
pub use source::{ImageSource, NoRenderer, WebSource};
pub use traits::{GenerationClient, PageRenderer, RecipeStore, SourceAcquirer};
