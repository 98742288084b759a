use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{AppError, StoreError};
use crate::models::{RecipeSummary, SourceKind, SourcePayload, StoredRecipe, StructuredRecipe};
use crate::prompt::GenerationRequest;

/// Loads a URL and returns the visible text of the page body.
///
/// Implementations remove non-content elements (script, style, header,
/// footer, nav, aside) before reading the text. Any session they open must
/// be closed before the returned future resolves, including when `cancel`
/// fires; in that case they return [`AppError::Cancelled`].
pub trait PageRenderer: Send + Sync + Clone {
    fn render_text(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns an unstructured source into a payload for the prompt builder.
pub trait SourceAcquirer: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Acquire the payload. Resources held during acquisition are released
    /// before this resolves.
    fn acquire(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<SourcePayload, AppError>> + Send;
}

/// Sends a generation request and returns the raw generated text.
///
/// One call, one attempt: retry policy belongs to the caller.
pub trait GenerationClient: Send + Sync + Clone {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Persistence collaborator. Implemented outside this workspace.
///
/// The store owns existence checks (the grouping must exist) and uniqueness
/// (no two recipes with the same name in one grouping).
pub trait RecipeStore: Send + Sync + Clone {
    fn create_recipe(
        &self,
        grouping_id: i64,
        recipe: &StructuredRecipe,
    ) -> impl Future<Output = Result<StoredRecipe, StoreError>> + Send;

    fn get_recipe(
        &self,
        grouping_id: i64,
        recipe_id: i64,
    ) -> impl Future<Output = Result<StoredRecipe, StoreError>> + Send;

    fn list_recipes(
        &self,
        grouping_id: i64,
    ) -> impl Future<Output = Result<Vec<RecipeSummary>, StoreError>> + Send;

    fn delete_recipe(&self, recipe_id: i64) -> impl Future<Output = Result<(), StoreError>> + Send;
}
