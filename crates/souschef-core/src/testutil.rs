//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::error::{AppError, StoreError};
use crate::extract::{ExtractionEvent, ExtractionReporter};
use crate::models::{RecipeSummary, StoredRecipe, StructuredRecipe};
use crate::prompt::GenerationRequest;
use crate::traits::{GenerationClient, PageRenderer, RecipeStore};

// ---------------------------------------------------------------------------
// MockRenderer
// ---------------------------------------------------------------------------

/// Mock renderer that returns queued page text.
#[derive(Clone)]
pub struct MockRenderer {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    hang: bool,
    calls: Arc<Mutex<usize>>,
    /// Number of sessions released, including when the render future is dropped.
    pub teardowns: Arc<Mutex<usize>>,
}

impl MockRenderer {
    pub fn new(text: &str) -> Self {
        Self::with_responses(vec![Ok(text.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            hang: false,
            calls: Arc::new(Mutex::new(0)),
            teardowns: Arc::new(Mutex::new(0)),
        }
    }

    /// A renderer stuck in navigation until cancelled.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::with_responses(vec![])
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    pub fn teardowns(&self) -> usize {
        *self.teardowns.lock().unwrap()
    }
}

/// Stand-in for an open rendering session; counts a teardown when released.
struct MockSession(Arc<Mutex<usize>>);

impl Drop for MockSession {
    fn drop(&mut self) {
        *self.0.lock().unwrap() += 1;
    }
}

impl PageRenderer for MockRenderer {
    async fn render_text(&self, _url: &str, cancel: &CancellationToken) -> Result<String, AppError> {
        *self.calls.lock().unwrap() += 1;
        let _session = MockSession(self.teardowns.clone());

        if self.hang {
            cancel.cancelled().await;
            return Err(AppError::Cancelled);
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(long_page_text())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockGenerationClient
// ---------------------------------------------------------------------------

/// Mock generation client that returns queued raw text and records requests.
#[derive(Clone)]
pub struct MockGenerationClient {
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    hang: bool,
    pub requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl MockGenerationClient {
    pub fn new(raw: impl Into<String>) -> Self {
        Self::with_responses(vec![Ok(raw.into())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            hang: false,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A client whose call never completes.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::with_responses(vec![])
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl GenerationClient for MockGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, AppError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.hang {
            return std::future::pending().await;
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("{}".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory store with the collaborator's existence and uniqueness rules.
#[derive(Clone, Default)]
pub struct MockStore {
    groupings: Arc<Mutex<Vec<i64>>>,
    pub saved: Arc<Mutex<Vec<StoredRecipe>>>,
}

impl MockStore {
    pub fn with_groupings(ids: &[i64]) -> Self {
        Self {
            groupings: Arc::new(Mutex::new(ids.to_vec())),
            saved: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl RecipeStore for MockStore {
    async fn create_recipe(
        &self,
        grouping_id: i64,
        recipe: &StructuredRecipe,
    ) -> Result<StoredRecipe, StoreError> {
        if !self.groupings.lock().unwrap().contains(&grouping_id) {
            return Err(StoreError::NotFound(format!(
                "Dish id : {grouping_id} not found"
            )));
        }

        let mut saved = self.saved.lock().unwrap();
        if saved
            .iter()
            .any(|s| s.grouping_id == grouping_id && s.recipe.name == recipe.name)
        {
            return Err(StoreError::Conflict(format!(
                "A recipe with name : {} already exists for this dish",
                recipe.name
            )));
        }

        let stored = StoredRecipe {
            id: saved.len() as i64 + 1,
            grouping_id,
            recipe: recipe.clone(),
        };
        saved.push(stored.clone());
        Ok(stored)
    }

    async fn get_recipe(&self, grouping_id: i64, recipe_id: i64) -> Result<StoredRecipe, StoreError> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.grouping_id == grouping_id && s.id == recipe_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("Recipe not found for this dish".into()))
    }

    async fn list_recipes(&self, grouping_id: i64) -> Result<Vec<RecipeSummary>, StoreError> {
        Ok(self
            .saved
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.grouping_id == grouping_id)
            .map(|s| RecipeSummary {
                id: s.id,
                name: s.recipe.name.clone(),
            })
            .collect())
    }

    async fn delete_recipe(&self, recipe_id: i64) -> Result<(), StoreError> {
        let mut saved = self.saved.lock().unwrap();
        let before = saved.len();
        saved.retain(|s| s.id != recipe_id);
        if saved.len() == before {
            return Err(StoreError::NotFound("Recipe not found".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ExtractionReporter for MockReporter {
    fn report(&self, event: ExtractionEvent<'_>) {
        let label = match &event {
            ExtractionEvent::Started { .. } => "Started".to_string(),
            ExtractionEvent::StageEntered { stage, .. } => format!("Stage:{stage}"),
            ExtractionEvent::SourceAcquired { .. } => "SourceAcquired".to_string(),
            ExtractionEvent::Generated { .. } => "Generated".to_string(),
            ExtractionEvent::Succeeded { .. } => "Succeeded".to_string(),
            ExtractionEvent::Failed { stage, failure, .. } => {
                format!("Failed:{stage}:{}", failure.kind())
            }
        };
        self.events.lock().unwrap().push(label);
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Page text comfortably above the minimum length, without surrounding whitespace.
pub fn long_page_text() -> String {
    let mut text = String::from("Café Tarte Tatin: 4 apples, 100g sugar. Step 1: peel apples. Step 2: caramelize sugar.");
    while text.chars().count() < 400 {
        text.push_str(" A classic upside-down caramelized apple tart from the Loire valley.");
    }
    text
}

/// Generated output for the Tarte Tatin page.
pub fn tatin_response(grouping_id: i64) -> String {
    serde_json::json!({
        "groupingId": grouping_id,
        "name": "Cafe Tarte Tatin",
        "components": [{
            "name": "Tarte Tatin",
            "instructions": [
                {"step": 1, "text": "Peel apples"},
                {"step": 2, "text": "Caramelize sugar"}
            ],
            "ingredients": [
                {"name": "apples", "quantity": "4", "unit": ""},
                {"name": "sugar", "quantity": 100, "unit": "g"}
            ]
        }]
    })
    .to_string()
}

/// Generated output for a handwritten "2 eggs, 1 cup flour" list.
pub fn egg_flour_response() -> String {
    serde_json::json!({
        "name": "Egg and flour",
        "components": [{
            "name": "Ingredients",
            "instructions": [],
            "ingredients": [
                {"name": "eggs", "quantity": 2, "unit": ""},
                {"name": "flour", "quantity": "1", "unit": "cup"}
            ]
        }]
    })
    .to_string()
}
