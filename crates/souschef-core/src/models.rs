use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A validated, schema-conformant recipe ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredRecipe {
    /// Identifier of the dish this recipe belongs to.
    pub grouping_id: i64,
    pub name: String,
    /// Never empty once decoded.
    pub components: Vec<Component>,
}

impl StructuredRecipe {
    /// Total number of instructions across all components.
    pub fn instruction_count(&self) -> usize {
        self.components.iter().map(|c| c.instructions.len()).sum()
    }

    /// Total number of ingredients across all components.
    pub fn ingredient_count(&self) -> usize {
        self.components.iter().map(|c| c.ingredients.len()).sum()
    }
}

/// A named part of a recipe (e.g. "Dough", "Filling").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub instructions: Vec<Instruction>,
    pub ingredients: Vec<Ingredient>,
}

impl Component {
    /// Instructions sorted by their `step` hint.
    ///
    /// Steps may repeat or skip numbers; the sort is stable so ties keep
    /// their original order.
    pub fn ordered_instructions(&self) -> Vec<&Instruction> {
        let mut ordered: Vec<&Instruction> = self.instructions.iter().collect();
        ordered.sort_by_key(|i| i.step);
        ordered
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub step: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    /// Free-form so that "1/4" survives untouched.
    pub quantity: String,
    /// Empty when the ingredient is counted ("4 apples").
    pub unit: String,
}

/// Where a recipe comes from. Exactly one form per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeSource {
    Url(String),
    Image(Vec<u8>),
}

impl RecipeSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            RecipeSource::Url(_) => SourceKind::Web,
            RecipeSource::Image(_) => SourceKind::Image,
        }
    }
}

/// An inbound extraction request.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Correlates log lines for one request; never persisted.
    pub request_id: Uuid,
    pub grouping_id: i64,
    pub source: RecipeSource,
}

impl ExtractionRequest {
    pub fn from_url(url: impl Into<String>, grouping_id: i64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            grouping_id,
            source: RecipeSource::Url(url.into()),
        }
    }

    pub fn from_image(bytes: Vec<u8>, grouping_id: i64) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            grouping_id,
            source: RecipeSource::Image(bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Web,
    Image,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Web => f.write_str("web"),
            SourceKind::Image => f.write_str("image"),
        }
    }
}

/// Output of source acquisition, ready to be embedded in a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePayload {
    /// Cleaned visible page text.
    Text(String),
    /// Base64-encoded image bytes.
    Image { base64: String },
}

impl SourcePayload {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourcePayload::Text(_) => SourceKind::Web,
            SourcePayload::Image { .. } => SourceKind::Image,
        }
    }

    /// Payload size in bytes, for logging.
    pub fn len(&self) -> usize {
        match self {
            SourcePayload::Text(text) => text.len(),
            SourcePayload::Image { base64 } => base64.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-request pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    Acquiring,
    Prompting,
    Generating,
    Decoding,
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExtractionStage::Acquiring => "acquiring",
            ExtractionStage::Prompting => "prompting",
            ExtractionStage::Generating => "generating",
            ExtractionStage::Decoding => "decoding",
        };
        f.write_str(label)
    }
}

/// A recipe as returned by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredRecipe {
    pub id: i64,
    pub grouping_id: i64,
    pub recipe: StructuredRecipe,
}

/// Listing entry for recipes of one grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeSummary {
    pub id: i64,
    pub name: String,
}
