use serde::Serialize;

use crate::models::{SourceKind, SourcePayload};
use crate::schema::recipe_schema_string;

pub const DEFAULT_TEXT_MODEL: &str = "qwen2.5:7b";
pub const DEFAULT_VISION_MODEL: &str = "llama3.2-vision:11b";
/// Context window for page text; large enough for a full recipe page.
pub const DEFAULT_NUM_CTX: u32 = 8192;

const TEXT_ROLE: &str = "You are a professional chef.";
const IMAGE_ROLE: &str = "You are an OCR expert reading recipes.";

const TEXT_RULES: &str = "Rules: quantities are strings to account for fractions (e.g. \"1/4\", \"1/2\"), otherwise write the integer as a string. \
No accents in the title: replace accented letters with their base letter (\"Café\" becomes \"Cafe\") and reduce the title to its simplest form. \
A recipe can be a list of ingredients with no instructions.";

const IMAGE_RULES: &str = "Rules: use a one-egg reference scale and prefer integer quantities, written as strings. \
No accents in the title: replace accented letters with their base letter. \
A recipe can be a list of ingredients with no instructions.";

/// Request body for the generation service (`/api/generate`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub system: String,
    pub stream: bool,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    pub options: GenerationOptions,
    pub keep_alive: u32,
}

impl GenerationRequest {
    pub fn kind(&self) -> SourceKind {
        if self.images.is_some() {
            SourceKind::Image
        } else {
            SourceKind::Web
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
}

/// Builds schema-constrained generation requests.
///
/// Pure: no I/O, and the same payload always yields the same request.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    text_model: String,
    vision_model: String,
    num_ctx: u32,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_TEXT_MODEL, DEFAULT_VISION_MODEL)
    }
}

impl PromptBuilder {
    pub fn new(text_model: impl Into<String>, vision_model: impl Into<String>) -> Self {
        Self {
            text_model: text_model.into(),
            vision_model: vision_model.into(),
            num_ctx: DEFAULT_NUM_CTX,
        }
    }

    pub fn with_num_ctx(mut self, num_ctx: u32) -> Self {
        self.num_ctx = num_ctx;
        self
    }

    pub fn model_for(&self, kind: SourceKind) -> &str {
        match kind {
            SourceKind::Web => &self.text_model,
            SourceKind::Image => &self.vision_model,
        }
    }

    pub fn build(&self, payload: &SourcePayload, grouping_id: i64) -> GenerationRequest {
        match payload {
            SourcePayload::Text(text) => GenerationRequest {
                model: self.text_model.clone(),
                prompt: format!("Dish ID: {grouping_id}\n\nText:\n{text}"),
                system: system_prompt(TEXT_ROLE, TEXT_RULES),
                stream: false,
                format: "json".to_string(),
                images: None,
                options: GenerationOptions {
                    temperature: 0.0,
                    num_ctx: Some(self.num_ctx),
                },
                keep_alive: 0,
            },
            SourcePayload::Image { base64 } => GenerationRequest {
                model: self.vision_model.clone(),
                prompt: format!("Extract recipe for Dish ID {grouping_id}"),
                system: system_prompt(IMAGE_ROLE, IMAGE_RULES),
                stream: false,
                format: "json".to_string(),
                images: Some(vec![base64.clone()]),
                options: GenerationOptions {
                    temperature: 0.0,
                    num_ctx: None,
                },
                keep_alive: 0,
            },
        }
    }
}

fn system_prompt(role: &str, rules: &str) -> String {
    format!(
        "{role} Output JSON per schema: {}. {rules}",
        recipe_schema_string()
    )
}
