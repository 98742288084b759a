use std::sync::Arc;

use jsonschema::Validator;
use serde_json::Value;

use crate::error::AppError;
use crate::models::StructuredRecipe;
use crate::schema::recipe_schema_json;
use crate::util::truncate_chars;

/// Maximum number of characters of raw model output kept in a decode error.
pub const RAW_PREVIEW_CHARS: usize = 512;

/// Parses generated text and validates it against the recipe schema.
///
/// The only coercion applied is turning numeric `quantity` values into
/// strings, since generation services emit either.
#[derive(Clone)]
pub struct RecipeDecoder {
    validator: Arc<Validator>,
}

impl RecipeDecoder {
    pub fn new() -> Result<Self, AppError> {
        let validator = jsonschema::validator_for(recipe_schema_json())
            .map_err(|e| AppError::ConfigError(format!("Invalid recipe schema: {e}")))?;
        Ok(Self {
            validator: Arc::new(validator),
        })
    }

    /// Decode a complete recipe, including its `groupingId`.
    pub fn decode(&self, raw: &str) -> Result<StructuredRecipe, AppError> {
        let value = parse(raw)?;
        self.validate(value, raw)
    }

    /// Decode a recipe generated for `grouping_id`.
    ///
    /// Whatever grouping id the model wrote (if any) is replaced, so the
    /// caller's id always reaches the result unchanged.
    pub fn decode_for_group(
        &self,
        raw: &str,
        grouping_id: i64,
    ) -> Result<StructuredRecipe, AppError> {
        let mut value = parse(raw)?;
        if let Some(object) = value.as_object_mut() {
            if let Some(previous) = object.insert("groupingId".to_string(), grouping_id.into()) {
                if previous != Value::from(grouping_id) {
                    tracing::debug!(%previous, grouping_id, "Overriding generated groupingId");
                }
            }
        }
        self.validate(value, raw)
    }

    fn validate(&self, mut value: Value, raw: &str) -> Result<StructuredRecipe, AppError> {
        normalize_quantities(&mut value);

        let violations: Vec<String> = self
            .validator
            .iter_errors(&value)
            .map(|e| e.to_string())
            .collect();
        if !violations.is_empty() {
            return Err(decode_error(
                format!("schema mismatch: {}", violations.join("; ")),
                raw,
            ));
        }

        serde_json::from_value(value)
            .map_err(|e| decode_error(format!("schema mismatch: {e}"), raw))
    }
}

fn parse(raw: &str) -> Result<Value, AppError> {
    serde_json::from_str(raw.trim()).map_err(|e| decode_error(format!("invalid JSON: {e}"), raw))
}

fn decode_error(message: String, raw: &str) -> AppError {
    AppError::DecodeError {
        message,
        raw: truncate_chars(raw, RAW_PREVIEW_CHARS),
    }
}

/// Rewrite numeric `components[*].ingredients[*].quantity` values as strings.
///
/// Anything that is not shaped like a recipe is left alone for the
/// validator to reject.
pub fn normalize_quantities(value: &mut Value) {
    let Some(components) = value.get_mut("components").and_then(Value::as_array_mut) else {
        return;
    };

    for component in components {
        let Some(ingredients) = component
            .get_mut("ingredients")
            .and_then(Value::as_array_mut)
        else {
            continue;
        };
        for ingredient in ingredients {
            if let Some(Value::Number(n)) = ingredient.get("quantity") {
                let quantity = n.to_string();
                ingredient["quantity"] = Value::String(quantity);
            }
        }
    }
}
