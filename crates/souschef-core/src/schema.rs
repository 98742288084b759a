use std::sync::LazyLock;

use serde_json::{Map, Value, json};

/// A node in the static recipe schema.
///
/// Deliberately small: only the JSON Schema keywords the recipe contract
/// needs. Every object property is required.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Object {
        title: &'static str,
        properties: Vec<(&'static str, SchemaNode)>,
    },
    Array {
        items: Box<SchemaNode>,
        min_items: Option<u64>,
    },
    String {
        min_length: Option<u64>,
    },
    Integer {
        minimum: Option<i64>,
    },
}

impl SchemaNode {
    fn string() -> Self {
        SchemaNode::String { min_length: None }
    }

    fn non_empty_string() -> Self {
        SchemaNode::String {
            min_length: Some(1),
        }
    }

    fn array_of(items: SchemaNode) -> Self {
        SchemaNode::Array {
            items: Box::new(items),
            min_items: None,
        }
    }

    /// Render this node as a JSON Schema value.
    pub fn to_json(&self) -> Value {
        match self {
            SchemaNode::Object { title, properties } => {
                let mut props = Map::new();
                for (name, node) in properties {
                    props.insert((*name).to_string(), node.to_json());
                }
                let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();
                json!({
                    "title": title,
                    "type": "object",
                    "properties": props,
                    "required": required,
                })
            }
            SchemaNode::Array { items, min_items } => {
                let mut node = json!({ "type": "array", "items": items.to_json() });
                if let Some(min) = min_items {
                    node["minItems"] = json!(min);
                }
                node
            }
            SchemaNode::String { min_length } => {
                let mut node = json!({ "type": "string" });
                if let Some(min) = min_length {
                    node["minLength"] = json!(min);
                }
                node
            }
            SchemaNode::Integer { minimum } => {
                let mut node = json!({ "type": "integer" });
                if let Some(min) = minimum {
                    node["minimum"] = json!(min);
                }
                node
            }
        }
    }
}

fn instruction_schema() -> SchemaNode {
    SchemaNode::Object {
        title: "Instruction",
        properties: vec![
            ("step", SchemaNode::Integer { minimum: Some(1) }),
            ("text", SchemaNode::non_empty_string()),
        ],
    }
}

fn ingredient_schema() -> SchemaNode {
    SchemaNode::Object {
        title: "Ingredient",
        properties: vec![
            ("name", SchemaNode::non_empty_string()),
            ("quantity", SchemaNode::string()),
            ("unit", SchemaNode::string()),
        ],
    }
}

fn component_schema() -> SchemaNode {
    SchemaNode::Object {
        title: "Component",
        properties: vec![
            ("name", SchemaNode::string()),
            ("instructions", SchemaNode::array_of(instruction_schema())),
            ("ingredients", SchemaNode::array_of(ingredient_schema())),
        ],
    }
}

/// The structured recipe contract, as a typed tree.
pub fn recipe_schema() -> SchemaNode {
    SchemaNode::Object {
        title: "StructuredRecipe",
        properties: vec![
            ("groupingId", SchemaNode::Integer { minimum: None }),
            ("name", SchemaNode::non_empty_string()),
            (
                "components",
                SchemaNode::Array {
                    items: Box::new(component_schema()),
                    min_items: Some(1),
                },
            ),
        ],
    }
}

static RECIPE_SCHEMA_JSON: LazyLock<Value> = LazyLock::new(|| recipe_schema().to_json());

static RECIPE_SCHEMA_STRING: LazyLock<String> =
    LazyLock::new(|| RECIPE_SCHEMA_JSON.to_string());

/// The recipe schema as a JSON value (used for validation).
pub fn recipe_schema_json() -> &'static Value {
    &RECIPE_SCHEMA_JSON
}

/// The recipe schema as a compact JSON string (embedded in prompts).
///
/// Stable across calls and processes: the tree is static and rendered
/// in a fixed order.
pub fn recipe_schema_string() -> &'static str {
    &RECIPE_SCHEMA_STRING
}
