use std::path::Path;

use anyhow::Context as _;
use serde_json::Value;

static EMBEDDED_SCHEMA: &str = include_str!("../schemas/recipe.schema.json");

/// First schema violation found in a recipe.
#[derive(Debug, thiserror::Error)]
#[error(
    "recipe validation failed at '{pointer}': {message} (schema rule: {schema_path}; provided value: {value})"
)]
pub struct SchemaError {
    /// JSON pointer into the recipe; `(root)` for the document itself.
    pub pointer: String,
    pub schema_path: String,
    pub message: String,
    pub value: String,
}

pub struct RecipeSchema {
    validator: jsonschema::Validator,
}

impl RecipeSchema {
    /// The schema compiled into the binary, or `override_path` when given.
    pub fn load(override_path: Option<&str>) -> anyhow::Result<Self> {
        match override_path {
            Some(path) => Self::from_file(Path::new(path)),
            None => Self::embedded(),
        }
    }

    pub fn embedded() -> anyhow::Result<Self> {
        let schema: Value =
            serde_json::from_str(EMBEDDED_SCHEMA).context("parse embedded recipe schema")?;
        Self::from_value(&schema)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!("schema file not found: {}", path.display());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read schema: {}", path.display()))?;
        let schema: Value = serde_json::from_str(&raw)
            .with_context(|| format!("parse schema: {}", path.display()))?;
        Self::from_value(&schema)
    }

    fn from_value(schema: &Value) -> anyhow::Result<Self> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|err| anyhow::anyhow!("compile recipe schema: {err}"))?;
        Ok(Self { validator })
    }

    pub fn validate(&self, recipe: &Value) -> Result<(), SchemaError> {
        let Some(err) = self.validator.iter_errors(recipe).next() else {
            return Ok(());
        };

        let pointer = err.instance_path.to_string();
        Err(SchemaError {
            pointer: if pointer.is_empty() {
                "(root)".to_owned()
            } else {
                pointer
            },
            schema_path: err.schema_path.to_string(),
            message: err.to_string(),
            value: err.instance.to_string(),
        })
    }
}
