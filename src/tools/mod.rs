//! The tool seam: `ToolProvider` is what a concrete tool implements,
//! `ToolRegistry` is what the run loop dispatches through. Argument
//! coercion (string-typed JSON from a model into the types a tool's schema
//! declares) happens once, here, before a tool ever sees its arguments.

pub mod bash;
pub mod edit;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::error::ToolError;
use crate::llm::{ToolCall, ToolSchema};

pub use bash::BashTool;
pub use edit::EditorEditTool;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A single tool a model can invoke. `requires_approval` gates whether the
/// run loop must get a human yes/no before `execute` runs; `display` is
/// the human-readable summary shown at that approval prompt.
pub trait ToolProvider: Send + Sync {
    fn name(&self) -> &str;

    fn brief(&self) -> &str;

    fn full_description(&self) -> String {
        self.brief().to_string()
    }

    fn parameters(&self) -> serde_json::Value;

    fn requires_approval(&self) -> bool {
        true
    }

    fn display(&self, arguments: &serde_json::Value) -> String {
        format!("{}({})", self.name(), arguments)
    }

    fn execute<'a>(&'a self, arguments: serde_json::Value) -> BoxFuture<'a, Result<String, String>>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.full_description(),
            parameters: self.parameters(),
        }
    }
}

/// Converts a raw JSON argument value to the type its schema declares.
/// Unrecognized types, and values that are already the right shape, pass
/// through unchanged; conversion failures fall back to the original value
/// rather than erroring, since a best-effort coercion followed by the
/// tool's own validation is more forgiving than rejecting a call outright.
pub fn convert_data(data: serde_json::Value, schema: &serde_json::Value) -> serde_json::Value {
    let schema_type = schema.get("type").and_then(|t| t.as_str());
    match schema_type {
        Some("object") => convert_object(data, schema),
        Some("array") => convert_array(data, schema),
        _ => convert_basic_type(data, schema_type),
    }
}

fn convert_basic_type(data: serde_json::Value, schema_type: Option<&str>) -> serde_json::Value {
    use serde_json::Value;
    match schema_type {
        Some("integer") => match &data {
            Value::Number(n) => n
                .as_i64()
                .map(|i| Value::Number(i.into()))
                .unwrap_or(data),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|i| Value::Number(i.into()))
                .unwrap_or(data),
            _ => data,
        },
        Some("number") => match &data {
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(data),
            _ => data,
        },
        Some("boolean") => match &data {
            Value::String(s) => {
                let lower = s.to_lowercase();
                Value::Bool(matches!(lower.as_str(), "true" | "1" | "t" | "yes"))
            }
            _ => data,
        },
        Some("string") => match &data {
            Value::String(_) => data,
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            _ => data,
        },
        _ => data,
    }
}

fn convert_array(data: serde_json::Value, schema: &serde_json::Value) -> serde_json::Value {
    let items_schema = schema.get("items").cloned().unwrap_or(serde_json::json!({}));
    match data {
        serde_json::Value::Array(items) => serde_json::Value::Array(
            items
                .into_iter()
                .map(|item| convert_data(item, &items_schema))
                .collect(),
        ),
        other => other,
    }
}

fn convert_object(data: serde_json::Value, schema: &serde_json::Value) -> serde_json::Value {
    let properties = schema.get("properties").cloned().unwrap_or(serde_json::json!({}));
    match data {
        serde_json::Value::Object(map) => {
            let mut converted = serde_json::Map::new();
            for (key, value) in map {
                if let Some(prop_schema) = properties.get(&key) {
                    converted.insert(key, convert_data(value, prop_schema));
                } else {
                    converted.insert(key, value);
                }
            }
            serde_json::Value::Object(converted)
        }
        other => other,
    }
}

/// Holds every tool available to an agent and dispatches calls by name,
/// coercing arguments against each tool's declared schema first.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn ToolProvider>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tool` under its declared name. At most one tool may own a
    /// given name; registering a second one under the same name is a
    /// programmer error, not a runtime condition to recover from.
    ///
    /// # Panics
    ///
    /// Panics if a tool with the same name is already registered.
    pub fn register(&mut self, tool: Box<dyn ToolProvider>) {
        match self.tools.entry(tool.name().to_string()) {
            Entry::Occupied(entry) => {
                panic!("tool '{}' is already registered", entry.key());
            }
            Entry::Vacant(entry) => {
                entry.insert(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolProvider> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn requires_approval(&self, name: &str) -> bool {
        self.tools.get(name).map(|t| t.requires_approval()).unwrap_or(true)
    }

    /// Coerces `call`'s raw JSON argument text against the tool's schema
    /// and runs it. Any panic-free failure inside the tool becomes an
    /// `Execution` error; a schema/JSON problem becomes a `Parameter` error.
    /// Returns `Ok(None)` if no tool by that name is registered.
    pub async fn dispatch(&self, call: &ToolCall) -> Option<Result<String, ToolError>> {
        let tool = self.tools.get(&call.function.name)?;

        let raw: serde_json::Value = match call.parsed_arguments() {
            Ok(v) => v,
            Err(e) => {
                return Some(Err(ToolError::parameter(
                    &call.function.name,
                    format!("invalid JSON arguments: {}", e),
                )))
            }
        };

        let coerced = convert_data(raw, &tool.parameters());

        match tool.execute(coerced).await {
            Ok(output) => Some(Ok(output)),
            Err(message) => Some(Err(ToolError::execution(&call.function.name, message))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "bash' is already registered")]
    fn registering_a_duplicate_name_panics() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(crate::tools::bash::BashTool::new()));
        registry.register(Box::new(crate::tools::bash::BashTool::new()));
    }

    #[test]
    fn converts_string_integer_to_number() {
        let schema = serde_json::json!({"type": "integer"});
        let out = convert_data(serde_json::json!("42"), &schema);
        assert_eq!(out, serde_json::json!(42));
    }

    #[test]
    fn converts_case_insensitive_boolean_strings() {
        let schema = serde_json::json!({"type": "boolean"});
        for input in ["true", "TRUE", "1", "t", "yes", "Yes"] {
            assert_eq!(
                convert_data(serde_json::json!(input), &schema),
                serde_json::json!(true)
            );
        }
        assert_eq!(
            convert_data(serde_json::json!("false"), &schema),
            serde_json::json!(false)
        );
    }

    #[test]
    fn recurses_into_nested_objects_and_arrays() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "counts": {
                    "type": "array",
                    "items": {"type": "integer"}
                }
            }
        });
        let data = serde_json::json!({"counts": ["1", "2", "3"], "extra": "kept"});
        let out = convert_data(data, &schema);
        assert_eq!(out["counts"], serde_json::json!([1, 2, 3]));
        assert_eq!(out["extra"], serde_json::json!("kept"));
    }

    #[test]
    fn unconvertible_value_falls_back_unchanged() {
        let schema = serde_json::json!({"type": "integer"});
        let out = convert_data(serde_json::json!("not a number"), &schema);
        assert_eq!(out, serde_json::json!("not a number"));
    }
}
