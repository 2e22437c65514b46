//! File editing tool with multiple operation modes
//!
//! Provides intuitive search-and-replace operations designed for LLM usage.
//! Supports: replace, insert_before, insert_after, delete, append, prepend.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::Path;

use super::{BoxFuture, ToolProvider};

#[derive(Clone)]
pub struct EditorEditTool;

impl EditorEditTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EditorEditTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct BasicEditRequest {
    file_path: String,
    edits: Vec<BasicEdit>,
}

#[derive(Debug, Deserialize)]
struct BasicEdit {
    old_text: String,
    new_text: String,
    #[serde(default)]
    replace_all: bool,
}

#[derive(Debug, Deserialize)]
struct ExtendedEditRequest {
    file_path: String,
    operation: Operation,
    #[serde(default)]
    anchor: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
enum Operation {
    Replace,
    InsertBefore,
    InsertAfter,
    Delete,
    Append,
    Prepend,
}

impl ToolProvider for EditorEditTool {
    fn name(&self) -> &str {
        "editor__Edit"
    }

    fn brief(&self) -> &str {
        "Edit text files, insert text, delete text, replace text."
    }

    fn full_description(&self) -> String {
        r#"
# Editor Edit
Edit files using intuitive search-and-replace operations.
Designed for LLM usage - no regex, no escape sequences, just literal text matching.

## Key Rules
- `old_text` must match EXACTLY (whitespace, indentation matter)
- `old_text` must appear exactly ONCE in the file (for safety), unless `replace_all` is set to true
- Include enough context lines to ensure uniqueness
- No regex - literal text matching only

## How to Use

1. Multiple Replacements:
Use case: Renaming functions, updating strings, fixing typos across a file.
```
{"file_path": "...", "edits": [{"old_text": "...", "new_text": "..."}]}
```

2. Anchor-based Operations:
Use case: Inserting new code before/after an existing line, deleting a block,
appending or prepending content.
```
{"file_path": "...", "operation": "insert_after", "anchor": "...", "content": "..."}
```
"#
        .to_string()
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute path to the file to edit"
                },
                "edits": {
                    "type": "array",
                    "description": "List of edit operations (basic mode)",
                    "items": {
                        "type": "object",
                        "properties": {
                            "old_text": {
                                "type": "string",
                                "description": "Exact text to find (must be unique unless replace_all is true)"
                            },
                            "new_text": {
                                "type": "string",
                                "description": "Text to replace with (empty string to delete)"
                            },
                            "replace_all": {
                                "type": "boolean",
                                "description": "If true, replace all occurrences. If false (default), old_text must be unique.",
                                "default": false
                            }
                        },
                        "required": ["old_text", "new_text"]
                    }
                },
                "operation": {
                    "type": "string",
                    "enum": ["replace", "insert_before", "insert_after", "delete", "append", "prepend"],
                    "description": "Operation type for extended mode"
                },
                "anchor": {
                    "type": "string",
                    "description": "Text to locate (for replace/insert/delete operations)"
                },
                "content": {
                    "type": "string",
                    "description": "New content (for replace/insert/append/prepend operations)"
                }
            },
            "required": ["file_path"],
            "oneOf": [
                {"required": ["edits"], "description": "Basic mode: multiple search-and-replace edits"},
                {"required": ["operation"], "description": "Extended mode: single operation with anchor/content"}
            ]
        })
    }

    fn display(&self, arguments: &serde_json::Value) -> String {
        let path = arguments.get("file_path").and_then(|v| v.as_str()).unwrap_or("<unknown>");
        format!("Edit file: {}", path)
    }

    fn execute<'a>(&'a self, arguments: serde_json::Value) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            if let Ok(request) = serde_json::from_value::<BasicEditRequest>(arguments.clone()) {
                return execute_basic_edits(&request).await;
            }
            if let Ok(request) = serde_json::from_value::<ExtendedEditRequest>(arguments) {
                return execute_extended_operation(&request).await;
            }
            Err("Invalid request format. Must provide either 'edits' array (basic mode) or 'operation' field (extended mode).".to_string())
        })
    }
}

async fn execute_basic_edits(request: &BasicEditRequest) -> Result<String, String> {
    let file_path = Path::new(&request.file_path);
    let mut content = fs::read_to_string(file_path)
        .map_err(|e| format!("Failed to read file '{}': {}", request.file_path, e))?;

    let mut edits_applied = 0;
    let mut total_replacements = 0;

    for (idx, edit) in request.edits.iter().enumerate() {
        let count = content.matches(&edit.old_text).count();

        if count == 0 {
            return Err(format!(
                "Edit #{}: old_text not found in file.\nSearching for:\n{}\n",
                idx + 1,
                edit.old_text
            ));
        }

        if !edit.replace_all && count > 1 {
            return Err(format!(
                "Edit #{}: old_text appears {} times (must be unique).\nSearching for:\n{}\n\nInclude more context to make it unique, or set replace_all: true.",
                idx + 1,
                count,
                edit.old_text
            ));
        }

        content = content.replace(&edit.old_text, &edit.new_text);
        edits_applied += 1;
        total_replacements += count;
    }

    fs::write(file_path, &content).map_err(|e| format!("Failed to write file '{}': {}", request.file_path, e))?;

    Ok(format!(
        "Successfully applied {} edit(s) ({} replacement(s)) to '{}'",
        edits_applied, total_replacements, request.file_path
    ))
}

async fn execute_extended_operation(request: &ExtendedEditRequest) -> Result<String, String> {
    let file_path = Path::new(&request.file_path);

    match request.operation {
        Operation::Append => {
            let mut content = fs::read_to_string(file_path)
                .map_err(|e| format!("Failed to read file '{}': {}", request.file_path, e))?;
            content.push_str(&request.content);
            fs::write(file_path, &content).map_err(|e| format!("Failed to write file '{}': {}", request.file_path, e))?;
            Ok(format!("Successfully appended {} bytes to '{}'", request.content.len(), request.file_path))
        }
        Operation::Prepend => {
            let content = fs::read_to_string(file_path)
                .map_err(|e| format!("Failed to read file '{}': {}", request.file_path, e))?;
            let new_content = format!("{}{}", request.content, content);
            fs::write(file_path, &new_content).map_err(|e| format!("Failed to write file '{}': {}", request.file_path, e))?;
            Ok(format!("Successfully prepended {} bytes to '{}'", request.content.len(), request.file_path))
        }
        Operation::Replace | Operation::InsertBefore | Operation::InsertAfter | Operation::Delete => {
            if request.anchor.is_empty() {
                return Err(format!("Operation '{:?}' requires 'anchor' field", request.operation));
            }

            let content = fs::read_to_string(file_path)
                .map_err(|e| format!("Failed to read file '{}': {}", request.file_path, e))?;

            let count = content.matches(&request.anchor).count();
            if count == 0 {
                return Err(format!("Anchor not found in file.\nSearching for:\n{}\n", request.anchor));
            }
            if count > 1 {
                return Err(format!(
                    "Anchor appears {} times (must be unique).\nSearching for:\n{}\n\nInclude more context to make it unique.",
                    count, request.anchor
                ));
            }

            let new_content = match request.operation {
                Operation::Replace => content.replace(&request.anchor, &request.content),
                Operation::InsertBefore => content.replace(&request.anchor, &format!("{}{}", request.content, request.anchor)),
                Operation::InsertAfter => content.replace(&request.anchor, &format!("{}{}", request.anchor, request.content)),
                Operation::Delete => content.replace(&request.anchor, ""),
                _ => unreachable!(),
            };

            fs::write(file_path, &new_content).map_err(|e| format!("Failed to write file '{}': {}", request.file_path, e))?;
            Ok(format!("Successfully applied {:?} operation to '{}'", request.operation, request.file_path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn basic_replace_updates_file_contents() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "Hello, world!\n").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let request = BasicEditRequest {
            file_path: path.clone(),
            edits: vec![BasicEdit {
                old_text: "world".to_string(),
                new_text: "Rust".to_string(),
                replace_all: false,
            }],
        };

        let result = execute_basic_edits(&request).await;
        assert!(result.is_ok(), "Edit should succeed: {:?}", result);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Hello, Rust!\n");
    }

    #[tokio::test]
    async fn non_unique_old_text_is_rejected_without_replace_all() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "a a a\n").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let request = BasicEditRequest {
            file_path: path,
            edits: vec![BasicEdit {
                old_text: "a".to_string(),
                new_text: "b".to_string(),
                replace_all: false,
            }],
        };

        let err = execute_basic_edits(&request).await.unwrap_err();
        assert!(err.contains("must be unique"));
    }

    #[tokio::test]
    async fn insert_after_anchor() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "line one\nline two\n").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let request = ExtendedEditRequest {
            file_path: path.clone(),
            operation: Operation::InsertAfter,
            anchor: "line one\n".to_string(),
            content: "inserted\n".to_string(),
        };

        execute_extended_operation(&request).await.unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "line one\ninserted\nline two\n");
    }

    #[tokio::test]
    async fn execute_dispatches_basic_mode_from_tool_provider() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "target\n").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();

        let tool = EditorEditTool::new();
        let args = json!({
            "file_path": path,
            "edits": [{"old_text": "target", "new_text": "replaced"}]
        });
        let result = tool.execute(args).await;
        assert!(result.is_ok());
        assert_eq!(fs::read_to_string(&path).unwrap(), "replaced\n");
    }
}
