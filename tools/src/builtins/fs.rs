//! Filesystem tools: read files and list directories within the repository.

use std::fs;

use serde_json::{Value, json};

use piebot_types::{JsonMap, RiskClass};

use super::resolve_under;
use crate::{ToolContext, ToolError, ToolSpec};

const DEFAULT_MAX_READ_BYTES: u64 = 1_000_000;

#[must_use]
pub fn fs_list_dir_spec() -> ToolSpec {
    ToolSpec {
        name: "fs.list_dir",
        risk: RiskClass::Read,
        schema: json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": [],
        }),
        handler: list_dir,
    }
}

#[must_use]
pub fn fs_read_file_spec() -> ToolSpec {
    ToolSpec {
        name: "fs.read_file",
        risk: RiskClass::Read,
        schema: json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "max_bytes": {"type": "integer"},
            },
            "required": ["path"],
        }),
        handler: read_file,
    }
}

fn list_dir(args: &JsonMap, ctx: &ToolContext) -> Result<JsonMap, ToolError> {
    let rel = args.get("path").and_then(Value::as_str).unwrap_or(".");
    let path = resolve_under(&ctx.repo_root, rel)?;
    if !path.exists() {
        return Err(ToolError::NotFound {
            path: rel.to_string(),
        });
    }
    if !path.is_dir() {
        return Err(ToolError::NotADirectory {
            path: rel.to_string(),
        });
    }

    let mut names: Vec<(String, bool, bool)> = Vec::new();
    for entry in fs::read_dir(&path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        names.push((
            entry.file_name().to_string_lossy().into_owned(),
            file_type.is_dir(),
            file_type.is_file(),
        ));
    }
    names.sort_by(|a, b| a.0.cmp(&b.0));

    let items: Vec<Value> = names
        .into_iter()
        .map(|(name, is_dir, is_file)| json!({"name": name, "is_dir": is_dir, "is_file": is_file}))
        .collect();

    let mut out = JsonMap::new();
    out.insert("path".to_string(), json!(rel));
    out.insert("items".to_string(), Value::Array(items));
    Ok(out)
}

fn read_file(args: &JsonMap, ctx: &ToolContext) -> Result<JsonMap, ToolError> {
    let rel = args
        .get("path")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ToolError::bad_args("missing path"))?;
    let max_bytes = args
        .get("max_bytes")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_MAX_READ_BYTES);

    let path = resolve_under(&ctx.repo_root, rel)?;
    if !path.exists() {
        return Err(ToolError::NotFound {
            path: rel.to_string(),
        });
    }
    if path.is_dir() {
        return Err(ToolError::IsADirectory {
            path: rel.to_string(),
        });
    }

    let size = fs::metadata(&path)?.len();
    if size > max_bytes {
        return Err(ToolError::TooLarge {
            size,
            max: max_bytes,
        });
    }

    let text = String::from_utf8_lossy(&fs::read(&path)?).into_owned();

    let mut out = JsonMap::new();
    out.insert("path".to_string(), json!(rel));
    out.insert("size".to_string(), json!(size));
    out.insert("text".to_string(), json!(text));
    Ok(out)
}
