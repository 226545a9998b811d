use crate::errors::{ErrorCode, McpError};
use crate::mcp::aliases::builtin_tool_aliases;
use crate::utils::suggest::suggest;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).expect("tool_catalog.json must be valid JSON")
});

static TOOL_MAP: Lazy<HashMap<String, ToolDef>> = Lazy::new(|| {
    TOOL_CATALOG
        .iter()
        .cloned()
        .map(|tool| (tool.name.clone(), tool))
        .collect()
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for tool in TOOL_CATALOG.iter() {
        if let Ok(schema) = JSONSchema::compile(&tool.input_schema) {
            map.insert(tool.name.clone(), schema);
        }
    }
    map
});

pub fn tool_catalog() -> &'static Vec<ToolDef> {
    &TOOL_CATALOG
}

pub fn tool_by_name(name: &str) -> Option<&'static ToolDef> {
    TOOL_MAP.get(name)
}

/// Checks `args` against the tool's input schema. A missing or null
/// argument object is validated as `{}`.
pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), McpError> {
    let (Some(tool), Some(schema)) = (tool_by_name(tool_name), TOOL_VALIDATORS.get(tool_name)) else {
        return Ok(());
    };
    let empty = Value::Object(Default::default());
    let args = if args.is_null() { &empty } else { args };
    if let Err(errors) = schema.validate(args) {
        let message = format_schema_errors(tool_name, args, errors, &tool.input_schema);
        return Err(McpError::new(ErrorCode::InvalidParams, message));
    }
    Ok(())
}

fn format_schema_errors(
    tool_name: &str,
    args: &Value,
    errors: jsonschema::ErrorIterator,
    schema: &Value,
) -> String {
    let known_fields: Vec<String> = schema
        .get("properties")
        .and_then(|v| v.as_object())
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();
    let mut rendered = Vec::new();
    let mut did_you_means = Vec::new();

    for err in errors.take(10) {
        let instance_path = if err.instance_path.to_string().is_empty() {
            "(root)".to_string()
        } else {
            err.instance_path.to_string()
        };
        match &err.kind {
            jsonschema::error::ValidationErrorKind::AdditionalProperties { unexpected } => {
                for unknown in unexpected {
                    rendered.push(format!("{}: unknown field '{}'", instance_path, unknown));
                    let close = suggest(unknown, known_fields.iter().map(String::as_str), 3);
                    if !close.is_empty() {
                        did_you_means.push(format!("field '{}': {}", unknown, close.join(", ")));
                    }
                }
            }
            jsonschema::error::ValidationErrorKind::Required { property } => {
                let prop = property
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| property.to_string());
                rendered.push(format!("{}: missing required field '{}'", instance_path, prop));
            }
            jsonschema::error::ValidationErrorKind::Type { kind } => {
                rendered.push(format!("{}: expected {}", instance_path, format_type_kind(kind)));
            }
            _ => {
                rendered.push(format!("{}: {}", instance_path, err));
            }
        }
    }
    if !args.is_object() && rendered.is_empty() {
        rendered.push("(root): expected object".to_string());
    }

    let mut lines = vec![format!("Invalid arguments for {}", tool_name)];
    lines.extend(rendered.iter().map(|line| format!("- {}", line)));
    if !did_you_means.is_empty() {
        lines.push(format!("Did you mean: {}", did_you_means.join(" | ")));
    }
    lines.join("\n")
}

fn format_type_kind(kind: &jsonschema::error::TypeKind) -> String {
    match kind {
        jsonschema::error::TypeKind::Single(primitive) => primitive.to_string(),
        jsonschema::error::TypeKind::Multiple(types) => {
            let list: Vec<String> = (*types).into_iter().map(|t| t.to_string()).collect();
            if list.is_empty() {
                "unknown".to_string()
            } else {
                list.join(" | ")
            }
        }
    }
}

/// Catalog entries visible to the caller: enabled tools plus an alias entry
/// for each enabled alias target.
pub fn list_tools<F>(is_enabled: F) -> Vec<ToolDef>
where
    F: Fn(&str) -> bool,
{
    let mut tools: Vec<ToolDef> = TOOL_CATALOG
        .iter()
        .filter(|tool| is_enabled(&tool.name))
        .cloned()
        .collect();

    let mut names: HashSet<String> = tools.iter().map(|tool| tool.name.clone()).collect();
    for (alias, target) in builtin_tool_aliases().iter() {
        if names.contains(*alias) {
            continue;
        }
        let Some(target_tool) = tools.iter().find(|tool| tool.name == *target) else {
            continue;
        };
        let entry = ToolDef {
            name: (*alias).to_string(),
            description: format!("Alias for {}.", target),
            input_schema: target_tool.input_schema.clone(),
        };
        tools.push(entry);
        names.insert((*alias).to_string());
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn catalog_schemas_compile() {
        for tool in tool_catalog() {
            assert!(
                TOOL_VALIDATORS.contains_key(&tool.name),
                "schema for {} must compile",
                tool.name
            );
        }
    }

    #[test]
    fn missing_required_field_is_reported() {
        let err = validate_tool_args("run_cli", &json!({})).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert!(err.message.contains("missing required field 'command'"));
    }

    #[test]
    fn unknown_field_gets_suggestion() {
        let err = validate_tool_args("run_cli", &json!({"command": "show version", "chasis_id": "r1"}))
            .unwrap_err();
        assert!(err.message.contains("unknown field 'chasis_id'"));
        assert!(err.message.contains("Did you mean: field 'chasis_id': chassis_id"));
    }

    #[test]
    fn rollback_id_is_bounded() {
        assert!(validate_tool_args("rollback_configuration", &json!({"rollback_id": 49})).is_ok());
        assert!(validate_tool_args("rollback_configuration", &json!({"rollback_id": 50})).is_err());
        assert!(validate_tool_args("rollback_configuration", &Value::Null).is_ok());
    }

    #[test]
    fn list_tools_adds_aliases_only_for_enabled_targets() {
        let tools = list_tools(|name| name == "run_cli" || name == "list_chassis");
        let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
        assert!(names.contains(&"run_cli"));
        assert!(names.contains(&"run_command"));
        assert!(!names.contains(&"get_facts"));
        assert!(!names.contains(&"retrieve_facts"));
    }
}
