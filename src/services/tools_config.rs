use crate::errors::ToolError;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

/// Operator switches from the tools file: which tools are exposed and which
/// free-form commands `run_cli` may send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolsConfig {
    pub allowed_tools: BTreeSet<String>,
    pub allowed_ssh_commands: Vec<String>,
}

impl ToolsConfig {
    pub fn load(path: &Path) -> Result<Self, ToolError> {
        if !path.is_file() {
            return Err(ToolError::not_found(format!(
                "Tools config not found at {}",
                path.display()
            ))
            .with_code("TOOLS_CONFIG_MISSING")
            .with_hint(
                "Create it (see config/tools.example.json) or point CHASSIS_TOOLS_CONFIG_PATH at it.",
            ));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|err| ToolError::internal(format!("Failed to read tools config: {}", err)))?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|err| {
            ToolError::invalid_params(format!("Failed to parse tools config: {}", err))
        })?;
        Ok(Self::from_value(&parsed))
    }

    /// `allowed_tools` may be a list of names or a `{name: bool}` map.
    pub fn from_value(config: &Value) -> Self {
        let allowed_tools = match config.get("allowed_tools") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::Object(map)) => map
                .iter()
                .filter(|(_, enabled)| enabled.as_bool().unwrap_or(false))
                .map(|(name, _)| name.clone())
                .collect(),
            _ => BTreeSet::new(),
        };
        let allowed_ssh_commands = config
            .get("allowed_ssh_commands")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            allowed_tools,
            allowed_ssh_commands,
        }
    }

    pub fn is_tool_enabled(&self, name: &str) -> bool {
        self.allowed_tools.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn allowed_tools_accepts_list_or_map() {
        let listed = ToolsConfig::from_value(&json!({"allowed_tools": ["run_cli", "get_facts"]}));
        assert!(listed.is_tool_enabled("run_cli"));
        assert!(!listed.is_tool_enabled("add_software"));

        let mapped = ToolsConfig::from_value(&json!({
            "allowed_tools": {"run_cli": true, "add_software": false}
        }));
        assert!(mapped.is_tool_enabled("run_cli"));
        assert!(!mapped.is_tool_enabled("add_software"));
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let cfg = ToolsConfig::from_value(&json!({"allowed_tools": null}));
        assert!(cfg.allowed_tools.is_empty());
        assert!(cfg.allowed_ssh_commands.is_empty());
    }

    #[test]
    fn missing_file_is_an_error_with_hint() {
        let path = std::env::temp_dir().join(format!("tools-{}.json", uuid::Uuid::new_v4()));
        let err = ToolsConfig::load(&path).unwrap_err();
        assert_eq!(err.code, "TOOLS_CONFIG_MISSING");
        assert!(err.hint.is_some());
    }
}
