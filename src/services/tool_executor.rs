use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use crate::constants::limits::{AUDIT_ARG_BYTES, RESULT_PREVIEW_BYTES};
use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::utils::redact::redact_object;
use crate::utils::suggest::suggest;
use crate::utils::text::preview;

use serde_json::Value;

/// Text handed back to the caller, flagged when it reports a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

impl From<ToolError> for ToolOutput {
    fn from(err: ToolError) -> Self {
        ToolOutput::error(err.render())
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<ToolOutput, ToolError>;
}

#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
    enabled: Arc<BTreeSet<String>>,
    alias_map: HashMap<String, String>,
}

impl ToolExecutor {
    pub fn new(
        logger: Logger,
        handlers: HashMap<String, Arc<dyn ToolHandler>>,
        enabled: BTreeSet<String>,
        alias_map: HashMap<String, String>,
    ) -> Self {
        Self {
            logger: logger.child("executor"),
            handlers: Arc::new(handlers),
            enabled: Arc::new(enabled),
            alias_map,
        }
    }

    pub fn resolve_name<'a>(&'a self, tool: &'a str) -> &'a str {
        if self.handlers.contains_key(tool) {
            return tool;
        }
        self.alias_map.get(tool).map(String::as_str).unwrap_or(tool)
    }

    pub fn is_enabled(&self, tool: &str) -> bool {
        let resolved = self.resolve_name(tool);
        self.handlers.contains_key(resolved) && self.enabled.contains(resolved)
    }

    /// Callable names, canonical and aliased, sorted.
    pub fn callable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .keys()
            .chain(self.alias_map.keys())
            .filter(|name| self.is_enabled(name))
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn unknown_tool(&self, tool: &str) -> ToolError {
        let candidates = self.callable_names();
        let suggestions = suggest(tool, candidates.iter().map(String::as_str), 5);
        let hint = if suggestions.is_empty() {
            "Call tools/list to see the available tools".to_string()
        } else {
            format!("Did you mean: {}", suggestions.join(", "))
        };
        ToolError::invalid_params(format!("Unknown tool: {}", tool))
            .with_code("UNKNOWN_TOOL")
            .with_hint(hint)
    }

    /// Looks up the handler, refusing unknown and disabled tools.
    pub fn handler_for(&self, tool: &str) -> Result<(&str, Arc<dyn ToolHandler>), ToolError> {
        let Some((resolved, handler)) = self.handlers.get_key_value(self.resolve_name(tool)) else {
            return Err(self.unknown_tool(tool));
        };
        let resolved = resolved.as_str();
        if !self.enabled.contains(resolved) {
            return Err(ToolError::denied(format!("Tool '{}' is disabled", resolved))
                .with_code("TOOL_DISABLED")
                .with_hint("Enable it under allowed_tools in the tools config."));
        }
        Ok((resolved, handler.clone()))
    }

    /// Runs the tool. Only unknown or disabled tools surface as `Err`; every
    /// failure inside a handler is rendered into an error-flagged output.
    pub async fn execute(&self, tool: &str, args: Value) -> Result<ToolOutput, ToolError> {
        let (resolved, handler) = self.handler_for(tool)?;
        let trace_id = uuid::Uuid::new_v4().to_string();
        let invoked_as = (resolved != tool).then_some(tool);
        self.logger.info(
            "TOOL CALL",
            Some(&serde_json::json!({
                "tool": resolved,
                "invoked_as": invoked_as,
                "trace_id": trace_id,
                "args": audit_args(&args),
            })),
        );

        let started = Instant::now();
        let output = match handler.handle(args).await {
            Ok(output) => output,
            Err(err) => {
                self.logger.warn(
                    "TOOL ERROR",
                    Some(&serde_json::json!({
                        "tool": resolved,
                        "trace_id": trace_id,
                        "kind": err.kind,
                        "code": err.code,
                        "message": err.message,
                    })),
                );
                ToolOutput::from(err)
            }
        };

        self.logger.info(
            "TOOL RESULT",
            Some(&serde_json::json!({
                "tool": resolved,
                "trace_id": trace_id,
                "is_error": output.is_error,
                "duration_ms": started.elapsed().as_millis() as u64,
                "output_len": output.text.len(),
                "output_preview": preview(&output.text, RESULT_PREVIEW_BYTES),
            })),
        );
        Ok(output)
    }
}

/// Log view of tool arguments: config bodies reduced to a line count, the
/// rest redacted and capped.
pub fn audit_args(args: &Value) -> Value {
    let mut cleaned = args.clone();
    if let Value::Object(map) = &mut cleaned {
        if let Some(Value::String(config)) = map.get("config_text") {
            let summary = format!("[config:{} lines]", config.lines().count());
            map.insert("config_text".to_string(), Value::String(summary));
        }
    }
    redact_object(&cleaned, AUDIT_ARG_BYTES)
}
