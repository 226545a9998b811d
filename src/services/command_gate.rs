use crate::errors::ToolError;
use crate::services::logger::Logger;
use regex::Regex;

/// Allowlist for caller-supplied CLI commands.
///
/// A command passes when at least one pattern matches starting at the first
/// character of the trimmed command. The match does not have to cover the
/// whole command, so `show .*` admits every `show` variant.
#[derive(Debug, Clone, Default)]
pub struct CommandGate {
    patterns: Vec<Regex>,
}

impl CommandGate {
    /// Compiles each pattern anchored at the start. Patterns that fail to
    /// compile are dropped with a warning and never widen the allowlist.
    pub fn compile<S: AsRef<str>>(sources: &[S], logger: &Logger) -> Self {
        let mut patterns = Vec::with_capacity(sources.len());
        for source in sources {
            let source = source.as_ref();
            match Regex::new(&format!("^(?:{})", source)) {
                Ok(regex) => patterns.push(regex),
                Err(err) => logger.warn(
                    "invalid allowed_ssh_commands pattern skipped",
                    Some(&serde_json::json!({ "pattern": source, "error": err.to_string() })),
                ),
            }
        }
        Self { patterns }
    }

    pub fn is_allowed(&self, command: &str) -> bool {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.patterns.iter().any(|pattern| pattern.is_match(trimmed))
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn denial(&self) -> ToolError {
        ToolError::denied(
            "command is not allowed by the configured allowlist (allowed_ssh_commands in the tools config). \
             Only commands matching one of the regex patterns are permitted.",
        )
        .with_code("COMMAND_NOT_ALLOWED")
        .with_hint(
            "Patterns match from the start of the command; e.g. \"show .*\" permits any command beginning with \"show \".",
        )
    }
}
