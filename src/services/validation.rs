use crate::constants::limits::{MAX_PORT, MIN_PORT};
use crate::errors::ToolError;
use serde_json::Value;

#[derive(Clone)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(
        &self,
        value: &Value,
        label: &str,
        trim: bool,
    ) -> Result<String, ToolError> {
        let text = value.as_str().ok_or_else(|| {
            ToolError::invalid_params(format!("{} must be a non-empty string", label))
        })?;
        let normalized = text.trim();
        if normalized.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be non-empty.",
                label
            )));
        }
        if normalized.contains('\0') {
            return Err(ToolError::invalid_params(format!(
                "{} must not contain null bytes",
                label
            )));
        }
        Ok(if trim {
            normalized.to_string()
        } else {
            text.to_string()
        })
    }

    /// Null, missing and blank strings all mean "not provided".
    pub fn ensure_optional_string(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<String>, ToolError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
            Some(val) => self.ensure_string(val, label, true).map(Some),
        }
    }

    pub fn ensure_port(
        &self,
        value: Option<&Value>,
        fallback: u16,
    ) -> Result<u16, ToolError> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(fallback);
        };
        let numeric = value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
            .ok_or_else(port_error)?;
        if numeric < MIN_PORT as i64 || numeric > MAX_PORT as i64 {
            return Err(port_error());
        }
        Ok(numeric as u16)
    }

    pub fn read_int(
        &self,
        value: Option<&Value>,
        label: &str,
        default: i64,
    ) -> Result<i64, ToolError> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(default);
        };
        value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
            .ok_or_else(|| ToolError::invalid_params(format!("{} must be an integer", label)))
    }

    pub fn read_optional_int(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<i64>, ToolError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.read_int(value, label, 0).map(Some),
        }
    }

    pub fn read_bool(
        &self,
        value: Option<&Value>,
        label: &str,
        default: bool,
    ) -> Result<bool, ToolError> {
        match value {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(Value::String(text)) => match text.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ToolError::invalid_params(format!("{} must be a boolean", label))),
            },
            Some(_) => Err(ToolError::invalid_params(format!("{} must be a boolean", label))),
        }
    }

    /// Case-insensitive pick from a closed set of values.
    pub fn ensure_choice(
        &self,
        value: Option<&Value>,
        label: &str,
        choices: &[&str],
        default: &str,
    ) -> Result<String, ToolError> {
        let Some(raw) = self.ensure_optional_string(value, label)? else {
            return Ok(default.to_string());
        };
        let normalized = raw.to_lowercase();
        if choices.contains(&normalized.as_str()) {
            return Ok(normalized);
        }
        Err(ToolError::invalid_params(format!(
            "{} must be one of: {}",
            label,
            choices.join(", ")
        )))
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}

fn port_error() -> ToolError {
    ToolError::invalid_params(format!(
        "Port must be an integer between {} and {}",
        MIN_PORT, MAX_PORT
    ))
}
