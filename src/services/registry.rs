use crate::constants::network::SSH_DEFAULT_PORT;
use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::services::validation::Validation;
use crate::utils::paths::expand_home_path;
use crate::utils::suggest::suggest;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// How a command is handed to the device CLI entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    /// `cli <command>`
    Plain,
    /// `cli '<command>'` with embedded single quotes escaped.
    Quoted,
}

impl InvocationMode {
    fn from_config(obj: &Map<String, Value>) -> Self {
        let explicit = obj
            .get("invocation_mode")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_lowercase());
        if let Some(mode) = explicit {
            return if mode == "quoted" {
                InvocationMode::Quoted
            } else {
                InvocationMode::Plain
            };
        }
        match obj.get("cli_invoke").and_then(|v| v.as_str()) {
            Some(raw) if raw.trim().eq_ignore_ascii_case("cli-quoted") => InvocationMode::Quoted,
            _ => InvocationMode::Plain,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub key_path: Option<PathBuf>,
    pub invocation_mode: InvocationMode,
}

impl ConnectionProfile {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: SSH_DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            key_path: None,
            invocation_mode: InvocationMode::Plain,
        }
    }

    /// Key file to authenticate with, if one is configured and present on disk.
    pub fn usable_key(&self) -> Option<&Path> {
        self.key_path.as_deref().filter(|path| path.is_file())
    }

    pub fn auth_method(&self) -> &'static str {
        if self.usable_key().is_some() {
            "key"
        } else {
            "password"
        }
    }
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("key_path", &self.key_path.as_ref().map(|_| "<redacted>"))
            .field("invocation_mode", &self.invocation_mode)
            .finish()
    }
}

/// Discovery view of a chassis: no password, no key path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeChassisInfo {
    pub host: String,
    pub port: u16,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("No chassis configured. Create the chassis inventory file (see config/chassis.example.json).")]
    Empty,
    #[error("Unknown chassis_id '{id}'. Available: {}", .available.join(", "))]
    NotFound { id: String, available: Vec<String> },
    #[error("Multiple chassis configured ({}). Please specify chassis_id.", .available.join(", "))]
    Ambiguous { available: Vec<String> },
}

impl From<RegistryError> for ToolError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::Empty => ToolError::not_found(message).with_code("NO_CHASSIS"),
            RegistryError::NotFound { id, available } => {
                let mut out = ToolError::not_found(message).with_code("CHASSIS_NOT_FOUND");
                let close = suggest(&id, available.iter().map(String::as_str), 3);
                if !close.is_empty() {
                    out = out.with_hint(format!("Did you mean: {}?", close.join(", ")));
                }
                out.with_details(serde_json::json!({ "available": available }))
            }
            RegistryError::Ambiguous { available } => ToolError::conflict(message)
                .with_code("CHASSIS_AMBIGUOUS")
                .with_details(serde_json::json!({ "available": available })),
        }
    }
}

/// Immutable chassis inventory keyed by chassis id.
#[derive(Debug, Clone, Default)]
pub struct ChassisRegistry {
    entries: BTreeMap<String, ConnectionProfile>,
}

impl ChassisRegistry {
    pub fn new(entries: BTreeMap<String, ConnectionProfile>) -> Self {
        Self { entries }
    }

    /// Reads the inventory file. A missing file yields an empty registry.
    pub fn load(path: &Path, logger: &Logger) -> Result<Self, ToolError> {
        if !path.is_file() {
            logger.warn(
                "chassis inventory not found",
                Some(&serde_json::json!({ "path": path })),
            );
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ToolError::internal(format!("Failed to read chassis inventory: {}", err))
        })?;
        let parsed: Value = serde_json::from_str(&raw).map_err(|err| {
            ToolError::invalid_params(format!("Failed to parse chassis inventory: {}", err))
                .with_hint(format!("Fix the JSON in {}", path.display()))
        })?;
        Ok(Self::from_value(&parsed, logger))
    }

    /// Builds the registry from `{"chassis": {id: {...}}}`. Entries without a
    /// host or with an invalid port are skipped with a warning.
    pub fn from_value(config: &Value, logger: &Logger) -> Self {
        let validation = Validation::new();
        let mut entries = BTreeMap::new();
        let Some(raw) = config.get("chassis").and_then(|v| v.as_object()) else {
            return Self::default();
        };
        for (id, info) in raw {
            let Some(obj) = info.as_object() else {
                logger.warn(
                    "skipping chassis: entry is not an object",
                    Some(&serde_json::json!({ "chassis_id": id })),
                );
                continue;
            };
            let Some(host) = text_field(obj, "host").filter(|h| !h.is_empty()) else {
                logger.warn(
                    "skipping chassis: missing 'host'",
                    Some(&serde_json::json!({ "chassis_id": id })),
                );
                continue;
            };
            let port = match validation.ensure_port(obj.get("port"), SSH_DEFAULT_PORT) {
                Ok(port) => port,
                Err(err) => {
                    logger.warn(
                        "skipping chassis: invalid port",
                        Some(&serde_json::json!({ "chassis_id": id, "error": err.message })),
                    );
                    continue;
                }
            };
            let profile = ConnectionProfile {
                host,
                port,
                username: text_field(obj, "username").unwrap_or_default(),
                password: match obj.get("password") {
                    Some(Value::String(secret)) => secret.clone(),
                    Some(Value::Number(num)) => num.to_string(),
                    _ => String::new(),
                },
                key_path: text_field(obj, "ssh_key")
                    .or_else(|| text_field(obj, "key_path"))
                    .filter(|p| !p.is_empty())
                    .map(expand_home_path),
                invocation_mode: InvocationMode::from_config(obj),
            };
            entries.insert(id.clone(), profile);
        }
        Self { entries }
    }

    pub fn resolve(&self, id: Option<&str>) -> Result<&ConnectionProfile, RegistryError> {
        if self.entries.is_empty() {
            return Err(RegistryError::Empty);
        }
        if let Some(id) = id {
            return self.entries.get(id).ok_or_else(|| RegistryError::NotFound {
                id: id.to_string(),
                available: self.ids(),
            });
        }
        if self.entries.len() == 1 {
            if let Some(profile) = self.entries.values().next() {
                return Ok(profile);
            }
        }
        Err(RegistryError::Ambiguous {
            available: self.ids(),
        })
    }

    pub fn list_safe(&self) -> BTreeMap<String, SafeChassisInfo> {
        self.entries
            .iter()
            .map(|(id, profile)| {
                (
                    id.clone(),
                    SafeChassisInfo {
                        host: profile.host.clone(),
                        port: profile.port,
                        username: profile.username.clone(),
                    },
                )
            })
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}
