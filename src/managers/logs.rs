use crate::constants::logs::{DEFAULT_FILENAME, DEFAULT_MAX_LINES, DEFAULT_PAGE_SIZE};
use crate::errors::ToolError;
use crate::services::log_window::{parse_user_timestamp, LogWindowQuery, LogWindowService};
use crate::services::logger::Logger;
use crate::services::tool_executor::{ToolHandler, ToolOutput};
use crate::services::validation::Validation;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct LogManager {
    logger: Logger,
    validation: Validation,
    service: Arc<LogWindowService>,
}

impl LogManager {
    pub fn new(logger: Logger, validation: Validation, service: Arc<LogWindowService>) -> Self {
        Self {
            logger: logger.child("logs"),
            validation,
            service,
        }
    }

    pub fn parse_query(&self, args: &Value) -> Result<LogWindowQuery, ToolError> {
        let timestamp = |key: &str| -> Result<_, ToolError> {
            self.validation
                .ensure_optional_string(args.get(key), key)?
                .map(|raw| parse_user_timestamp(&raw, key))
                .transpose()
        };
        Ok(LogWindowQuery {
            start: timestamp("start")?,
            end: timestamp("end")?,
            last_seconds: self
                .validation
                .read_optional_int(args.get("last_seconds"), "last_seconds")?,
            filename: self
                .validation
                .ensure_optional_string(args.get("filename"), "filename")?
                .unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
            max_lines: self
                .validation
                .read_int(args.get("max_lines"), "max_lines", DEFAULT_MAX_LINES)?,
            page: self.validation.read_int(args.get("page"), "page", 0)?,
            page_size: self
                .validation
                .read_int(args.get("page_size"), "page_size", DEFAULT_PAGE_SIZE)?,
            match_pattern: self
                .validation
                .ensure_optional_string(args.get("match"), "match")?,
        })
    }

    pub async fn read_window(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let query = self.parse_query(&args)?;
        let service = self.service.clone();
        let window = tokio::task::spawn_blocking(move || service.extract(&query))
            .await
            .map_err(|err| ToolError::internal(format!("log reader failed: {}", err)))?;
        match window {
            Ok(window) => Ok(ToolOutput::text(window.to_xml())),
            Err(err) => {
                self.logger.error(
                    "log window failed",
                    Some(&serde_json::json!({ "code": err.code, "error": err.message })),
                );
                Err(err)
            }
        }
    }
}

#[async_trait]
impl ToolHandler for LogManager {
    async fn handle(&self, args: Value) -> Result<ToolOutput, ToolError> {
        self.read_window(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn manager() -> LogManager {
        let logger = Logger::new("test");
        let service = Arc::new(LogWindowService::new(PathBuf::from("/var/log"), logger.clone()));
        LogManager::new(logger, Validation::new(), service)
    }

    #[test]
    fn defaults_fill_missing_arguments() {
        let query = manager().parse_query(&json!({"last_seconds": 300})).unwrap();
        assert_eq!(query.filename, "syslog");
        assert_eq!(query.max_lines, 5000);
        assert_eq!(query.page, 0);
        assert_eq!(query.page_size, 200);
        assert_eq!(query.last_seconds, Some(300));
        assert!(query.start.is_none());
        assert!(query.match_pattern.is_none());
    }

    #[test]
    fn invalid_timestamp_is_a_validation_error() {
        let err = manager()
            .parse_query(&json!({"start": "not-a-date"}))
            .unwrap_err();
        assert_eq!(err.kind, crate::errors::ToolErrorKind::InvalidParams);
        assert!(err.message.starts_with("start is not a valid ISO-8601 datetime"));
    }
}
