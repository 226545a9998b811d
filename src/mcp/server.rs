use crate::app::{App, AppConfig};
use crate::errors::{ErrorCode, McpError, ToolError, ToolErrorKind};
use crate::mcp::catalog::{list_tools, validate_tool_args};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse, ToolCallParams};
use crate::services::logger::Logger;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "chassis";

fn map_tool_error(error: &ToolError) -> McpError {
    let message = error.render();
    match error.kind {
        ToolErrorKind::InvalidParams => McpError::new(ErrorCode::InvalidParams, message),
        ToolErrorKind::Denied | ToolErrorKind::Conflict | ToolErrorKind::NotFound => {
            McpError::new(ErrorCode::InvalidRequest, message)
        }
        _ => McpError::new(ErrorCode::InternalError, message),
    }
}

pub struct McpServer {
    app: Arc<App>,
    logger: Logger,
}

impl McpServer {
    pub fn new(app: App) -> Self {
        let logger = app.logger.child("mcp");
        Self {
            app: Arc::new(app),
            logger,
        }
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
        })
    }

    fn handle_tools_list(&self) -> Value {
        let executor = &self.app.tool_executor;
        let tools = list_tools(|name| executor.is_enabled(name));
        serde_json::json!({ "tools": tools })
    }

    pub async fn handle_tools_call(&self, name: &str, args: Value) -> Result<Value, McpError> {
        let executor = &self.app.tool_executor;
        let (canonical, _) = executor.handler_for(name).map_err(|err| map_tool_error(&err))?;
        validate_tool_args(canonical, &args)?;

        let output = executor
            .execute(name, args)
            .await
            .map_err(|err| map_tool_error(&err))?;
        Ok(serde_json::json!({
            "content": [ { "type": "text", "text": output.text } ],
            "isError": output.is_error,
        }))
    }

    /// Handles one line of input; `None` when nothing should be written back.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let Ok(parsed) = serde_json::from_str::<Value>(trimmed) else {
            return Some(JsonRpcResponse::parse_error());
        };
        let Ok(request) = serde_json::from_value::<JsonRpcRequest>(parsed) else {
            return Some(JsonRpcResponse::invalid_request());
        };
        if request.is_notification() {
            self.logger.debug(
                "notification",
                Some(&serde_json::json!({ "method": request.method })),
            );
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.handle_initialize()),
            "tools/list" => JsonRpcResponse::success(id, self.handle_tools_list()),
            "tools/call" => {
                let params: ToolCallParams =
                    serde_json::from_value(request.params).unwrap_or_default();
                if params.name.trim().is_empty() {
                    JsonRpcResponse::failure(
                        id,
                        McpError::new(ErrorCode::InvalidParams, "Missing tool name"),
                    )
                } else {
                    match self.handle_tools_call(&params.name, params.arguments).await {
                        Ok(result) => JsonRpcResponse::success(id, result),
                        Err(err) => JsonRpcResponse::failure(id, err),
                    }
                }
            }
            _ if request.method.starts_with("notifications/") => {
                JsonRpcResponse::success(id, serde_json::json!({}))
            }
            _ => JsonRpcResponse::failure(
                id,
                McpError::new(ErrorCode::MethodNotFound, "Method not found"),
            ),
        };
        Some(response)
    }

    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), ToolError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut writer = writer;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|err| ToolError::internal(err.to_string()))?
        {
            if let Some(response) = self.handle_line(&line).await {
                let payload = serde_json::to_string(&response)
                    .map_err(|err| ToolError::internal(err.to_string()))?;
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        Ok(())
    }

    pub async fn run_stdio(&self) -> Result<(), ToolError> {
        let reader = BufReader::new(tokio::io::stdin());
        let writer = BufWriter::new(tokio::io::stdout());
        self.serve(reader, writer).await
    }
}

pub async fn run_stdio(config: &AppConfig) -> Result<(), ToolError> {
    let app = App::initialize(config)?;
    let server = McpServer::new(app);
    server.logger.info(
        "serving on stdio",
        Some(&serde_json::json!({
            "tools": server.app.tool_executor.callable_names(),
            "chassis": server.app.registry.ids(),
        })),
    );
    server.run_stdio().await
}
