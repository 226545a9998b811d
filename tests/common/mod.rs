#![allow(dead_code)]

use chassis::app::App;
use chassis::managers::ssh::{ExecMode, RawOutput, RemoteTransport, TransportError};
use chassis::mcp::server::McpServer;
use chassis::services::logger::Logger;
use chassis::services::registry::{ChassisRegistry, ConnectionProfile};
use chassis::services::tools_config::ToolsConfig;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub static ENV_LOCK: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub host: String,
    pub mode: ExecMode,
    pub timeout: Duration,
}

/// Replays canned replies in order and records what it was asked to run.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<RawOutput, TransportError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<RawOutput, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl RemoteTransport for ScriptedTransport {
    fn execute(
        &self,
        profile: &ConnectionProfile,
        mode: &ExecMode,
        timeout: Duration,
    ) -> Result<RawOutput, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            host: profile.host.clone(),
            mode: mode.clone(),
            timeout,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Channel("no scripted reply".to_string())))
    }
}

pub fn reply(stdout: &str, stderr: &str, exit_status: i32) -> Result<RawOutput, TransportError> {
    Ok(RawOutput {
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        exit_status: Some(exit_status),
    })
}

pub fn refused(addr: &str) -> Result<RawOutput, TransportError> {
    Err(TransportError::Connect {
        addr: addr.to_string(),
        message: "Connection refused (os error 111)".to_string(),
    })
}

pub fn temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn single_chassis() -> Value {
    json!({"chassis": {"r1": {"host": "10.0.0.1", "username": "netops", "password": "pw"}}})
}

pub fn all_tools(allowed_ssh_commands: &[&str]) -> Value {
    json!({
        "allowed_tools": [
            "run_cli", "get_facts", "get_configuration", "edit_configuration",
            "rollback_configuration", "add_software", "list_chassis",
            "read_var_log_messages_window"
        ],
        "allowed_ssh_commands": allowed_ssh_commands,
    })
}

pub fn build_server(
    inventory: Value,
    tools: Value,
    log_dir: PathBuf,
    transport: Arc<ScriptedTransport>,
) -> McpServer {
    let logger = Logger::new("test");
    let registry = ChassisRegistry::from_value(&inventory, &logger);
    let tools = ToolsConfig::from_value(&tools);
    let app = App::from_parts(logger, registry, tools, log_dir, transport).unwrap();
    McpServer::new(app)
}

pub async fn rpc(server: &McpServer, method: &str, params: Value) -> Value {
    let request = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
    let response = server
        .handle_line(&request.to_string())
        .await
        .expect("request with id must be answered");
    serde_json::to_value(&response).unwrap()
}

/// Calls a tool and returns `(text, is_error)`; panics on a JSON-RPC error.
pub async fn call_tool(server: &McpServer, name: &str, args: Value) -> (String, bool) {
    let response = rpc(server, "tools/call", json!({"name": name, "arguments": args})).await;
    assert!(
        response.get("error").is_none(),
        "unexpected JSON-RPC error: {}",
        response
    );
    let result = &response["result"];
    (
        result["content"][0]["text"].as_str().unwrap().to_string(),
        result["isError"].as_bool().unwrap(),
    )
}
