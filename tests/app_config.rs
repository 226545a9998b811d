mod common;

use chassis::app::{App, AppConfig};
use chassis::mcp::server::McpServer;
use chassis::services::logger::Logger;
use common::{call_tool, temp_dir, ScriptedTransport, ENV_LOCK};
use serde_json::json;
use std::path::{Path, PathBuf};

#[tokio::test]
async fn flags_override_environment() {
    let _guard = ENV_LOCK.lock().await;
    std::env::set_var("CHASSIS_CONFIG_PATH", "/etc/chassis/inventory.json");
    std::env::set_var("CHASSIS_LOG_BASE_DIR", "/srv/logs");
    std::env::remove_var("CHASSIS_TOOLS_CONFIG_PATH");

    let config = AppConfig::resolve(Some(Path::new("/tmp/override.json")), None, None);
    assert_eq!(config.chassis_config, PathBuf::from("/tmp/override.json"));
    assert_eq!(config.tools_config, PathBuf::from("config/tools.json"));
    assert_eq!(config.log_base_dir, PathBuf::from("/srv/logs"));

    let config = AppConfig::resolve(None, None, None);
    assert_eq!(config.chassis_config, PathBuf::from("/etc/chassis/inventory.json"));

    std::env::remove_var("CHASSIS_CONFIG_PATH");
    std::env::remove_var("CHASSIS_LOG_BASE_DIR");
}

#[tokio::test]
async fn missing_tools_file_stops_startup() {
    let dir = temp_dir("appcfg");
    let config = AppConfig {
        chassis_config: dir.join("chassis.json"),
        tools_config: dir.join("tools.json"),
        log_base_dir: dir.clone(),
    };
    let err = match App::load(&config, Logger::new("test"), ScriptedTransport::new(vec![])) {
        Ok(_) => panic!("startup must fail without a tools file"),
        Err(err) => err,
    };
    assert_eq!(err.code, "TOOLS_CONFIG_MISSING");
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn missing_inventory_leaves_an_empty_registry() {
    let dir = temp_dir("appcfg");
    std::fs::write(
        dir.join("tools.json"),
        json!({"allowed_tools": ["list_chassis", "run_cli"], "allowed_ssh_commands": []}).to_string(),
    )
    .unwrap();
    let config = AppConfig {
        chassis_config: dir.join("chassis.json"),
        tools_config: dir.join("tools.json"),
        log_base_dir: dir.clone(),
    };
    let transport = ScriptedTransport::new(vec![]);
    let app = App::load(&config, Logger::new("test"), transport.clone()).unwrap();
    assert!(app.registry.is_empty());
    let server = McpServer::new(app);

    let (text, is_error) = call_tool(&server, "list_chassis", json!({})).await;
    assert!(!is_error);
    assert!(text.starts_with("No chassis configured."));

    // empty allowlist denies everything before the registry is consulted
    let (text, is_error) = call_tool(&server, "run_cli", json!({"command": "show version"})).await;
    assert!(is_error);
    assert!(text.starts_with("Error: command is not allowed"));
    assert!(transport.calls().is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn sample_configs_load() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let config = AppConfig {
        chassis_config: root.join("config/chassis.example.json"),
        tools_config: root.join("config/tools.example.json"),
        log_base_dir: PathBuf::from("/var/log"),
    };
    let app = App::load(&config, Logger::new("test"), ScriptedTransport::new(vec![])).unwrap();
    assert_eq!(app.registry.ids(), vec!["edge-1".to_string(), "lab-2".to_string()]);
    assert!(app.tool_executor.is_enabled("run_cli"));
    assert!(!app.tool_executor.is_enabled("edit_configuration"));
}
