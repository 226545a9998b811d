use crate::errors::ToolError;
use crate::managers::chassis::{ChassisManager, ChassisOperation, ChassisTool};
use crate::managers::logs::LogManager;
use crate::managers::ssh::{RemoteBridge, RemoteTransport, SshTransport};
use crate::mcp::catalog::tool_catalog;
use crate::services::command_gate::CommandGate;
use crate::services::log_window::LogWindowService;
use crate::services::logger::Logger;
use crate::services::registry::ChassisRegistry;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use crate::services::tools_config::ToolsConfig;
use crate::services::validation::Validation;
use crate::utils::paths::{resolve_chassis_config_path, resolve_log_base_dir, resolve_tools_config_path};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const LOG_WINDOW_TOOL: &str = "read_var_log_messages_window";

/// Where the server reads its configuration from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub chassis_config: PathBuf,
    pub tools_config: PathBuf,
    pub log_base_dir: PathBuf,
}

impl AppConfig {
    /// Flags win over `CHASSIS_*` environment variables, which win over defaults.
    pub fn resolve(
        chassis_config: Option<&Path>,
        tools_config: Option<&Path>,
        log_base_dir: Option<&Path>,
    ) -> Self {
        Self {
            chassis_config: resolve_chassis_config_path(chassis_config),
            tools_config: resolve_tools_config_path(tools_config),
            log_base_dir: resolve_log_base_dir(log_base_dir),
        }
    }
}

pub struct App {
    pub logger: Logger,
    pub tool_executor: Arc<ToolExecutor>,
    pub registry: Arc<ChassisRegistry>,
}

impl App {
    fn validate_tool_wiring(handlers: &HashMap<String, Arc<dyn ToolHandler>>) -> Result<(), ToolError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint("Every tool in tool_catalog.json must have a handler.")
            .with_details(serde_json::json!({ "missing_tools": missing })))
    }

    pub fn initialize(config: &AppConfig) -> Result<Self, ToolError> {
        let logger = Logger::new("chassis");
        let transport: Arc<dyn RemoteTransport> = Arc::new(SshTransport::new(logger.clone()));
        Self::load(config, logger, transport)
    }

    /// Reads both config files; a missing tools file is fatal, a missing
    /// inventory only leaves the registry empty.
    pub fn load(
        config: &AppConfig,
        logger: Logger,
        transport: Arc<dyn RemoteTransport>,
    ) -> Result<Self, ToolError> {
        let tools = ToolsConfig::load(&config.tools_config)?;
        let registry = ChassisRegistry::load(&config.chassis_config, &logger.child("registry"))?;
        logger.info(
            "configuration loaded",
            Some(&serde_json::json!({
                "chassis_config": config.chassis_config,
                "tools_config": config.tools_config,
                "log_base_dir": config.log_base_dir,
                "chassis": registry.len(),
            })),
        );
        Self::from_parts(logger, registry, tools, config.log_base_dir.clone(), transport)
    }

    pub fn from_parts(
        logger: Logger,
        registry: ChassisRegistry,
        tools: ToolsConfig,
        log_base_dir: PathBuf,
        transport: Arc<dyn RemoteTransport>,
    ) -> Result<Self, ToolError> {
        let validation = Validation::new();
        let registry = Arc::new(registry);
        let gate = Arc::new(CommandGate::compile(
            &tools.allowed_ssh_commands,
            &logger.child("gate"),
        ));
        if gate.pattern_count() == 0 && tools.is_tool_enabled(ChassisOperation::RunCli.tool_name()) {
            logger.warn("run_cli is enabled but the command allowlist is empty; every command will be denied", None);
        }
        let bridge = RemoteBridge::new(logger.clone(), transport);

        let chassis_manager = Arc::new(ChassisManager::new(
            logger.clone(),
            validation.clone(),
            registry.clone(),
            gate,
            bridge,
        ));
        let log_service = Arc::new(LogWindowService::new(log_base_dir, logger.clone()));
        let log_manager = Arc::new(LogManager::new(logger.clone(), validation, log_service));

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        for operation in ChassisOperation::ALL {
            handlers.insert(
                operation.tool_name().to_string(),
                Arc::new(ChassisTool::new(chassis_manager.clone(), operation)),
            );
        }
        handlers.insert(LOG_WINDOW_TOOL.to_string(), log_manager);

        Self::validate_tool_wiring(&handlers)?;

        let tool_executor = Arc::new(ToolExecutor::new(
            logger.clone(),
            handlers,
            tools.allowed_tools,
            crate::mcp::aliases::builtin_tool_alias_map_owned(),
        ));

        Ok(Self {
            logger,
            tool_executor,
            registry,
        })
    }
}
