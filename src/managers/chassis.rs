use crate::constants::cli::ENTRY_POINT;
use crate::constants::limits::{MAX_ROLLBACK_ID, RESULT_PREVIEW_BYTES};
use crate::constants::network::{
    TIMEOUT_CONFIG_EDIT_SECS, TIMEOUT_CONFIG_READ_SECS, TIMEOUT_EXEC_DEFAULT_SECS,
    TIMEOUT_ROLLBACK_SECS, TIMEOUT_SOFTWARE_ADD_SECS,
};
use crate::errors::ToolError;
use crate::managers::ssh::RemoteBridge;
use crate::services::command_gate::CommandGate;
use crate::services::logger::Logger;
use crate::services::registry::{ChassisRegistry, ConnectionProfile, RegistryError};
use crate::services::tool_executor::{ToolHandler, ToolOutput};
use crate::services::validation::Validation;
use crate::utils::text::preview;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const FACT_COMMANDS: &[&str] = &["show version", "show system information"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChassisOperation {
    RunCli,
    GetFacts,
    GetConfiguration,
    EditConfiguration,
    RollbackConfiguration,
    AddSoftware,
    ListChassis,
}

impl ChassisOperation {
    pub const ALL: [ChassisOperation; 7] = [
        ChassisOperation::RunCli,
        ChassisOperation::GetFacts,
        ChassisOperation::GetConfiguration,
        ChassisOperation::EditConfiguration,
        ChassisOperation::RollbackConfiguration,
        ChassisOperation::AddSoftware,
        ChassisOperation::ListChassis,
    ];

    pub fn tool_name(self) -> &'static str {
        match self {
            ChassisOperation::RunCli => "run_cli",
            ChassisOperation::GetFacts => "get_facts",
            ChassisOperation::GetConfiguration => "get_configuration",
            ChassisOperation::EditConfiguration => "edit_configuration",
            ChassisOperation::RollbackConfiguration => "rollback_configuration",
            ChassisOperation::AddSoftware => "add_software",
            ChassisOperation::ListChassis => "list_chassis",
        }
    }
}

/// `show configuration`, optionally piped through `display set`.
pub fn configuration_command(format: &str) -> &'static str {
    if format == "set" {
        "show configuration | display set"
    } else {
        "show configuration"
    }
}

/// Private-candidate load script fed to the CLI on stdin.
pub fn edit_script(config: &str, format: &str, commit: bool) -> String {
    let load = if format == "set" {
        "load set terminal"
    } else {
        "load merge terminal"
    };
    let mut script = format!("configure private\n{}\n{}\n", load, config);
    if commit {
        script.push_str("commit\n");
    }
    script.push_str("exit\n");
    script
}

pub fn rollback_script(rollback_id: i64) -> String {
    format!("configure private\nrollback {}\ncommit\nexit\n", rollback_id)
}

pub fn software_add_command(package: &str, force: bool) -> String {
    if force {
        format!("request system software add force {}", package)
    } else {
        format!("request system software add {}", package)
    }
}

/// Device operations over the remote bridge. Only `run_cli` takes a
/// caller-authored command and therefore the only one checked against the
/// command allowlist.
#[derive(Clone)]
pub struct ChassisManager {
    logger: Logger,
    validation: Validation,
    registry: Arc<ChassisRegistry>,
    gate: Arc<CommandGate>,
    bridge: RemoteBridge,
}

impl ChassisManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        registry: Arc<ChassisRegistry>,
        gate: Arc<CommandGate>,
        bridge: RemoteBridge,
    ) -> Self {
        Self {
            logger: logger.child("chassis"),
            validation,
            registry,
            gate,
            bridge,
        }
    }

    pub async fn handle_operation(
        &self,
        operation: ChassisOperation,
        args: Value,
    ) -> Result<ToolOutput, ToolError> {
        match operation {
            ChassisOperation::RunCli => self.run_cli(&args).await,
            ChassisOperation::GetFacts => self.get_facts(&args).await,
            ChassisOperation::GetConfiguration => self.get_configuration(&args).await,
            ChassisOperation::EditConfiguration => self.edit_configuration(&args).await,
            ChassisOperation::RollbackConfiguration => self.rollback_configuration(&args).await,
            ChassisOperation::AddSoftware => self.add_software(&args).await,
            ChassisOperation::ListChassis => Ok(self.list_chassis()),
        }
    }

    fn resolve_profile(&self, args: &Value) -> Result<&ConnectionProfile, ToolError> {
        let chassis_id = self
            .validation
            .ensure_optional_string(args.get("chassis_id"), "chassis_id")?;
        Ok(self.registry.resolve(chassis_id.as_deref())?)
    }

    fn required_text(&self, args: &Value, key: &str) -> Result<String, ToolError> {
        self.validation
            .ensure_string(args.get(key).unwrap_or(&Value::Null), key, true)
            .map_err(|_| ToolError::invalid_params(format!("{} must be non-empty.", key)))
    }

    pub async fn run_cli(&self, args: &Value) -> Result<ToolOutput, ToolError> {
        let command = self.required_text(args, "command")?;
        let allowed = self.gate.is_allowed(&command);
        self.logger.info(
            "run_cli allowlist",
            Some(&json!({ "command": command, "allowed": allowed })),
        );
        if !allowed {
            return Err(self.gate.denial());
        }
        let profile = self.resolve_profile(args)?;
        let result = self
            .bridge
            .run_command(&command, profile, Duration::from_secs(TIMEOUT_EXEC_DEFAULT_SECS))
            .await;
        if !result.success {
            return Ok(ToolOutput::error(format!(
                "Error running CLI command:\n{}",
                result.output
            )));
        }
        Ok(ToolOutput::text(result.output))
    }

    pub async fn get_facts(&self, args: &Value) -> Result<ToolOutput, ToolError> {
        let profile = self.resolve_profile(args)?;
        let mut sections = Vec::with_capacity(FACT_COMMANDS.len());
        let mut failures = 0usize;
        for command in FACT_COMMANDS {
            let result = self
                .bridge
                .run_command(command, profile, Duration::from_secs(TIMEOUT_EXEC_DEFAULT_SECS))
                .await;
            self.logger.debug(
                "get_facts section",
                Some(&json!({
                    "command": command,
                    "success": result.success,
                    "output_preview": preview(&result.output, RESULT_PREVIEW_BYTES),
                })),
            );
            if result.success {
                sections.push(format!("--- {} ---\n{}", command, result.output));
            } else {
                failures += 1;
                sections.push(format!("--- {} (error) ---\n{}", command, result.output));
            }
        }
        let text = sections.join("\n\n");
        if failures == FACT_COMMANDS.len() {
            return Ok(ToolOutput::error(text));
        }
        Ok(ToolOutput::text(text))
    }

    pub async fn get_configuration(&self, args: &Value) -> Result<ToolOutput, ToolError> {
        let format = self
            .validation
            .ensure_choice(args.get("format"), "format", &["text", "set"], "text")?;
        let profile = self.resolve_profile(args)?;
        let result = self
            .bridge
            .run_command(
                configuration_command(&format),
                profile,
                Duration::from_secs(TIMEOUT_CONFIG_READ_SECS),
            )
            .await;
        Ok(remote_output(result.success, result.output))
    }

    pub async fn edit_configuration(&self, args: &Value) -> Result<ToolOutput, ToolError> {
        let config = self.required_text(args, "config_text")?;
        let format = self
            .validation
            .ensure_choice(args.get("format"), "format", &["set", "text"], "set")?;
        let commit = self.validation.read_bool(args.get("commit"), "commit", true)?;
        let profile = self.resolve_profile(args)?;
        self.logger.info(
            "edit_configuration",
            Some(&json!({
                "format": format,
                "commit": commit,
                "config_lines": config.lines().count(),
            })),
        );
        let result = self
            .bridge
            .run_scripted(
                ENTRY_POINT,
                &edit_script(&config, &format, commit),
                profile,
                Duration::from_secs(TIMEOUT_CONFIG_EDIT_SECS),
            )
            .await;
        Ok(remote_output(result.success, result.output))
    }

    pub async fn rollback_configuration(&self, args: &Value) -> Result<ToolOutput, ToolError> {
        let rollback_id = self
            .validation
            .read_int(args.get("rollback_id"), "rollback_id", 0)?;
        if !(0..=MAX_ROLLBACK_ID).contains(&rollback_id) {
            return Err(ToolError::invalid_params(format!(
                "rollback_id must be between 0 and {}",
                MAX_ROLLBACK_ID
            )));
        }
        let profile = self.resolve_profile(args)?;
        let result = self
            .bridge
            .run_scripted(
                ENTRY_POINT,
                &rollback_script(rollback_id),
                profile,
                Duration::from_secs(TIMEOUT_ROLLBACK_SECS),
            )
            .await;
        Ok(remote_output(result.success, result.output))
    }

    pub async fn add_software(&self, args: &Value) -> Result<ToolOutput, ToolError> {
        let package = self.required_text(args, "package_name")?;
        let force = self.validation.read_bool(args.get("force"), "force", false)?;
        let profile = self.resolve_profile(args)?;
        let result = self
            .bridge
            .run_command(
                &software_add_command(&package, force),
                profile,
                Duration::from_secs(TIMEOUT_SOFTWARE_ADD_SECS),
            )
            .await;
        Ok(remote_output(result.success, result.output))
    }

    pub fn list_chassis(&self) -> ToolOutput {
        let chassis = self.registry.list_safe();
        if chassis.is_empty() {
            return ToolOutput::text(RegistryError::Empty.to_string());
        }
        let lines: Vec<String> = chassis
            .iter()
            .map(|(id, info)| {
                let user = if info.username.is_empty() {
                    "(none)"
                } else {
                    info.username.as_str()
                };
                format!("  {}: {}:{} (user: {})", id, info.host, info.port, user)
            })
            .collect();
        ToolOutput::text(format!("Available chassis:\n{}", lines.join("\n")))
    }
}

fn remote_output(success: bool, output: String) -> ToolOutput {
    if success {
        ToolOutput::text(output)
    } else {
        ToolOutput::error(format!("Error:\n{}", output))
    }
}

/// One registered tool name bound to a chassis operation.
#[derive(Clone)]
pub struct ChassisTool {
    manager: Arc<ChassisManager>,
    operation: ChassisOperation,
}

impl ChassisTool {
    pub fn new(manager: Arc<ChassisManager>, operation: ChassisOperation) -> Self {
        Self { manager, operation }
    }
}

#[async_trait]
impl ToolHandler for ChassisTool {
    async fn handle(&self, args: Value) -> Result<ToolOutput, ToolError> {
        self.manager.handle_operation(self.operation, args).await
    }
}
