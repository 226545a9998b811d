use chassis::app::AppConfig;
use clap::Parser;
use std::path::PathBuf;

/// MCP stdio server for remote chassis administration.
#[derive(Debug, Parser)]
#[command(name = "chassis", version)]
struct Cli {
    /// Chassis inventory (JSON). Falls back to CHASSIS_CONFIG_PATH.
    #[arg(long)]
    chassis_config: Option<PathBuf>,
    /// Tool enablement and command allowlist (JSON). Falls back to CHASSIS_TOOLS_CONFIG_PATH.
    #[arg(long)]
    tools_config: Option<PathBuf>,
    /// Base directory for the log window tool. Falls back to CHASSIS_LOG_BASE_DIR.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = AppConfig::resolve(
        cli.chassis_config.as_deref(),
        cli.tools_config.as_deref(),
        cli.log_dir.as_deref(),
    );
    if let Err(err) = chassis::mcp::server::run_stdio(&config).await {
        eprintln!("chassis: {}", err.render());
        std::process::exit(1);
    }
}
