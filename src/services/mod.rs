pub mod command_gate;
pub mod log_window;
pub mod logger;
pub mod registry;
pub mod tool_executor;
pub mod tools_config;
pub mod validation;
