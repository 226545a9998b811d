pub mod network {
    pub const SSH_DEFAULT_PORT: u16 = 22;
    pub const TIMEOUT_CONNECT_MAX_SECS: u64 = 30;
    pub const TIMEOUT_EXEC_DEFAULT_SECS: u64 = 90;
    pub const TIMEOUT_CONFIG_READ_SECS: u64 = 120;
    pub const TIMEOUT_CONFIG_EDIT_SECS: u64 = 120;
    pub const TIMEOUT_ROLLBACK_SECS: u64 = 90;
    pub const TIMEOUT_SOFTWARE_ADD_SECS: u64 = 600;
    pub const POLL_INTERVAL_MS: u64 = 20;
    pub const SESSION_CLOSE_GRACE_MS: u64 = 2_000;
}

pub mod limits {
    pub const MAX_PORT: u16 = 65_535;
    pub const MIN_PORT: u16 = 1;
    pub const MAX_ROLLBACK_ID: i64 = 49;
    pub const RESPONSE_PREVIEW_BYTES: usize = 500;
    pub const RESULT_PREVIEW_BYTES: usize = 400;
    pub const AUDIT_ARG_BYTES: usize = 2048;
}

pub mod cli {
    pub const ENTRY_POINT: &str = "cli";
    pub const NO_OUTPUT: &str = "(no output)";
}

pub mod logs {
    pub const DEFAULT_BASE_DIR: &str = "/var/log";
    pub const DEFAULT_FILENAME: &str = "syslog";
    pub const MAX_TAIL_BYTES: u64 = 8_000_000;
    pub const DEFAULT_MAX_LINES: i64 = 5_000;
    pub const DEFAULT_PAGE_SIZE: i64 = 200;
    pub const COMPRESSED_SUFFIXES: &[&str] = &["gz", "bz2", "xz", "zst", "zip"];
}

pub mod config {
    pub const DEFAULT_CHASSIS_PATH: &str = "config/chassis.json";
    pub const DEFAULT_TOOLS_PATH: &str = "config/tools.json";
}
