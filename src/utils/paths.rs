use crate::constants::{config, logs};
use std::env;
use std::path::{Component, Path, PathBuf};

fn normalize_env_path(value: Option<String>) -> Option<PathBuf> {
    let raw = value?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if lowered == "undefined" || lowered == "null" {
        return None;
    }
    Some(expand_home_path(trimmed))
}

/// Explicit value wins, then the environment variable, then the default.
fn resolve_path(explicit: Option<&Path>, env_key: &str, default: &str) -> PathBuf {
    if let Some(path) = explicit {
        return expand_home_path(path);
    }
    normalize_env_path(env::var(env_key).ok()).unwrap_or_else(|| PathBuf::from(default))
}

pub fn resolve_chassis_config_path(explicit: Option<&Path>) -> PathBuf {
    resolve_path(explicit, "CHASSIS_CONFIG_PATH", config::DEFAULT_CHASSIS_PATH)
}

pub fn resolve_tools_config_path(explicit: Option<&Path>) -> PathBuf {
    resolve_path(explicit, "CHASSIS_TOOLS_CONFIG_PATH", config::DEFAULT_TOOLS_PATH)
}

pub fn resolve_log_base_dir(explicit: Option<&Path>) -> PathBuf {
    resolve_path(explicit, "CHASSIS_LOG_BASE_DIR", logs::DEFAULT_BASE_DIR)
}

pub fn expand_home_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let home = || env::var("HOME").ok().map(PathBuf::from);
    match path.to_str() {
        Some("~") => home().unwrap_or_else(|| path.to_path_buf()),
        Some(text) => match (text.strip_prefix("~/"), home()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => path.to_path_buf(),
        },
        None => path.to_path_buf(),
    }
}

/// Collapses `.` and `..` without touching the filesystem. `..` never climbs
/// above the root of an absolute path.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lexically_collapses_parent_components() {
        assert_eq!(
            normalize_lexically(Path::new("/var/log/../../etc/passwd")),
            PathBuf::from("/etc/passwd")
        );
        assert_eq!(
            normalize_lexically(Path::new("/var/log/./nested/../syslog")),
            PathBuf::from("/var/log/syslog")
        );
        assert_eq!(
            normalize_lexically(Path::new("/../../etc")),
            PathBuf::from("/etc")
        );
    }

    #[test]
    fn explicit_path_beats_default() {
        let explicit = PathBuf::from("/opt/chassis.json");
        assert_eq!(
            resolve_path(Some(&explicit), "CHASSIS_TEST_UNSET_KEY", "config/chassis.json"),
            explicit
        );
        assert_eq!(
            resolve_path(None, "CHASSIS_TEST_UNSET_KEY", "config/chassis.json"),
            PathBuf::from("config/chassis.json")
        );
    }
}
