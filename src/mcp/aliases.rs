use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const BUILTIN_TOOL_ALIASES: &[(&str, &str)] = &[
    ("run_command", "run_cli"),
    ("retrieve_facts", "get_facts"),
    ("retrieve_configuration", "get_configuration"),
    ("install_software", "add_software"),
    ("read_log_window", "read_var_log_messages_window"),
];

static BUILTIN_TOOL_ALIAS_MAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| BUILTIN_TOOL_ALIASES.iter().copied().collect());

pub fn builtin_tool_aliases() -> &'static [(&'static str, &'static str)] {
    BUILTIN_TOOL_ALIASES
}

pub fn canonical_tool_name(tool: &str) -> &str {
    BUILTIN_TOOL_ALIAS_MAP.get(tool).copied().unwrap_or(tool)
}

pub fn builtin_tool_alias_map_owned() -> HashMap<String, String> {
    BUILTIN_TOOL_ALIASES
        .iter()
        .map(|(alias, target)| (alias.to_string(), target.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_and_canonical_names_pass_through() {
        assert_eq!(canonical_tool_name("run_command"), "run_cli");
        assert_eq!(canonical_tool_name("read_log_window"), "read_var_log_messages_window");
        assert_eq!(canonical_tool_name("get_facts"), "get_facts");
        assert_eq!(canonical_tool_name("nope"), "nope");
    }
}
