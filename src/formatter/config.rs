//! Tool definitions: how to invoke an external formatter and which project
//! settings translate into which command-line flags.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placeholder in a tool's command replaced by the file's path
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Definition of an external tool.
///
/// The tool reads the content to format on stdin and writes the formatted
/// content to stdout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ToolDefinition {
    /// Command to run (first element is the binary, rest are arguments)
    pub command: Vec<String>,

    /// Settings translated into extra arguments, appended after `command`
    #[serde(default)]
    pub settings: Vec<SettingFlag>,
}

/// One project setting forwarded to a tool as a flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SettingFlag {
    /// Settings key, e.g. `max_line_length`
    pub key: String,

    /// Flag emitted when the key has a value, e.g. `--line-length`
    pub flag: String,

    /// Optional value table. Values missing from the table drop the flag;
    /// values mapped to an empty string emit the flag alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<HashMap<String, String>>,
}

impl SettingFlag {
    /// A flag that forwards the setting's value verbatim.
    pub fn value(key: &str, flag: &str) -> Self {
        Self {
            key: key.to_string(),
            flag: flag.to_string(),
            values: None,
        }
    }

    /// A flag whose value is looked up in `table`.
    pub fn mapped(key: &str, flag: &str, table: &[(&str, &str)]) -> Self {
        Self {
            key: key.to_string(),
            flag: flag.to_string(),
            values: Some(table.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
        }
    }

    fn to_args(&self, value: &str) -> Vec<String> {
        let value = match &self.values {
            Some(table) => match table.get(value) {
                Some(mapped) => mapped.as_str(),
                None => return Vec::new(),
            },
            None => value,
        };

        if value.is_empty() {
            vec![self.flag.clone()]
        } else {
            vec![self.flag.clone(), value.to_string()]
        }
    }
}

impl ToolDefinition {
    pub fn new(command: &[&str]) -> Self {
        Self {
            command: command.iter().map(|s| s.to_string()).collect(),
            settings: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: Vec<SettingFlag>) -> Self {
        self.settings = settings;
        self
    }

    /// Build the full argv for formatting `path`.
    ///
    /// `lookup` returns the setting's value, or an empty string when unset.
    pub fn resolve_command(&self, path: &str, lookup: &dyn Fn(&str) -> String) -> Vec<String> {
        let mut argv: Vec<String> = self
            .command
            .iter()
            .map(|arg| arg.replace(PATH_PLACEHOLDER, path))
            .collect();

        for setting in &self.settings {
            let value = lookup(&setting.key);
            let value = value.trim();
            if !value.is_empty() {
                argv.extend(setting.to_args(value));
            }
        }
        argv
    }
}
