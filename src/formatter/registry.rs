//! Built-in tool definitions and the extension-to-formatter dispatcher.
//!
//! This module provides default configurations for isort, black and shfmt.
//! Users can override or extend both the tools and the per-extension
//! pipelines in their configuration.

use super::config::{SettingFlag, ToolDefinition};
use super::executor::ToolExecutor;
use super::{Formatter, ToolPipeline};
use crate::config::{Config, ConfigError};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Registry of tool definitions by id.
pub struct ToolRegistry {
    /// User-defined tools (override built-ins)
    user_tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create a new registry with user-defined tools.
    pub fn new(user_tools: HashMap<String, ToolDefinition>) -> Self {
        Self { user_tools }
    }

    /// Get a tool definition by ID.
    ///
    /// Checks user tools first, then falls back to built-in tools.
    pub fn get(&self, tool_id: &str) -> Option<&ToolDefinition> {
        self.user_tools.get(tool_id).or_else(|| BUILTIN_TOOLS.get(tool_id))
    }

    /// List all available tool IDs.
    pub fn list_tools(&self) -> Vec<&str> {
        let mut tools: Vec<&str> = self.user_tools.keys().map(|s| s.as_str()).collect();
        for key in BUILTIN_TOOLS.keys() {
            if !self.user_tools.contains_key(*key) {
                tools.push(key);
            }
        }
        tools.sort();
        tools
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

/// Built-in tool definitions.
///
/// All of them read source on stdin and write the formatted source to stdout.
static BUILTIN_TOOLS: LazyLock<HashMap<&'static str, ToolDefinition>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // Python - import sorting runs first so black gets the final say on layout
    m.insert(
        "isort",
        ToolDefinition::new(&["isort", "--quiet", "--filename={path}", "-"])
            .with_settings(vec![SettingFlag::value("max_line_length", "--line-length")]),
    );

    m.insert(
        "black",
        ToolDefinition::new(&["black", "--quiet", "--stdin-filename={path}", "-"])
            .with_settings(vec![SettingFlag::value("max_line_length", "--line-length")]),
    );

    // Shell - shfmt
    m.insert(
        "shfmt",
        ToolDefinition::new(&["shfmt", "--filename={path}"]).with_settings(vec![
            SettingFlag::value("indent_size", "-i"),
            // A tab style wins over any indent_size given above
            SettingFlag::mapped("indent_style", "-i", &[("tab", "0")]),
            SettingFlag::mapped("binary_next_line", "-bn", &[("true", "")]),
            SettingFlag::mapped("switch_case_indent", "-ci", &[("true", "")]),
            SettingFlag::mapped("space_redirects", "-sr", &[("true", "")]),
            SettingFlag::mapped("keep_padding", "-kp", &[("true", "")]),
        ]),
    );

    m
});

/// Default pipelines by extension
const DEFAULT_PIPELINES: &[(&str, &[&str])] = &[
    ("py", &["isort", "black"]),
    ("pyi", &["isort", "black"]),
    ("sh", &["shfmt"]),
    ("bash", &["shfmt"]),
];

/// Maps a file extension to the formatter responsible for it.
///
/// Lookups are exact and case-sensitive: `PY` does not match `py`.
#[derive(Default)]
pub struct FormatterRegistry {
    formatters: HashMap<String, Box<dyn Formatter>>,
}

impl FormatterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `formatter` for `extension` (no leading dot), replacing any
    /// previous registration.
    pub fn register(&mut self, extension: impl Into<String>, formatter: Box<dyn Formatter>) {
        self.formatters.insert(extension.into(), formatter);
    }

    /// The formatter for `extension`, if one is registered.
    pub fn get(&self, extension: &str) -> Option<&dyn Formatter> {
        self.formatters.get(extension).map(|f| f.as_ref())
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.formatters.keys().map(|s| s.as_str()).collect();
        extensions.sort();
        extensions
    }

    /// Build the registry from the default pipelines overlaid with the
    /// configured ones. Every tool id must resolve.
    pub fn from_config(config: &Config, executor: Arc<ToolExecutor>) -> Result<Self, ConfigError> {
        let tools = ToolRegistry::new(config.tools.clone());

        let mut pipelines: HashMap<String, Vec<String>> = DEFAULT_PIPELINES
            .iter()
            .map(|(ext, ids)| (ext.to_string(), ids.iter().map(|s| s.to_string()).collect()))
            .collect();
        for (ext, extension) in &config.extensions {
            pipelines.insert(ext.clone(), extension.pipeline.clone());
        }

        let mut registry = Self::new();
        for (ext, ids) in pipelines {
            let mut resolved = Vec::with_capacity(ids.len());
            for id in ids {
                let tool = tools.get(&id).ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "unknown tool '{id}' in pipeline for '.{ext}' (available: {})",
                        tools.list_tools().join(", ")
                    ))
                })?;
                resolved.push((id, tool.clone()));
            }
            let pipeline = ToolPipeline::new(resolved, Arc::clone(&executor));
            log::debug!("[refmt-registry] .{ext} -> {}", pipeline.name());
            registry.register(ext, Box::new(pipeline));
        }

        Ok(registry)
    }
}
