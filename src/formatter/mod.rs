//! Formatter capabilities and the extension dispatcher.
//!
//! A [`Formatter`] turns one file's content into formatted content. The stock
//! implementation is [`ToolPipeline`], a chain of external tools run over
//! stdin/stdout:
//! - `py`, `pyi`: `isort` then `black`
//! - `sh`, `bash`: `shfmt`
//!
//! Both the tools and the pipelines can be replaced from `.refmt.toml`, see
//! [`registry`].

pub mod config;
pub mod executor;
pub mod registry;

pub use config::{SettingFlag, ToolDefinition};
pub use executor::{ExecutorError, ToolExecutor, ToolOutput};
pub use registry::{FormatterRegistry, ToolRegistry};

use std::path::Path;
use std::sync::Arc;

/// Everything a formatter gets to see about one file.
pub struct FormatRequest<'a> {
    /// Path as given by the caller
    pub path: &'a Path,
    /// Extension the formatter was dispatched on
    pub extension: &'a str,
    /// Current file content, exactly as read from disk
    pub content: &'a [u8],
    /// `read_config` bound to this file's `**.<ext>` section
    pub config_lookup: &'a dyn Fn(&str) -> String,
}

/// A formatting capability registered for one or more extensions.
pub trait Formatter: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Format the request's content.
    ///
    /// `Ok` carries whatever the formatter produced, including a non-zero exit
    /// code; `Err` means it could not be run at all.
    fn format(&self, request: &FormatRequest<'_>) -> Result<ToolOutput, ExecutorError>;
}

/// Runs external tools in sequence, feeding each one the previous one's stdout.
pub struct ToolPipeline {
    name: String,
    tools: Vec<(String, ToolDefinition)>,
    executor: Arc<ToolExecutor>,
}

impl ToolPipeline {
    pub fn new(tools: Vec<(String, ToolDefinition)>, executor: Arc<ToolExecutor>) -> Self {
        let name = tools.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>().join(" | ");
        Self { name, tools, executor }
    }
}

impl Formatter for ToolPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self, request: &FormatRequest<'_>) -> Result<ToolOutput, ExecutorError> {
        let path = request.path.to_string_lossy();
        let mut current = ToolOutput {
            stdout: request.content.to_vec(),
            success: true,
            ..ToolOutput::default()
        };
        let mut diagnostics = String::new();

        for (id, tool) in &self.tools {
            let argv = tool.resolve_command(&path, request.config_lookup);
            let output = self.executor.execute(&argv, &current.stdout)?;

            if !output.success {
                log::debug!("[refmt-format] '{id}' exited with {} on {path}", output.exit_code);
                let stderr = if output.stderr.trim().is_empty() {
                    format!("{id} exited with code {}", output.exit_code)
                } else {
                    output.stderr
                };
                return Ok(ToolOutput { stderr, ..output });
            }

            if !output.stderr.trim().is_empty() {
                log::debug!("[refmt-format] '{id}' on {path}: {}", output.stderr.trim_end());
                diagnostics.push_str(&output.stderr);
            }
            current = output;
        }

        current.stderr = diagnostics;
        Ok(current)
    }
}
