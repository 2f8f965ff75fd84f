//! Project settings lookup backing `read_config(pattern, key)`.
//!
//! Settings come from an INI-style `.editorconfig` at the project root. Keys
//! that appear before the first section header (such as `root = true`) live
//! in an implicit top section. Section names are matched literally, so the
//! lookup for Python files asks for the section named `**.py`.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name of the project settings file, looked up at the project root
pub const SETTINGS_FILE: &str = ".editorconfig";

/// Name of the implicit section holding keys before the first header
pub const TOP_SECTION: &str = "__TOP__";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file at {path}: {source}")]
    IoError { source: io::Error, path: String },
}

/// Parsed project settings, keyed by section then by lowercased key.
#[derive(Debug, Clone, Default)]
pub struct ProjectSettings {
    path: Option<PathBuf>,
    sections: HashMap<String, HashMap<String, String>>,
}

impl ProjectSettings {
    /// Settings with no backing file; every lookup yields an empty string.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load `<project_root>/.editorconfig`. A missing file is not an error.
    pub fn load(project_root: &Path) -> Result<Self, SettingsError> {
        let path = project_root.join(SETTINGS_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => {
                log::debug!("[refmt-settings] Loaded {}", path.display());
                let mut settings = Self::parse(&content);
                settings.path = Some(path);
                Ok(settings)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("[refmt-settings] No {} at {}", SETTINGS_FILE, project_root.display());
                Ok(Self::empty())
            }
            Err(source) => Err(SettingsError::IoError {
                source,
                path: path.display().to_string(),
            }),
        }
    }

    /// Parse INI content.
    ///
    /// Full-line comments start with `#` or `;`. Entries use `=` or `:`.
    /// Indented lines continue the previous value. Lines that fit none of
    /// these are ignored with a warning.
    pub fn parse(content: &str) -> Self {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = TOP_SECTION.to_string();
        let mut last_key: Option<String> = None;

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let indented = raw.starts_with(' ') || raw.starts_with('\t');
            if indented && let Some(key) = &last_key {
                if let Some(value) = sections.get_mut(&current).and_then(|s| s.get_mut(key)) {
                    value.push('\n');
                    value.push_str(line);
                }
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = name.to_string();
                sections.entry(current.clone()).or_default();
                last_key = None;
                continue;
            }

            match line.find(['=', ':']) {
                Some(split) => {
                    let key = line[..split].trim().to_lowercase();
                    let value = line[split + 1..].trim().to_string();
                    sections.entry(current.clone()).or_default().insert(key.clone(), value);
                    last_key = Some(key);
                }
                None => {
                    log::warn!("Ignoring malformed settings line {}: {line}", index + 1);
                    last_key = None;
                }
            }
        }

        Self { path: None, sections }
    }

    /// Path of the file these settings were read from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up `key` in the section named `pattern`.
    ///
    /// Returns an empty string when the file, section or key is absent.
    pub fn read_config(&self, pattern: &str, key: &str) -> String {
        self.sections
            .get(pattern)
            .and_then(|section| section.get(&key.to_lowercase()))
            .cloned()
            .unwrap_or_default()
    }
}
