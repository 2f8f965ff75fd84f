//! Immutable per-invocation state, built once at startup and shared by
//! reference with the scheduler and every job.

use crate::config::{MissingFilePolicy, find_project_root};
use crate::paths;
use crate::settings::{ProjectSettings, SettingsError};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RunContext {
    /// Directory refmt was invoked from; diagnostics are relative to it
    pub cwd: PathBuf,
    /// Nearest ancestor of `cwd` holding `.git`, else `cwd`
    pub project_root: PathBuf,
    /// Backing store for `read_config`
    pub settings: ProjectSettings,
    pub missing_file: MissingFilePolicy,
}

impl RunContext {
    pub fn new(
        cwd: PathBuf,
        project_root: PathBuf,
        settings: ProjectSettings,
        missing_file: MissingFilePolicy,
    ) -> Self {
        Self {
            cwd,
            project_root,
            settings,
            missing_file,
        }
    }

    /// Locate the project root above `cwd` and load its settings file.
    pub fn discover(cwd: PathBuf, missing_file: MissingFilePolicy) -> Result<Self, SettingsError> {
        let project_root = find_project_root(&cwd);
        let settings = ProjectSettings::load(&project_root)?;
        Ok(Self::new(cwd, project_root, settings, missing_file))
    }

    /// `path` relative to the working directory, for diagnostics.
    pub fn display_path(&self, path: &Path) -> String {
        paths::display_path(&self.cwd, path)
    }

    /// `read_config(pattern, key)`
    pub fn read_config(&self, pattern: &str, key: &str) -> String {
        self.settings.read_config(pattern, key)
    }
}
