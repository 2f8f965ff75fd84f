//! One file's trip through refmt.
//!
//! A [`Job`] walks a fixed sequence of checks and stops at the first terminal
//! condition:
//!
//! 1. the file must exist
//! 2. the file must not be empty
//! 3. its extension must have a registered formatter
//! 4. the formatter must succeed with non-empty output
//! 5. the output is written back atomically
//!
//! Every error is turned into an [`Outcome`] here; nothing escapes to sibling
//! jobs or to the scheduler.

use crate::config::MissingFilePolicy;
use crate::context::RunContext;
use crate::formatter::{FormatRequest, FormatterRegistry};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Why a file was left alone without failing the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    DoesNotExist,
    UnrecognizedExtension,
    EmptyFile,
}

/// Why a file failed to format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// Missing file under [`MissingFilePolicy::Fail`]
    DoesNotExist,
    /// The formatter could not run, failed, or produced nothing
    Formatter(String),
    /// Reading or writing back the file failed
    Io(String),
}

/// Terminal result of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Formatted,
    Skipped(SkipReason),
    Failed(FailReason),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// Short label for logs and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Formatted => "formatted",
            Outcome::Skipped(_) => "skipped",
            Outcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Formatted => write!(f, "Formatted"),
            Outcome::Skipped(SkipReason::DoesNotExist) | Outcome::Failed(FailReason::DoesNotExist) => {
                write!(f, "Doesn't exist")
            }
            Outcome::Skipped(SkipReason::UnrecognizedExtension) => {
                write!(f, "Doesn't have a recognizable extension")
            }
            Outcome::Skipped(SkipReason::EmptyFile) => write!(f, "Is empty"),
            Outcome::Failed(FailReason::Formatter(message)) | Outcome::Failed(FailReason::Io(message)) => {
                write!(f, "Failed to format -> {message}")
            }
        }
    }
}

/// What a finished job hands back to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Path as given by the caller
    pub path: PathBuf,
    /// Path relative to the working directory
    pub display_path: String,
    pub outcome: Outcome,
    /// Diagnostics the formatter wrote to stderr
    pub diagnostics: String,
}

/// The unit of work for formatting exactly one file.
#[derive(Debug)]
pub struct Job {
    path: PathBuf,
    display_path: String,
    extension: Option<String>,
    output: Vec<u8>,
    error: String,
}

impl Job {
    pub fn new(path: impl Into<PathBuf>, context: &RunContext) -> Self {
        let path = path.into();
        let display_path = context.display_path(&path);
        let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_string);
        Self {
            path,
            display_path,
            extension,
            output: Vec::new(),
            error: String::new(),
        }
    }

    pub fn display_path(&self) -> &str {
        &self.display_path
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Run the job to completion.
    pub fn run(mut self, context: &RunContext, registry: &FormatterRegistry) -> JobReport {
        let outcome = self.process(context, registry);
        log::debug!("[refmt-job] {}: {}", self.display_path, outcome.kind());

        JobReport {
            path: self.path,
            display_path: self.display_path,
            outcome,
            diagnostics: self.error,
        }
    }

    fn process(&mut self, context: &RunContext, registry: &FormatterRegistry) -> Outcome {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return match context.missing_file {
                    MissingFilePolicy::Skip => Outcome::Skipped(SkipReason::DoesNotExist),
                    MissingFilePolicy::Fail => Outcome::Failed(FailReason::DoesNotExist),
                };
            }
            Err(e) => return Outcome::Failed(FailReason::Io(format!("Failed to access file: {e}"))),
        };

        if metadata.is_dir() {
            return Outcome::Failed(FailReason::Io("Is a directory".to_string()));
        }
        if metadata.len() == 0 {
            return Outcome::Skipped(SkipReason::EmptyFile);
        }

        let Some(extension) = self.extension.clone() else {
            return Outcome::Skipped(SkipReason::UnrecognizedExtension);
        };
        let Some(formatter) = registry.get(&extension) else {
            return Outcome::Skipped(SkipReason::UnrecognizedExtension);
        };

        // Bytes, not text: formatters decide for themselves what an encoding is
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) => return Outcome::Failed(FailReason::Io(format!("Failed to read file: {e}"))),
        };

        let pattern = format!("**.{extension}");
        let lookup = |key: &str| context.read_config(&pattern, key);
        let request = FormatRequest {
            path: &self.path,
            extension: &extension,
            content: &content,
            config_lookup: &lookup,
        };

        log::debug!("[refmt-job] {} -> {}", self.display_path, formatter.name());
        let output = match formatter.format(&request) {
            Ok(output) => output,
            Err(e) => {
                self.error = e.to_string();
                return Outcome::Failed(FailReason::Formatter(self.error.clone()));
            }
        };

        self.output = output.stdout;
        self.error = output.stderr;

        if !output.success {
            let message = match self.error.trim_end() {
                "" => format!("exited with code {}", output.exit_code),
                stderr => stderr.to_string(),
            };
            return Outcome::Failed(FailReason::Formatter(message));
        }
        if self.output.is_empty() {
            let message = match self.error.trim() {
                "" => "formatter produced no output".to_string(),
                stderr => stderr.to_string(),
            };
            return Outcome::Failed(FailReason::Formatter(message));
        }

        if self.output == content {
            log::debug!("[refmt-job] {} already formatted", self.display_path);
        } else if let Err(e) = write_atomic(&self.path, &self.output) {
            return Outcome::Failed(FailReason::Io(format!("Failed to write file: {e}")));
        }

        Outcome::Formatted
    }
}

/// Replace `path`'s content by writing a sibling temp file and renaming it
/// over the target. Symlinks are followed and the original permissions kept.
fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let target = fs::canonicalize(path)?;
    let permissions = fs::metadata(&target)?.permissions();
    let dir = target.parent().unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.as_file().set_permissions(permissions)?;
    temp.persist(&target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::executor::{ExecutorError, ToolOutput};
    use crate::formatter::test_support::{FnFormatter, ok_output};
    use crate::settings::ProjectSettings;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};

    fn context(dir: &TempDir, policy: MissingFilePolicy) -> RunContext {
        RunContext::new(
            dir.path().to_path_buf(),
            dir.path().to_path_buf(),
            ProjectSettings::parse("[**.py]\nindent_size = 4\n[**.sh]\nindent_size = 2\n"),
            policy,
        )
    }

    fn upper_registry() -> FormatterRegistry {
        let mut registry = FormatterRegistry::new();
        registry.register("py", Box::new(FnFormatter::upper()));
        registry
    }

    fn run(dir: &TempDir, name: &str, registry: &FormatterRegistry) -> JobReport {
        let context = context(dir, MissingFilePolicy::Skip);
        Job::new(dir.path().join(name), &context).run(&context, registry)
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(Outcome::Formatted.to_string(), "Formatted");
        assert_eq!(Outcome::Skipped(SkipReason::DoesNotExist).to_string(), "Doesn't exist");
        assert_eq!(Outcome::Failed(FailReason::DoesNotExist).to_string(), "Doesn't exist");
        assert_eq!(
            Outcome::Skipped(SkipReason::UnrecognizedExtension).to_string(),
            "Doesn't have a recognizable extension"
        );
        assert_eq!(Outcome::Skipped(SkipReason::EmptyFile).to_string(), "Is empty");
        assert_eq!(
            Outcome::Failed(FailReason::Formatter("bad token".to_string())).to_string(),
            "Failed to format -> bad token"
        );
    }

    #[test]
    fn test_job_attributes() {
        let dir = tempdir().unwrap();
        let context = context(&dir, MissingFilePolicy::Skip);
        let job = Job::new(dir.path().join("pkg").join("mod.py"), &context);
        assert_eq!(job.display_path(), Path::new("pkg").join("mod.py").to_string_lossy());
        assert_eq!(job.extension(), Some("py"));

        let job = Job::new(dir.path().join("Makefile"), &context);
        assert_eq!(job.extension(), None);
    }

    #[test]
    fn test_missing_file_is_skipped_and_not_created() {
        let dir = tempdir().unwrap();
        let report = run(&dir, "ghost.py", &upper_registry());
        assert_eq!(report.outcome, Outcome::Skipped(SkipReason::DoesNotExist));
        assert_eq!(report.display_path, "ghost.py");
        assert!(!dir.path().join("ghost.py").exists());
    }

    #[test]
    fn test_missing_file_fails_under_strict_policy() {
        let dir = tempdir().unwrap();
        let context = context(&dir, MissingFilePolicy::Fail);
        let report = Job::new(dir.path().join("ghost.py"), &context).run(&context, &upper_registry());
        assert_eq!(report.outcome, Outcome::Failed(FailReason::DoesNotExist));
        assert!(report.outcome.is_failure());
    }

    #[test]
    fn test_empty_file_is_skipped_and_unchanged() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("empty.py"), "").unwrap();
        let report = run(&dir, "empty.py", &upper_registry());
        assert_eq!(report.outcome, Outcome::Skipped(SkipReason::EmptyFile));
        assert_eq!(fs::read(dir.path().join("empty.py")).unwrap(), b"");
    }

    #[test]
    fn test_unrecognized_extension_is_skipped_and_unchanged() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me\n").unwrap();
        fs::write(dir.path().join("Makefile"), "all:\n").unwrap();
        fs::write(dir.path().join("upper.PY"), "case matters\n").unwrap();

        for name in ["notes.txt", "Makefile", "upper.PY"] {
            let report = run(&dir, name, &upper_registry());
            assert_eq!(report.outcome, Outcome::Skipped(SkipReason::UnrecognizedExtension), "{name}");
        }
        assert_eq!(fs::read_to_string(dir.path().join("notes.txt")).unwrap(), "keep me\n");
        assert_eq!(fs::read_to_string(dir.path().join("upper.PY")).unwrap(), "case matters\n");
    }

    #[test]
    fn test_formatted_output_replaces_content_exactly() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.py"), "print('hi')\n").unwrap();
        let report = run(&dir, "app.py", &upper_registry());
        assert_eq!(report.outcome, Outcome::Formatted);
        assert_eq!(fs::read_to_string(dir.path().join("app.py")).unwrap(), "PRINT('HI')\n");
    }

    #[test]
    fn test_unchanged_output_is_still_formatted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("done.py"), "ALREADY\n").unwrap();
        let report = run(&dir, "done.py", &upper_registry());
        assert_eq!(report.outcome, Outcome::Formatted);
        assert_eq!(fs::read_to_string(dir.path().join("done.py")).unwrap(), "ALREADY\n");
    }

    #[test]
    fn test_formatter_failure_leaves_file_unchanged() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.py"), "def (:\n").unwrap();
        let mut registry = FormatterRegistry::new();
        registry.register("py", Box::new(FnFormatter::failing("cannot parse: 1:4\n")));

        let report = run(&dir, "bad.py", &registry);
        assert_eq!(
            report.outcome,
            Outcome::Failed(FailReason::Formatter("cannot parse: 1:4".to_string()))
        );
        assert_eq!(report.diagnostics, "cannot parse: 1:4\n");
        assert_eq!(fs::read_to_string(dir.path().join("bad.py")).unwrap(), "def (:\n");
    }

    #[test]
    fn test_empty_output_is_failure() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("x.py"), "x = 1\n").unwrap();
        let mut registry = FormatterRegistry::new();
        registry.register("py", Box::new(FnFormatter::new("blank", |_| Ok(ok_output(b"")))));

        let report = run(&dir, "x.py", &registry);
        assert_eq!(
            report.outcome,
            Outcome::Failed(FailReason::Formatter("formatter produced no output".to_string()))
        );
        assert_eq!(fs::read_to_string(dir.path().join("x.py")).unwrap(), "x = 1\n");
    }

    #[test]
    fn test_warnings_do_not_leak_into_output() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("w.py"), "a\n").unwrap();
        let mut registry = FormatterRegistry::new();
        registry.register(
            "py",
            Box::new(FnFormatter::new("noisy", |req| {
                Ok(ToolOutput {
                    stdout: req.content.to_ascii_uppercase(),
                    stderr: "1 file reformatted\n".to_string(),
                    exit_code: 0,
                    success: true,
                })
            })),
        );

        let report = run(&dir, "w.py", &registry);
        assert_eq!(report.outcome, Outcome::Formatted);
        assert_eq!(report.diagnostics, "1 file reformatted\n");
        assert_eq!(fs::read_to_string(dir.path().join("w.py")).unwrap(), "A\n");
    }

    #[test]
    fn test_unavailable_tool_is_failure() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("s.py"), "x\n").unwrap();
        let mut registry = FormatterRegistry::new();
        registry.register(
            "py",
            Box::new(FnFormatter::new("black", |_| {
                Err(ExecutorError::ToolNotFound {
                    tool: "black".to_string(),
                })
            })),
        );

        let report = run(&dir, "s.py", &registry);
        assert_eq!(
            report.outcome,
            Outcome::Failed(FailReason::Formatter("Tool 'black' not found in PATH".to_string()))
        );
    }

    #[test]
    fn test_config_lookup_is_scoped_to_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "body\n").unwrap();
        fs::write(dir.path().join("b.sh"), "body\n").unwrap();
        let mut registry = FormatterRegistry::new();
        for ext in ["py", "sh"] {
            registry.register(
                ext,
                Box::new(FnFormatter::new("indent", |req| {
                    let indent = (req.config_lookup)("indent_size");
                    let missing = (req.config_lookup)("nope");
                    let content = String::from_utf8_lossy(req.content);
                    Ok(ok_output(format!("{}:{indent}:{missing}:{content}", req.extension).as_bytes()))
                })),
            );
        }

        assert_eq!(run(&dir, "a.py", &registry).outcome, Outcome::Formatted);
        assert_eq!(run(&dir, "b.sh", &registry).outcome, Outcome::Formatted);
        assert_eq!(fs::read_to_string(dir.path().join("a.py")).unwrap(), "py:4::body\n");
        assert_eq!(fs::read_to_string(dir.path().join("b.sh")).unwrap(), "sh:2::body\n");
    }

    #[test]
    fn test_formatter_invoked_once_per_job() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("once.py"), "x\n").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = FormatterRegistry::new();
        registry.register(
            "py",
            Box::new(FnFormatter::new("count", move |req| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(ok_output(req.content))
            })),
        );

        run(&dir, "once.py", &registry);
        run(&dir, "missing.py", &registry);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_directory_is_failure() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("pkg.py")).unwrap();
        let report = run(&dir, "pkg.py", &upper_registry());
        assert_eq!(
            report.outcome,
            Outcome::Failed(FailReason::Io("Is a directory".to_string()))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_write_back_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("run.py");
        fs::write(&path, "x\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(run(&dir, "run.py", &upper_registry()).outcome, Outcome::Formatted);
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_back_follows_symlinks() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real.py");
        fs::write(&real, "x\n").unwrap();
        std::os::unix::fs::symlink(&real, dir.path().join("link.py")).unwrap();

        assert_eq!(run(&dir, "link.py", &upper_registry()).outcome, Outcome::Formatted);
        assert!(fs::symlink_metadata(dir.path().join("link.py")).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "X\n");
    }

    #[test]
    fn test_failure_without_stderr_reports_exit_code() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("q.py"), "x\n").unwrap();
        let mut registry = FormatterRegistry::new();
        registry.register(
            "py",
            Box::new(FnFormatter::new("quiet", |_| {
                Ok(ToolOutput {
                    stdout: Vec::new(),
                    stderr: " \n".to_string(),
                    exit_code: 7,
                    success: false,
                })
            })),
        );

        let report = run(&dir, "q.py", &registry);
        assert_eq!(
            report.outcome,
            Outcome::Failed(FailReason::Formatter("exited with code 7".to_string()))
        );
        assert_eq!(report.outcome.to_string(), "Failed to format -> exited with code 7");
    }

    #[test]
    fn test_whitespace_only_output_is_written() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("blank.py"), "\n\n\n").unwrap();
        let mut registry = FormatterRegistry::new();
        registry.register("py", Box::new(FnFormatter::new("squash", |_| Ok(ok_output(b"\n")))));

        let report = run(&dir, "blank.py", &registry);
        assert_eq!(report.outcome, Outcome::Formatted);
        assert_eq!(fs::read(dir.path().join("blank.py")).unwrap(), b"\n");
    }

    #[test]
    fn test_non_utf8_output_is_written_byte_for_byte() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("latin.py"), "s = 'x'\n").unwrap();
        let mut registry = FormatterRegistry::new();
        registry.register("py", Box::new(FnFormatter::new("latin1", |_| Ok(ok_output(b"s = \"\xe9\"\n")))));

        let report = run(&dir, "latin.py", &registry);
        assert_eq!(report.outcome, Outcome::Formatted);
        assert_eq!(fs::read(dir.path().join("latin.py")).unwrap(), [115u8, 32, 61, 32, 34, 233, 34, 10]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_input_reaches_external_tool() {
        use crate::formatter::{ToolDefinition, ToolExecutor, ToolPipeline};

        let dir = tempdir().unwrap();
        let content = b"# caf\xe9\nx = 1\n";
        fs::write(dir.path().join("cafe.py"), content).unwrap();
        let mut registry = FormatterRegistry::new();
        registry.register(
            "py",
            Box::new(ToolPipeline::new(
                vec![("cat".to_string(), ToolDefinition::new(&["cat"]))],
                Arc::new(ToolExecutor::default()),
            )),
        );

        let report = run(&dir, "cafe.py", &registry);
        assert_eq!(report.outcome, Outcome::Formatted);
        assert_eq!(fs::read(dir.path().join("cafe.py")).unwrap(), content);
    }
}
