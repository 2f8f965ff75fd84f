//! Tool execution engine for running external formatters.
//!
//! This module handles the actual execution of external tools via stdin/stdout,
//! with timeout support and lazy tool availability checking. Stdout and stderr
//! are drained on separate threads so a tool that writes warnings can never
//! interleave them with the formatted output.

use std::collections::HashMap;
use std::env;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Result of executing a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Standard output from the tool, byte-for-byte.
    pub stdout: Vec<u8>,
    /// Standard error from the tool.
    pub stderr: String,
    /// Exit code (0 typically means success).
    pub exit_code: i32,
    /// Whether the tool executed successfully (exit code 0).
    pub success: bool,
}

/// Error during tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Tool binary not found in PATH.
    ToolNotFound { tool: String },
    /// Tool execution failed.
    ExecutionFailed { tool: String, message: String },
    /// Tool execution timed out.
    Timeout { tool: String, timeout_ms: u64 },
    /// I/O error during execution.
    IoError { message: String },
}

impl std::fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToolNotFound { tool } => {
                write!(f, "Tool '{tool}' not found in PATH")
            }
            Self::ExecutionFailed { tool, message } => {
                write!(f, "Tool '{tool}' failed: {message}")
            }
            Self::Timeout { tool, timeout_ms } => {
                write!(f, "Tool '{tool}' timed out after {timeout_ms}ms")
            }
            Self::IoError { message } => {
                write!(f, "I/O error: {message}")
            }
        }
    }
}

impl std::error::Error for ExecutorError {}

/// Executor for running external tools.
///
/// Shared by every job in a run. Tool availability checks are cached, so a
/// missing formatter is only searched for once.
pub struct ToolExecutor {
    /// Cache of tool availability checks (tool name -> available).
    tool_cache: Mutex<HashMap<String, bool>>,
    /// Timeout in milliseconds (0 = wait forever).
    timeout_ms: u64,
}

impl ToolExecutor {
    /// Create a new executor with the given timeout.
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            tool_cache: Mutex::new(HashMap::new()),
            timeout_ms,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Check if a tool is available (lazy, cached).
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        {
            let cache = self.tool_cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(&available) = cache.get(tool_name) {
                return available;
            }
        }

        let available = find_executable(tool_name).is_some();
        log::debug!("[refmt-exec] Tool '{tool_name}' available: {available}");

        self.tool_cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(tool_name.to_string(), available);

        available
    }

    /// Run `argv`, piping `input` to stdin, and capture stdout and stderr.
    ///
    /// Stdout is kept as raw bytes; stderr is only ever shown to people and
    /// is decoded lossily.
    pub fn execute(&self, argv: &[String], input: &[u8]) -> Result<ToolOutput, ExecutorError> {
        let Some(tool_name) = argv.first() else {
            return Err(ExecutorError::ExecutionFailed {
                tool: "unknown".to_string(),
                message: "Empty command".to_string(),
            });
        };

        if !self.is_tool_available(tool_name) {
            return Err(ExecutorError::ToolNotFound {
                tool: tool_name.clone(),
            });
        }

        log::debug!("[refmt-exec] Running {argv:?}");
        let mut child = Command::new(tool_name)
            .args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecutorError::IoError {
                message: format!("Failed to spawn '{tool_name}': {e}"),
            })?;

        let start = Instant::now();

        // The writer owns stdin and closes it when done, so a tool that never
        // reads can only block this thread, not the timeout below
        let mut stdin_handle = child.stdin.take().map(|mut stdin| {
            let input = input.to_vec();
            thread::spawn(move || match stdin.write_all(&input) {
                // The tool exited without reading everything; its exit status tells the story
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            })
        });
        let mut stdout_handle = child
            .stdout
            .take()
            .map(|stdout| thread::spawn(move || read_pipe(stdout)));
        let mut stderr_handle = child
            .stderr
            .take()
            .map(|stderr| thread::spawn(move || read_pipe(stderr)));

        let timeout = Duration::from_millis(self.timeout_ms);
        let status = if timeout.is_zero() {
            child.wait().map_err(|e| ExecutorError::IoError {
                message: format!("Failed to wait for '{tool_name}': {e}"),
            })?
        } else {
            loop {
                if let Some(status) = child.try_wait().map_err(|e| ExecutorError::IoError {
                    message: format!("Failed to poll '{tool_name}': {e}"),
                })? {
                    break status;
                }
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = join_writer(stdin_handle.take());
                    let _ = join_reader(stdout_handle.take());
                    let _ = join_reader(stderr_handle.take());
                    return Err(ExecutorError::Timeout {
                        tool: tool_name.clone(),
                        timeout_ms: self.timeout_ms,
                    });
                }
                thread::sleep(Duration::from_millis(10));
            }
        };

        join_writer(stdin_handle.take()).map_err(|e| ExecutorError::IoError { message: e })?;
        let stdout = join_reader(stdout_handle.take()).map_err(|e| ExecutorError::IoError { message: e })?;
        let stderr = join_reader(stderr_handle.take()).map_err(|e| ExecutorError::IoError { message: e })?;
        let exit_code = status.code().unwrap_or(-1);

        Ok(ToolOutput {
            stdout,
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
            success: status.success(),
        })
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new(30_000) // 30 seconds default
    }
}

/// Resolve a tool name the way the shell would: names containing a path
/// separator are used as-is, anything else is searched for in `PATH`.
pub fn find_executable(tool_name: &str) -> Option<PathBuf> {
    let candidate = Path::new(tool_name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        executable_names(tool_name)
            .into_iter()
            .map(|name| dir.join(name))
            .find(|path| is_executable(path))
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(windows)]
fn executable_names(tool_name: &str) -> Vec<String> {
    let mut names = vec![tool_name.to_string()];
    if Path::new(tool_name).extension().is_none() {
        let exts = env::var("PATHEXT").unwrap_or_else(|_| ".COM;.EXE;.BAT;.CMD".to_string());
        names.extend(exts.split(';').filter(|e| !e.is_empty()).map(|ext| format!("{tool_name}{ext}")));
    }
    names
}

#[cfg(not(windows))]
fn executable_names(tool_name: &str) -> Vec<String> {
    vec![tool_name.to_string()]
}

fn read_pipe<R: Read>(mut pipe: R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)?;
    Ok(buf)
}

fn join_reader(handle: Option<thread::JoinHandle<io::Result<Vec<u8>>>>) -> Result<Vec<u8>, String> {
    match handle {
        Some(handle) => match handle.join() {
            Ok(res) => res.map_err(|e| format!("Failed to read output: {e}")),
            Err(_) => Err("Output reader thread panicked".to_string()),
        },
        None => Ok(Vec::new()),
    }
}

fn join_writer(handle: Option<thread::JoinHandle<io::Result<()>>>) -> Result<(), String> {
    match handle {
        Some(handle) => match handle.join() {
            Ok(res) => res.map_err(|e| format!("Failed to write to stdin: {e}")),
            Err(_) => Err("Input writer thread panicked".to_string()),
        },
        None => Ok(()),
    }
}
