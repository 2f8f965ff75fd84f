//! Diagnostic output for refmt
//!
//! Every job ends in exactly one block on the diagnostic stream:
//!
//! ```text
//! src/app.py:
//!   Formatted
//! ```
//!
//! Jobs report concurrently, so each block is rendered up front and written
//! with a single locked `write_all`. Blocks from different jobs never
//! interleave, although their order is unspecified.

use crate::job::{JobReport, Outcome};
use colored::*;
use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;

/// Indentation of the status line under the path
const INDENT: &str = "  ";

/// Shared, line-atomic writer for diagnostic blocks.
pub struct DiagnosticWriter {
    sink: Mutex<Box<dyn Write + Send>>,
    use_colors: bool,
}

impl DiagnosticWriter {
    pub fn new(sink: Box<dyn Write + Send>, use_colors: bool) -> Self {
        Self {
            sink: Mutex::new(sink),
            use_colors,
        }
    }

    /// Writer on stderr, colored when stderr is a terminal and colors are not
    /// disabled through the environment.
    pub fn stderr() -> Self {
        let use_colors = io::stderr().is_terminal() && colored::control::SHOULD_COLORIZE.should_colorize();
        Self::new(Box::new(io::stderr()), use_colors)
    }

    /// Write the block for one finished job.
    pub fn report(&self, report: &JobReport) -> io::Result<()> {
        let block = format_block(&report.display_path, &report.outcome, self.use_colors);
        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        sink.write_all(block.as_bytes())?;
        sink.flush()
    }
}

/// Render the block for `outcome`. Continuation lines of multi-line error
/// text are indented under the status line.
pub fn format_block(display_path: &str, outcome: &Outcome, use_colors: bool) -> String {
    let message = outcome.to_string();
    let mut lines = message.lines();
    let first = lines.next().unwrap_or_default();

    let status = if use_colors {
        match outcome {
            Outcome::Formatted => first.green().to_string(),
            Outcome::Skipped(_) => first.yellow().to_string(),
            Outcome::Failed(_) => first.red().to_string(),
        }
    } else {
        first.to_string()
    };

    let mut block = format!("{display_path}:\n{INDENT}{status}\n");
    for line in lines {
        block.push_str(INDENT);
        block.push_str(INDENT);
        block.push_str(line);
        block.push('\n');
    }
    block
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// A cloneable in-memory sink for capturing diagnostics.
    #[derive(Clone, Default)]
    pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
