/// Exit codes for refmt
///
/// Scripts calling refmt only need to check for zero; the split between
/// failure and tool error tells a broken run apart from a broken setup.
/// Success - Every file was formatted or skipped
pub const SUCCESS: i32 = 0;

/// Failure - No files were given, or at least one file failed to format
pub const FAILURE: i32 = 1;

/// Tool error - Configuration error or internal error
pub const TOOL_ERROR: i32 = 2;

/// Helper functions for consistent exit behavior
pub mod exit {
    use super::{FAILURE, TOOL_ERROR};

    /// Exit with failure code (1)
    pub fn failure() -> ! {
        std::process::exit(FAILURE);
    }

    /// Exit with tool error code (2)
    pub fn tool_error() -> ! {
        std::process::exit(TOOL_ERROR);
    }
}
