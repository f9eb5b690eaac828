//! Script execution domain types

use std::time::Duration;

/// Exit code reported when the script was killed because it ran past its deadline
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Exit code reported when the script never started or was killed by a signal
pub const ABNORMAL_EXIT_CODE: i32 = -2;

/// Record of one script run
///
/// Produced once per runner invocation and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptExecution {
    pub exit_code: i32,
    /// Everything the script wrote: stdout followed by stderr
    pub output: String,
    /// Description of a launch failure, non-zero exit or timeout; empty on success
    pub shell_error: String,
    /// Wall-clock time between launch and exit (or termination)
    pub duration: Duration,
}

impl ScriptExecution {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }
}
