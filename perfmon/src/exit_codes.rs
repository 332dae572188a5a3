#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// An experiment completed, but some unit failed to spawn or exited non-zero.
    ChildrenFailed = 20,

    /// At least one log could not be read or analyzed.
    AnalysisFailed = 21,

    /// Invalid CLI/config/options (bad flags, invalid durations, unreadable descriptors, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, unexpected invariants).
    RuntimeError = 40,

    /// Stopped by Ctrl-C; live children were killed.
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
