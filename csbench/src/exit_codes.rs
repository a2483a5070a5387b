#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// The run finished but at least one API call or bulk task failed.
    PartialFailure = 10,

    /// Invalid CLI/config/options (bad flags, unreadable config, missing admin profile, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (report or log file I/O, unexpected invariants).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_failures(failed: u64) -> Self {
        if failed == 0 {
            Self::Success
        } else {
            Self::PartialFailure
        }
    }
}
