/*
 * Error Model
 *
 * Two kinds of failure exist in this library:
 *
 * - Misuse: the client violated the contract (bad thread id, non-positive
 *   argument, operation before init). Recoverable: the operation returns an
 *   error and scheduler state is unchanged.
 * - System: a host OS primitive (sigaction, setitimer, sigprocmask) failed.
 *   Fatal: the API surface reports it on standard error and exits the
 *   process with status 1; scheduler state is not guaranteed salvageable.
 *
 * No error ever propagates through a context switch. All failure paths
 * return to the caller before any RESUME.
 */

use std::fmt;

/// Result alias used by the scheduler internals.
pub type Result<T> = std::result::Result<T, Error>;

/// A failure raised by the thread library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Contract violation by the client. Scheduler state is unchanged.
    Misuse(&'static str),

    /// A host OS call failed, with the errno it reported.
    System { call: &'static str, errno: i32 },
}

impl Error {
    /// Capture the current `errno` for a failed OS call.
    pub fn system(call: &'static str) -> Self {
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        Error::System { call, errno }
    }

    /// True for errors that must abort the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::System { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Misuse(msg) => write!(f, "{msg}"),
            Error::System { call, errno } => write!(f, "{call} failed (errno {errno})"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misuse_displays_bare_message() {
        let err = Error::Misuse("thread id out of range");
        assert_eq!(err.to_string(), "thread id out of range");
        assert!(!err.is_fatal());
    }

    #[test]
    fn system_displays_call_and_errno() {
        let err = Error::System { call: "setitimer", errno: 22 };
        assert_eq!(err.to_string(), "setitimer failed (errno 22)");
        assert!(err.is_fatal());
    }
}
