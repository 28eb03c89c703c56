//! Crate-local error taxonomy.
//!
//! Two classes of failure exist in this shell (spec.md §7): recoverable
//! ones that unwind to the main loop as a `Result` and get printed without
//! disturbing shell state (syntax errors, `Ctrl-C` interrupts), and
//! unrecoverable ones (an OS call the shell depends on for basic liveness
//! fails) that have no sane recovery and must restore the terminal before
//! the process dies — mirroring the C original's `ABORT()` macro.

use std::os::unix::io::RawFd;
use thiserror::Error;

/// Errors that can be reported to the user and recovered from by
/// re-prompting. Carried by [`crate::redirect`]'s collector.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{0}")]
    Syntax(String),

    #[error("{path}: {source}")]
    OpenFile {
        path: String,
        source: std::io::Error,
    },
}

/// Reports an unrecoverable OS-call failure, restores the terminal, and
/// aborts the process.
///
/// Used only for failures that leave the shell with no consistent state to
/// resume from: a failed `poll`/`read` on the controlling terminal, a
/// failed `fork`/`pipe`/`dup2`. Everything else goes through `ShellError`.
pub fn fatal(fd: RawFd, context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("jsh: fatal: {context}: {err}");
    crate::terminal::TerminalGuard::restore_now(fd);
    std::process::abort();
}
