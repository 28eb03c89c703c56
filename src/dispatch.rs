//! Command dispatcher (spec.md §4.D).
//!
//! Resolves `args[0]` as a built-in, a path-bearing executable, or a name
//! found on `$PATH`, and hands anything that isn't a built-in to
//! [`crate::supervisor`]. The built-in registry, path resolution, and
//! supervisor handoff are exactly the three branches spec.md lays out, plus
//! the "not found" fallback.

use crate::builtins::{self, Outcome};
use crate::input::InputBuffer;
use crate::redirect::RedirectionTable;
use crate::supervisor;
use crate::tokenizer::Token;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

pub enum DispatchOutcome {
    Continue(i32),
    Exit(i32),
}

/// Dispatches a non-empty argument vector. `stdin` is the same input buffer
/// the tokeniser reads from — the supervisor relays it to any spawned child.
pub fn dispatch(
    args: &[Token],
    table: &mut RedirectionTable,
    stdin: &mut InputBuffer,
) -> DispatchOutcome {
    let name = args[0].as_str_lossy().into_owned();

    if let Some(builtin) = builtins::lookup(&name) {
        return match (builtin.handler)(args, table) {
            Outcome::Continue(code) => DispatchOutcome::Continue(code),
            Outcome::Exit(code) => DispatchOutcome::Exit(code),
        };
    }

    if name.contains('/') {
        let path = Path::new(&name);
        if !is_executable(path) {
            let _ = writeln!(table.writer(2), "{name}: command not found");
            return DispatchOutcome::Continue(1);
        }
        if path.is_dir() {
            let _ = writeln!(table.writer(2), "{name}: is a directory");
            return DispatchOutcome::Continue(1);
        }
        return DispatchOutcome::Continue(supervisor::run_program(path, args, table, stdin));
    }

    match find_on_path(&name) {
        Some(path) => {
            DispatchOutcome::Continue(supervisor::run_program(&path, args, table, stdin))
        }
        None => {
            let _ = writeln!(table.writer(2), "{name}: command not found");
            DispatchOutcome::Continue(1)
        }
    }
}

/// Searches the `:`-separated entries of `$PATH` in order for the first
/// readable+executable `name`. Shared with the `type` builtin (spec.md
/// §4.E), which reports the resolved path without running anything.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    let Ok(cpath) = std::ffi::CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(cpath.as_ptr(), libc::R_OK | libc::X_OK) == 0 }
}
