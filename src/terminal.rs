//! Raw-mode terminal management (spec.md §4.G).
//!
//! `TerminalGuard` clears `ICANON`/`ISIG`/`ECHO` and sets `VMIN=0`/`VTIME=0`
//! so reads return immediately with whatever bytes are available (possibly
//! none) instead of blocking for a full canonical line. Restoration is
//! idempotent and reachable from every exit path: normal fall-through,
//! `exit`, and `fatal()`.

use std::os::unix::io::RawFd;
use std::sync::OnceLock;

// Populated once, the first time a guard successfully reads the original
// `termios`. `fatal()` and `exit` read it back through `restore_now`
// without needing a live `TerminalGuard` in scope.
static ORIGINAL_TERMIOS: OnceLock<Option<libc::termios>> = OnceLock::new();

pub struct TerminalGuard {
    fd: RawFd,
    active: bool,
}

impl TerminalGuard {
    /// Saves the current terminal attributes for `fd` and switches it into
    /// raw mode. If `fd` isn't a terminal (e.g. tests piping stdin from a
    /// file), attributes can't be read and the guard becomes a no-op —
    /// matching the teacher's non-tty fallback in `editor.rs`.
    pub fn enter(fd: RawFd) -> std::io::Result<Self> {
        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut original) } != 0 {
            let _ = ORIGINAL_TERMIOS.set(None);
            return Ok(TerminalGuard { fd, active: false });
        }
        let _ = ORIGINAL_TERMIOS.set(Some(original));

        let mut raw = original;
        raw.c_lflag &= !(libc::ICANON | libc::ISIG | libc::ECHO);
        raw.c_cc[libc::VMIN] = 0;
        raw.c_cc[libc::VTIME] = 0;
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(std::io::Error::last_os_error());
        }

        Ok(TerminalGuard { fd, active: true })
    }

    /// A guard that owns no terminal state — used when `enter` fails but
    /// the shell should keep running in cooked mode rather than abort.
    pub fn cooked(fd: RawFd) -> Self {
        TerminalGuard { fd, active: false }
    }

    /// Restores the saved `termios`, if one was ever captured. Safe to call
    /// repeatedly (from `Drop`, from `fatal()`, from the `exit` builtin)
    /// since it only reads from the write-once snapshot.
    pub fn restore_now(fd: RawFd) {
        if let Some(Some(original)) = ORIGINAL_TERMIOS.get() {
            unsafe {
                libc::tcsetattr(fd, libc::TCSANOW, original);
            }
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active {
            Self::restore_now(self.fd);
        }
    }
}
