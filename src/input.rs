//! Non-blocking, poll-driven, manually-echoing input buffer (spec.md §4.A).
//!
//! `InputBuffer` wraps a single fd (almost always stdin) in a ring-like
//! byte buffer. Two access patterns sit on top of it:
//!
//! - The blocking, echoing accessors (`peek`/`read`/`is_eof`) used by
//!   [`crate::tokenizer`]: every consumed byte is echoed to the controlling
//!   terminal, and a call blocks (via `poll` with an infinite timeout) until
//!   at least one byte is available or the fd hits EOF.
//! - The non-blocking, non-echoing accessors (`fill_nonblocking`/`pending`/
//!   `advance`) used by [`crate::supervisor`] to peek at newly arrived
//!   keystrokes without stalling the pump loop waiting on the child.

use crate::error::fatal;
use std::io::Write;
use std::os::unix::io::RawFd;

/// Kept comfortably above a typical terminal line length; compaction keeps
/// this from ever needing to grow.
const CAPACITY: usize = 8192;

pub struct InputBuffer {
    fd: RawFd,
    buffer: Vec<u8>,
    offset: usize,
    length: usize,
    eof: bool,
}

impl InputBuffer {
    pub fn new(fd: RawFd) -> Self {
        InputBuffer {
            fd,
            buffer: vec![0; CAPACITY],
            offset: 0,
            length: 0,
            eof: false,
        }
    }

    /// The underlying fd, for the supervisor's own `poll` set.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Blocks (if necessary) until a byte is available, without consuming
    /// it.
    pub fn peek(&mut self) -> Option<u8> {
        if self.offset >= self.length && !self.eof {
            self.fill(true).unwrap_or_else(|e| fatal(self.fd, "read", e));
        }
        if self.offset < self.length {
            Some(self.buffer[self.offset])
        } else {
            None
        }
    }

    /// Blocks (if necessary), consumes one byte, and echoes it to stdout.
    pub fn read(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.offset += 1;
        self.echo(&[byte]);
        Some(byte)
    }

    /// Consumes one already-peeked byte without echoing it — used for
    /// control keys (Ctrl-C, Ctrl-D, Tab) whose reaction is a symbol of the
    /// shell's own choosing, not the raw byte.
    pub fn advance_silently(&mut self) {
        if self.offset < self.length {
            self.offset += 1;
        }
    }

    pub fn is_eof(&mut self) -> bool {
        self.peek().is_none()
    }

    /// Forces EOF immediately, used when a leading Ctrl-D at the start of
    /// the first word of a line should end the whole input stream.
    pub fn force_eof(&mut self) {
        self.eof = true;
        self.offset = self.length;
    }

    /// Non-blocking variant used by the supervisor: pulls in whatever is
    /// currently available (possibly nothing) without stalling.
    pub fn fill_nonblocking(&mut self) {
        self.fill(false)
            .unwrap_or_else(|e| fatal(self.fd, "read", e));
    }

    /// The unread byte window, for the supervisor's direct inspection.
    pub fn pending(&self) -> &[u8] {
        &self.buffer[self.offset..self.length]
    }

    /// Consumes `n` bytes from the front of `pending()` without echoing —
    /// the supervisor performs its own, selective echo.
    pub fn advance(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.length);
    }

    fn echo(&self, bytes: &[u8]) {
        let mut out = std::io::stdout();
        let _ = out.write_all(bytes);
        let _ = out.flush();
    }

    fn compact(&mut self) {
        if self.offset == self.length {
            self.offset = 0;
            self.length = 0;
        } else if self.offset > self.buffer.len() / 2 {
            self.buffer.copy_within(self.offset..self.length, 0);
            self.length -= self.offset;
            self.offset = 0;
        }
    }

    /// Tops up the buffer. `blocking` selects an infinite vs. zero `poll`
    /// timeout. Returns `Err` only for a genuine `poll`/`read` failure other
    /// than `EINTR`, which the caller treats as fatal.
    fn fill(&mut self, blocking: bool) -> std::io::Result<()> {
        if self.eof {
            return Ok(());
        }
        let available = self.length - self.offset;
        if available > 0 && available >= self.buffer.len() / 2 {
            return Ok(());
        }

        loop {
            self.compact();
            let mut pfd = libc::pollfd {
                fd: self.fd,
                events: libc::POLLIN,
                revents: 0,
            };
            let timeout = if blocking { -1 } else { 0 };
            let rc = unsafe { libc::poll(&mut pfd, 1, timeout) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if rc == 0 {
                // Nothing ready. For the non-blocking caller this just
                // means "no new bytes right now"; a blocking poll only
                // returns 0 on timeout, which can't happen with timeout -1.
                return Ok(());
            }

            if pfd.revents & libc::POLLNVAL != 0 {
                self.eof = true;
                return Ok(());
            }

            let n = unsafe {
                libc::read(
                    self.fd,
                    self.buffer.as_mut_ptr().add(self.length) as *mut libc::c_void,
                    self.buffer.len() - self.length,
                )
            };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted
                    || err.kind() == std::io::ErrorKind::WouldBlock
                {
                    if blocking {
                        continue;
                    }
                    return Ok(());
                }
                return Err(err);
            }
            if n == 0 {
                self.eof = true;
                return Ok(());
            }
            self.length += n as usize;
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::AsRawFd;

    fn buffer_over_pipe(data: &[u8]) -> (InputBuffer, std::fs::File) {
        let (read_fd, write_fd) = os_pipe_pair();
        let mut writer = write_fd;
        std::io::Write::write_all(&mut writer, data).unwrap();
        drop(writer);
        (InputBuffer::new(read_fd.as_raw_fd()), read_fd)
    }

    fn os_pipe_pair() -> (std::fs::File, std::fs::File) {
        use std::os::unix::io::FromRawFd;
        let mut fds = [0i32; 2];
        assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
        unsafe { (std::fs::File::from_raw_fd(fds[0]), std::fs::File::from_raw_fd(fds[1])) }
    }

    #[test]
    fn peek_does_not_consume() {
        let (mut buf, _keep) = buffer_over_pipe(b"ab");
        assert_eq!(buf.peek(), Some(b'a'));
        assert_eq!(buf.peek(), Some(b'a'));
    }

    #[test]
    fn read_consumes_in_order() {
        let (mut buf, _keep) = buffer_over_pipe(b"ab");
        assert_eq!(buf.read(), Some(b'a'));
        assert_eq!(buf.read(), Some(b'b'));
    }

    #[test]
    fn empty_input_is_eof() {
        let (mut buf, _keep) = buffer_over_pipe(b"");
        assert!(buf.is_eof());
    }

    #[test]
    fn force_eof_stops_further_reads() {
        let (mut buf, _keep) = buffer_over_pipe(b"ab");
        buf.force_eof();
        assert_eq!(buf.read(), None);
    }
}
