//! Redirection collector (spec.md §4.C).
//!
//! Walks an already-tokenised command line and splits it into the plain
//! argument vector and a sparse fd → file table. Only `>` (truncate) and
//! `>>` (append) are recognised, each optionally preceded by a bare
//! base-0-integer token naming the target fd (defaulting to 1, stdout).
//! Quoted or escaped `>`/`>>` tokens are ordinary arguments — the tokeniser
//! already tagged those (see [`crate::tokenizer::Token::is_operator`]).

use crate::error::ShellError;
use crate::numeric::parse_c_integer;
use crate::tokenizer::Token;
use std::fs::{File, OpenOptions};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Truncate,
    Append,
}

struct Entry {
    file: File,
    #[allow(dead_code)]
    mode: Mode,
}

/// A sparse fd → open-file table, indexed directly by fd number.
#[derive(Default)]
pub struct RedirectionTable {
    entries: Vec<Option<Entry>>,
}

impl RedirectionTable {
    pub fn new() -> Self {
        RedirectionTable { entries: Vec::new() }
    }

    fn set(&mut self, fd: usize, file: File, mode: Mode) {
        if self.entries.len() <= fd {
            self.entries.resize_with(fd + 1, || None);
        }
        self.entries[fd] = Some(Entry { file, mode });
    }

    /// A writer for `fd`: the redirected file if one was opened for it,
    /// otherwise the process's own stdout/stderr (anything other than 2
    /// falls back to stdout, matching the original's default).
    pub fn writer(&mut self, fd: i32) -> Box<dyn Write + '_> {
        if fd >= 0 {
            if let Some(Some(entry)) = self.entries.get_mut(fd as usize) {
                return Box::new(&mut entry.file);
            }
        }
        if fd == 2 {
            Box::new(std::io::stderr())
        } else {
            Box::new(std::io::stdout())
        }
    }

    /// Duplicates every redirected fd over its slot in the child — called
    /// after `fork()`, before `execve()`. See [`crate::supervisor`].
    #[cfg(unix)]
    pub fn apply_in_child(&self) {
        use std::os::unix::io::AsRawFd;
        for (fd, entry) in self.entries.iter().enumerate() {
            if let Some(entry) = entry {
                unsafe {
                    libc::dup2(entry.file.as_raw_fd(), fd as libc::c_int);
                }
            }
        }
    }

    /// Every iteration's redirection files are closed unconditionally once
    /// the command completes, matching the original's `cont:` cleanup —
    /// dropping the table does this, this just makes the call site explicit.
    pub fn close_all(self) {
        drop(self);
    }
}

/// Splits `tokens` into plain arguments and a redirection table. An empty
/// resulting argument vector is not an error (spec.md §4.C edge case,
/// original_source §4.1 of SPEC_FULL.md): a bare `> file` with nothing else
/// on the line still opens the file, it just dispatches nothing.
pub fn collect(tokens: Vec<Token>) -> Result<(Vec<Token>, RedirectionTable), ShellError> {
    let mut args: Vec<Token> = Vec::new();
    let mut table = RedirectionTable::new();
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        let append = token.is_operator(b">>");
        let truncate = token.is_operator(b">");
        if !append && !truncate {
            args.push(token);
            continue;
        }

        let mut fd: i64 = 1;
        if let Some(last) = args.last() {
            if !last.quoted && !last.escaped {
                if let Some(n) = parse_c_integer(&last.as_str_lossy()) {
                    fd = n;
                    args.pop();
                }
            }
        }
        if fd < 0 {
            return Err(ShellError::Syntax(
                "redirection error, negative file descriptor".to_string(),
            ));
        }

        let filename = iter.next().ok_or_else(|| {
            ShellError::Syntax("syntax error, missing filename of redirect".to_string())
        })?;
        let path = filename.as_str_lossy().into_owned();

        let mut options = OpenOptions::new();
        options.write(true).create(true);
        if append {
            options.append(true);
        } else {
            options.truncate(true);
        }
        let file = options
            .open(&path)
            .map_err(|source| ShellError::OpenFile { path: path.clone(), source })?;

        table.set(fd as usize, file, if append { Mode::Append } else { Mode::Truncate });
    }

    Ok((args, table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(s: &str) -> Token {
        Token {
            bytes: s.as_bytes().to_vec(),
            quoted: false,
            escaped: false,
        }
    }

    fn tmpfile(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("jsh-redirect-test-{}-{name}", std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn plain_truncate_redirect() {
        let path = tmpfile("truncate");
        let tokens = vec![tok("echo"), tok("hi"), tok(">"), tok(&path)];
        let (args, _table) = collect(tokens).unwrap();
        assert_eq!(args.len(), 2);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn fd_prefixed_redirect_consumes_the_preceding_integer() {
        let path = tmpfile("fdprefix");
        let tokens = vec![tok("cmd"), tok("2"), tok(">"), tok(&path)];
        let (args, _table) = collect(tokens).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].as_str_lossy(), "cmd");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_filename_is_a_syntax_error() {
        let tokens = vec![tok("echo"), tok(">")];
        assert!(collect(tokens).is_err());
    }

    #[test]
    fn bare_redirect_with_empty_argv_still_opens_the_file() {
        let path = tmpfile("barebones");
        let tokens = vec![tok(">"), tok(&path)];
        let (args, _table) = collect(tokens).unwrap();
        assert!(args.is_empty());
        assert!(std::path::Path::new(&path).exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn quoted_redirect_token_is_an_ordinary_argument() {
        let quoted_gt = Token {
            bytes: b">".to_vec(),
            quoted: true,
            escaped: false,
        };
        let tokens = vec![tok("echo"), quoted_gt];
        let (args, _table) = collect(tokens).unwrap();
        assert_eq!(args.len(), 2);
    }
}
