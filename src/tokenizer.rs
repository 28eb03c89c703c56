//! Quoting/escaping tokeniser (spec.md §4.B).
//!
//! `Tokenizer::next_token` pulls one word at a time off an [`InputBuffer`],
//! tracking a small quote-state machine, `~`/`~user` expansion, and
//! embedded `>`/`>>` redirection-operator recognition. It reacts to
//! Ctrl-C (discard the line), Ctrl-D (bell, or end-of-input at the very
//! start of a line), and Tab (builtin-name completion on the first word
//! only) as it goes.

use crate::builtins;
use crate::input::InputBuffer;
use std::io::Write;

/// One lexical unit of a command line: either an ordinary word or a bare
/// `>`/`>>` redirection operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub bytes: Vec<u8>,
    /// Whether any part of the token was produced by a quote pair — used
    /// by the redirection collector to tell a literal `>` the user quoted
    /// from the operator.
    pub quoted: bool,
    /// Whether the *last* character appended came from a backslash escape
    /// inside double quotes — mirrors the original's per-arg `escaped`
    /// flag, used the same way: to suppress operator recognition.
    pub escaped: bool,
}

impl Token {
    fn literal(bytes: Vec<u8>) -> Self {
        Token {
            bytes,
            quoted: false,
            escaped: false,
        }
    }

    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    pub fn is_operator(&self, text: &[u8]) -> bool {
        !self.quoted && !self.escaped && self.bytes == text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Unquoted,
    Single,
    Double,
}

pub enum TokenOutcome {
    Token(Token),
    EndOfLine,
}

pub enum TokenError {
    /// Ctrl-C: the in-progress line must be discarded entirely.
    Interrupted,
    Syntax(String),
}

enum SkipOutcome {
    EndOfLine,
    HaveToken,
}

pub struct Tokenizer<'a> {
    input: &'a mut InputBuffer,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a mut InputBuffer) -> Self {
        Tokenizer { input }
    }

    /// `delims` are the bytes (besides `\n`, which always ends a line)
    /// that separate words — the main loop passes `b" "`.
    /// `is_first_word` gates Tab-completion and the Ctrl-D-as-EOF rule.
    pub fn next_token(
        &mut self,
        delims: &[u8],
        is_first_word: bool,
    ) -> Result<TokenOutcome, TokenError> {
        match self.skip_delimiters(delims, is_first_word)? {
            SkipOutcome::EndOfLine => Ok(TokenOutcome::EndOfLine),
            SkipOutcome::HaveToken => {
                if self.input.peek() == Some(b'~') {
                    self.read_tilde(delims, is_first_word)
                } else {
                    self.read_word(delims, is_first_word).map(TokenOutcome::Token)
                }
            }
        }
    }

    fn skip_delimiters(
        &mut self,
        delims: &[u8],
        is_first_word: bool,
    ) -> Result<SkipOutcome, TokenError> {
        loop {
            match self.input.peek() {
                None => return Ok(SkipOutcome::EndOfLine),
                Some(b'\n') => {
                    self.input.read();
                    return Ok(SkipOutcome::EndOfLine);
                }
                Some(0x03) => {
                    self.input.advance_silently();
                    println!("^C");
                    return Err(TokenError::Interrupted);
                }
                Some(0x04) => {
                    self.input.advance_silently();
                    if is_first_word {
                        println!();
                        self.input.force_eof();
                        return Ok(SkipOutcome::EndOfLine);
                    }
                    ring_bell();
                }
                Some(b) if delims.contains(&b) => {
                    self.input.read();
                }
                Some(_) => return Ok(SkipOutcome::HaveToken),
            }
        }
    }

    /// Handles a word whose first byte is `~`: plain `~`/`~/path` expand to
    /// `$HOME`; `~user`/`~user/path` look the user up in the password
    /// database. A lookup miss falls back to the literal text, and on both
    /// paths the remainder of the word (after the tilde portion) is read
    /// with ordinary word rules so quoting/escapes inside it still work.
    fn read_tilde(
        &mut self,
        delims: &[u8],
        is_first_word: bool,
    ) -> Result<TokenOutcome, TokenError> {
        self.input.read(); // consume '~'

        match self.input.peek() {
            None => Ok(TokenOutcome::Token(Token::literal(home_dir().into_bytes()))),
            Some(b) if b == b'/' => {
                let rest = self.read_word(delims, is_first_word)?;
                Ok(TokenOutcome::Token(prepend(&home_dir(), rest)))
            }
            Some(b) if delims.contains(&b) || b == b'\n' => {
                Ok(TokenOutcome::Token(Token::literal(home_dir().into_bytes())))
            }
            Some(_) => {
                let mut username = Vec::new();
                loop {
                    match self.input.peek() {
                        None => break,
                        Some(b'/') => break,
                        Some(b) if delims.contains(&b) || b == b'\n' => break,
                        Some(_) => username.push(self.input.read().unwrap()),
                    }
                }

                match lookup_user_home(&username) {
                    Some(home) => {
                        if self.input.peek() == Some(b'/') {
                            let rest = self.read_word(delims, is_first_word)?;
                            Ok(TokenOutcome::Token(prepend(&home, rest)))
                        } else {
                            Ok(TokenOutcome::Token(Token::literal(home.into_bytes())))
                        }
                    }
                    None => {
                        let rest = self.read_word(delims, is_first_word)?;
                        let mut bytes = Vec::with_capacity(username.len() + rest.bytes.len() + 1);
                        bytes.push(b'~');
                        bytes.extend_from_slice(&username);
                        bytes.extend_from_slice(&rest.bytes);
                        Ok(TokenOutcome::Token(Token {
                            bytes,
                            quoted: rest.quoted,
                            escaped: rest.escaped,
                        }))
                    }
                }
            }
        }
    }

    /// The main per-byte state machine: quoting, escaping, embedded
    /// redirection-operator recognition, line continuation, and the
    /// Ctrl-C/Ctrl-D/Tab control-key reactions.
    fn read_word(&mut self, delims: &[u8], is_first_word: bool) -> Result<Token, TokenError> {
        let mut bytes = Vec::new();
        let mut quoted = false;
        let mut escaped = false;
        let mut quote = QuoteState::Unquoted;

        loop {
            let should_continue = match self.input.peek() {
                None => false,
                Some(b) => quote != QuoteState::Unquoted || !delims.contains(&b),
            };
            if !should_continue {
                break;
            }

            if quote == QuoteState::Unquoted && self.input.peek() == Some(b'>') {
                if bytes.is_empty() {
                    self.input.read();
                    bytes.push(b'>');
                    if self.input.peek() == Some(b'>') {
                        self.input.read();
                        bytes.push(b'>');
                    }
                    return Ok(Token {
                        bytes,
                        quoted: false,
                        escaped: false,
                    });
                }
                break;
            }

            escaped = false;
            let byte = self.input.peek().expect("loop guard ensures a byte");

            match byte {
                0x03 => {
                    self.input.advance_silently();
                    println!("^C");
                    return Err(TokenError::Interrupted);
                }
                0x04 => {
                    self.input.advance_silently();
                    ring_bell();
                }
                0x09 if is_first_word && bytes.iter().all(|b| !b.is_ascii_whitespace()) => {
                    self.input.advance_silently();
                    match builtins::complete(&bytes) {
                        Some(full) => {
                            let suffix = &full.as_bytes()[bytes.len()..];
                            print!("{}", String::from_utf8_lossy(suffix));
                            let _ = std::io::stdout().flush();
                            bytes.extend_from_slice(suffix);
                        }
                        None => ring_bell(),
                    }
                }
                0x09 => {
                    self.input.advance_silently();
                    ring_bell();
                }
                b'\'' => {
                    self.input.read();
                    match quote {
                        QuoteState::Unquoted => {
                            quote = QuoteState::Single;
                            quoted = true;
                        }
                        QuoteState::Single => quote = QuoteState::Unquoted,
                        QuoteState::Double => bytes.push(b'\''),
                    }
                }
                b'"' => {
                    self.input.read();
                    match quote {
                        QuoteState::Unquoted => {
                            quote = QuoteState::Double;
                            quoted = true;
                        }
                        QuoteState::Double => quote = QuoteState::Unquoted,
                        QuoteState::Single => bytes.push(b'"'),
                    }
                }
                b'\\' => {
                    self.input.read();
                    match quote {
                        QuoteState::Single => bytes.push(b'\\'),
                        QuoteState::Unquoted => match self.input.peek() {
                            None => {}
                            Some(b'\n') => {
                                self.input.advance_silently();
                                print_continuation();
                            }
                            Some(_) => bytes.push(self.input.read().unwrap()),
                        },
                        QuoteState::Double => match self.input.peek() {
                            None => {}
                            Some(b'\n') => {
                                self.input.advance_silently();
                                bytes.push(b'\n');
                                print_continuation();
                                escaped = true;
                            }
                            Some(c @ (b'\\' | b'$' | b'"' | b'>')) => {
                                self.input.read();
                                bytes.push(c);
                                escaped = true;
                            }
                            Some(_) => {
                                bytes.push(b'\\');
                                bytes.push(self.input.read().unwrap());
                            }
                        },
                    }
                }
                b'\n' => {
                    self.input.advance_silently();
                    bytes.push(b'\n');
                    print_continuation();
                }
                _ => bytes.push(self.input.read().unwrap()),
            }
        }

        if quote != QuoteState::Unquoted {
            let which = if quote == QuoteState::Single {
                "single"
            } else {
                "double"
            };
            return Err(TokenError::Syntax(format!(
                "syntax error: unterminated {which} quote"
            )));
        }

        Ok(Token {
            bytes,
            quoted,
            escaped,
        })
    }
}

fn prepend(home: &str, rest: Token) -> Token {
    let mut bytes = Vec::with_capacity(home.len() + rest.bytes.len());
    bytes.extend_from_slice(home.as_bytes());
    bytes.extend_from_slice(&rest.bytes);
    Token {
        bytes,
        quoted: rest.quoted,
        escaped: rest.escaped,
    }
}

fn home_dir() -> String {
    std::env::var("HOME").unwrap_or_default()
}

#[cfg(unix)]
fn lookup_user_home(username: &[u8]) -> Option<String> {
    let cstring = std::ffi::CString::new(username).ok()?;
    let passwd = unsafe { libc::getpwnam(cstring.as_ptr()) };
    if passwd.is_null() {
        return None;
    }
    let home = unsafe { std::ffi::CStr::from_ptr((*passwd).pw_dir) };
    Some(home.to_string_lossy().into_owned())
}

fn ring_bell() {
    print!("\x07");
    let _ = std::io::stdout().flush();
}

fn print_continuation() {
    print!("\n> ");
    let _ = std::io::stdout().flush();
}
