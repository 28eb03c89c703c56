//! Main loop (spec.md §4.H): prompt → tokenise → collect redirections →
//! dispatch → clean up, looping until EOF.

mod builtins;
mod cli;
mod dispatch;
mod error;
mod input;
mod numeric;
mod redirect;
mod status;
mod supervisor;
mod terminal;
mod tokenizer;

use dispatch::DispatchOutcome;
use input::InputBuffer;
use std::io::Write;
use terminal::TerminalGuard;
use tokenizer::{TokenError, TokenOutcome, Tokenizer};

const PROMPT: &str = "$ ";

fn main() {
    cli::parse();

    let guard = match TerminalGuard::enter(libc::STDIN_FILENO) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("jsh: warning: failed to enter raw mode: {e}");
            TerminalGuard::cooked(libc::STDIN_FILENO)
        }
    };

    let mut input = InputBuffer::new(libc::STDIN_FILENO);
    let exit_code = run(&mut input);

    drop(guard);
    std::process::exit(exit_code);
}

/// Runs the prompt/tokenise/dispatch loop until the input fd hits EOF or an
/// `exit` builtin requests termination.
fn run(input: &mut InputBuffer) -> i32 {
    print_prompt();

    loop {
        if let Some(tokens) = read_line(input) {
            match redirect::collect(tokens) {
                Ok((args, mut table)) => {
                    if !args.is_empty() {
                        if let DispatchOutcome::Exit(code) =
                            dispatch::dispatch(&args, &mut table, input)
                        {
                            table.close_all();
                            return code;
                        }
                    }
                    table.close_all();
                }
                Err(msg) => eprintln!("{msg}"),
            }
        }
        // A syntax error or Ctrl-C interrupt (`read_line` returning `None`)
        // discards the line and falls straight through to the same
        // eof-check/re-prompt as a normal iteration (spec.md §4.H).

        if input.is_eof() {
            return 0;
        }
        print_prompt();
    }
}

/// Reads one line's worth of tokens. `None` means the line was abandoned
/// (syntax error or Ctrl-C interrupt) — the caller discards it and
/// re-prompts without dispatching anything.
fn read_line(input: &mut InputBuffer) -> Option<Vec<tokenizer::Token>> {
    let mut tokens = Vec::new();
    loop {
        let is_first_word = tokens.is_empty();
        let mut tokenizer = Tokenizer::new(input);
        match tokenizer.next_token(b" ", is_first_word) {
            Ok(TokenOutcome::EndOfLine) => return Some(tokens),
            Ok(TokenOutcome::Token(tok)) => tokens.push(tok),
            Err(TokenError::Interrupted) => return None,
            Err(TokenError::Syntax(msg)) => {
                eprintln!("{msg}");
                return None;
            }
        }
    }
}

fn print_prompt() {
    print!("{PROMPT}");
    let _ = std::io::stdout().flush();
}
