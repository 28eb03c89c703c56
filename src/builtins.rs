//! Built-in command handlers (spec.md §4.E): `help`, `exit`, `echo`,
//! `type`, `pwd`, `cd`. Each handler receives the full argument token
//! vector (including its own name at index 0) and the current
//! [`RedirectionTable`] so its output honours any `>`/`>>` in effect.

use crate::numeric::parse_c_integer;
use crate::redirect::RedirectionTable;
use crate::tokenizer::Token;
use std::io::Write;
use std::path::Path;

pub struct BuiltinDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub handler: fn(&[Token], &mut RedirectionTable) -> Outcome,
}

pub enum Outcome {
    Continue(i32),
    /// The shell must clean up (close redirections, restore the terminal)
    /// and exit the process with this code. Builtins never call
    /// `std::process::exit` themselves — see `main.rs`'s dispatch loop and
    /// spec.md's design note that `exit` must invoke cleanup, not bypass it.
    Exit(i32),
}

pub const BUILTINS: &[BuiltinDescriptor] = &[
    BuiltinDescriptor {
        name: "help",
        description: "Displays help about builtin commands.",
        handler: help_cmd,
    },
    BuiltinDescriptor {
        name: "exit",
        description: "Exit the shell, with an optional exit code.",
        handler: exit_cmd,
    },
    BuiltinDescriptor {
        name: "echo",
        description: "Prints its arguments to stdout.",
        handler: echo_cmd,
    },
    BuiltinDescriptor {
        name: "type",
        description: "Prints whether a name is a builtin, an executable, or not found.",
        handler: type_cmd,
    },
    BuiltinDescriptor {
        name: "pwd",
        description: "Prints the current working directory.",
        handler: pwd_cmd,
    },
    BuiltinDescriptor {
        name: "cd",
        description: "Changes the current working directory.",
        handler: cd_cmd,
    },
];

pub fn lookup(name: &str) -> Option<&'static BuiltinDescriptor> {
    BUILTINS.iter().find(|b| b.name == name)
}

pub fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

/// Tab-completion support: the unique builtin name starting with `prefix`,
/// or `None` if there's no match or more than one (spec.md §4.B ambiguous
/// case — this implementation rings the bell instead of aborting, see
/// DESIGN.md's REDESIGN FLAGS).
pub fn complete(prefix: &[u8]) -> Option<String> {
    let prefix = std::str::from_utf8(prefix).ok()?;
    let mut matches = BUILTINS.iter().filter(|b| b.name.starts_with(prefix));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.name.to_string())
}

fn argv_strings(args: &[Token]) -> Vec<String> {
    args.iter().map(|t| t.as_str_lossy().into_owned()).collect()
}

fn help_cmd(args: &[Token], table: &mut RedirectionTable) -> Outcome {
    let args = argv_strings(args);
    if args.len() <= 1 {
        let mut out = table.writer(1);
        let _ = writeln!(out, "Available commands:");
        for b in BUILTINS {
            let _ = writeln!(out, "    {:<10} - {}", b.name, b.description);
        }
        return Outcome::Continue(0);
    }

    match lookup(&args[1]) {
        Some(b) => {
            let _ = writeln!(table.writer(1), "    {:<10} - {}", b.name, b.description);
            Outcome::Continue(0)
        }
        None => {
            let _ = writeln!(table.writer(2), "help: Builtin {} not found", args[1]);
            Outcome::Continue(1)
        }
    }
}

fn exit_cmd(args: &[Token], table: &mut RedirectionTable) -> Outcome {
    let args = argv_strings(args);
    if args.len() == 1 {
        return Outcome::Exit(0);
    }
    if args.len() > 2 {
        let _ = writeln!(table.writer(2), "exit: too many arguments");
        return Outcome::Continue(1);
    }

    match parse_c_integer(&args[1]) {
        Some(n) if (0..=255).contains(&n) => Outcome::Exit(n as i32),
        Some(_) => {
            let _ = writeln!(table.writer(2), "exit: exit code must be 0-255");
            Outcome::Continue(1)
        }
        None => {
            let _ = writeln!(table.writer(2), "exit: numeric argument required");
            Outcome::Continue(1)
        }
    }
}

fn echo_cmd(args: &[Token], table: &mut RedirectionTable) -> Outcome {
    // No flag handling (no `-n`, no backslash escapes): the original's
    // echo_command treats every argument literally.
    let rest = &args[1..];
    let mut out = table.writer(1);
    for (i, arg) in rest.iter().enumerate() {
        if i > 0 {
            let _ = out.write_all(b" ");
        }
        let _ = out.write_all(&arg.bytes);
    }
    let _ = out.write_all(b"\n");
    Outcome::Continue(0)
}

fn type_cmd(args: &[Token], table: &mut RedirectionTable) -> Outcome {
    let args = argv_strings(args);
    let mut status = 0;
    for name in &args[1..] {
        if is_builtin(name) {
            let _ = writeln!(table.writer(1), "{name} is a shell builtin");
            continue;
        }
        match crate::dispatch::find_on_path(name) {
            Some(path) => {
                let _ = writeln!(table.writer(1), "{name} is {}", path.display());
            }
            None => {
                let _ = writeln!(table.writer(1), "{name}: not found");
                status = 1;
            }
        }
    }
    Outcome::Continue(status)
}

fn pwd_cmd(args: &[Token], table: &mut RedirectionTable) -> Outcome {
    if args.len() > 1 {
        let _ = writeln!(table.writer(2), "pwd: too many arguments");
        return Outcome::Continue(1);
    }
    match std::env::current_dir() {
        Ok(dir) => {
            let _ = writeln!(table.writer(1), "{}", dir.display());
            Outcome::Continue(0)
        }
        Err(e) => {
            let _ = writeln!(table.writer(2), "pwd: {e}");
            Outcome::Continue(1)
        }
    }
}

fn cd_cmd(args: &[Token], table: &mut RedirectionTable) -> Outcome {
    let args = argv_strings(args);
    if args.len() > 2 {
        let _ = writeln!(table.writer(2), "cd: too many arguments");
        return Outcome::Continue(1);
    }

    let target = match args.get(1) {
        Some(path) => path.clone(),
        None => match std::env::var("HOME") {
            Ok(home) => home,
            Err(_) => {
                let _ = writeln!(table.writer(2), "cd: HOME not set");
                return Outcome::Continue(1);
            }
        },
    };

    if target.is_empty() {
        // A no-op, matching the original's `cd()` helper.
        return Outcome::Continue(0);
    }

    match std::env::set_current_dir(Path::new(&target)) {
        Ok(()) => Outcome::Continue(0),
        Err(e) => {
            let reason = match e.kind() {
                std::io::ErrorKind::NotFound => "No such file or directory".to_string(),
                std::io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
                _ => e.to_string(),
            };
            let _ = writeln!(table.writer(2), "cd: {target}: {reason}");
            Outcome::Continue(1)
        }
    }
}
