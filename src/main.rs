use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, ErrorKind, IsTerminal};
use std::path::{Path, PathBuf};

use argh::FromArgs;
use minish::Shell;

#[derive(FromArgs)]
/// A minimal POSIX-style command interpreter.
struct Invocation {
    #[argh(positional)]
    /// script to execute instead of reading commands interactively
    script: Option<PathBuf>,
}

fn main() {
    let argv: Vec<String> = std::env::args().collect();
    let progname = argv
        .first()
        .and_then(|a| Path::new(a).file_name())
        .and_then(OsStr::to_str)
        .unwrap_or("minish")
        .to_string();

    let args: Vec<&str> = argv.iter().skip(1).map(String::as_str).collect();
    let invocation = match Invocation::from_args(&[progname.as_str()], &args) {
        Ok(invocation) => invocation,
        Err(early) => {
            if early.status.is_ok() {
                print!("{}", early.output);
                std::process::exit(0);
            }
            eprint!("{}", early.output);
            std::process::exit(2);
        }
    };

    let interactive = invocation.script.is_none() && std::io::stdin().is_terminal();
    let mut shell = Shell::new(&progname, interactive);

    let result = match &invocation.script {
        Some(path) => match File::open(path) {
            Ok(file) => shell.run_reader(BufReader::new(file)),
            Err(e) => {
                eprintln!("{}: 0: Can't open {}", progname, path.display());
                let code = if e.kind() == ErrorKind::PermissionDenied {
                    126
                } else {
                    127
                };
                std::process::exit(code);
            }
        },
        None if interactive => shell.repl(),
        None => shell.run_reader(std::io::stdin().lock()),
    };

    if let Err(e) = shell.save_history() {
        eprintln!("{}: {}", progname, e);
    }

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {}", progname, e);
            std::process::exit(2);
        }
    }
}
