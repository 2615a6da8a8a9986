use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::session::{Factory, ShellState};
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child process. They receive the
/// whole session state so they can mutate the environment and alias tables,
/// read the history, or request session exit.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "setenv".
    fn name() -> &'static str;

    /// Executes the command.
    ///
    /// Return value follows shell conventions: 0 for success, non-zero for
    /// error.
    fn execute(self, stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        match T::execute(*self, &mut stdout, state) {
            Ok(x) => Ok(x),
            Err(e) => {
                state.report(&e.to_string());
                Ok(1)
            }
        }
    }
}

/// Produced when argh rejects a builtin's arguments (or prints its help).
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        if self.is_error {
            state.report(self.output.trim_end());
            Ok(2)
        } else {
            stdout.write_all(self.output.as_bytes())?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _state: &ShellState,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Leave the shell, optionally with an explicit status.
pub struct Exit {
    #[argh(positional)]
    /// status to exit with (taken modulo 256); defaults to the status of the last command.
    pub status: Option<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode> {
        let code = match &self.status {
            Some(arg) => match parse_exit_status(arg) {
                Some(code) => code,
                None => {
                    // Bad argument: the exit request is refused, the session goes on.
                    state.report(&format!("exit: Illegal number: {}", arg));
                    return Ok(2);
                }
            },
            None => state.last_status,
        };
        state.exit_request = Some(code);
        Ok(code)
    }
}

/// `exit` accepts only an unsigned decimal; anything else (including a sign
/// or an overflowing value) is an illegal number.
fn parse_exit_status(arg: &str) -> Option<ExitCode> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    arg.parse::<u64>().ok().map(|n| (n % 256) as ExitCode)
}

/// Change the current working directory.
///
/// With no argument (or a bare `~`) the target is `$HOME`; `-` switches to
/// `$OLDPWD` and prints the directory it landed in. On success `OLDPWD` and
/// `PWD` are updated along with the tracked working directory.
///
/// `cd` bypasses the argh-backed factory because argh would reject the bare
/// `-` target as an unknown flag; it parses its single optional argument by
/// hand instead, ignoring any extras the way the original builtin did.
pub struct Cd {
    pub target: Option<String>,
}

impl CommandFactory for Factory<Cd> {
    fn try_create(
        &self,
        _state: &ShellState,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name != "cd" {
            return None;
        }
        Some(Box::new(Cd {
            target: args.first().map(|s| s.to_string()),
        }))
    }
}

impl ExecutableCommand for Cd {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        let (target, announce) = match self.target.as_deref() {
            None | Some("~") => match state.env.get_var("HOME") {
                Some(home) => (PathBuf::from(home), false),
                None => {
                    state.report("cd: HOME not set");
                    return Ok(1);
                }
            },
            Some("-") => match state.env.get_var("OLDPWD") {
                Some(prev) => (PathBuf::from(prev), true),
                None => {
                    state.report("cd: OLDPWD not set");
                    return Ok(1);
                }
            },
            Some(dir) => (PathBuf::from(dir), false),
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            state.env.current_dir.join(target)
        };

        let canonical = match fs::canonicalize(&new_dir)
            .and_then(|dir| env::set_current_dir(&dir).map(|_| dir))
        {
            Ok(dir) => dir,
            Err(_) => {
                state.report(&format!("cd: can't cd to {}", new_dir.display()));
                return Ok(1);
            }
        };

        let old = state.env.current_dir.clone();
        state.env.set_var("OLDPWD", old.to_string_lossy());
        state.env.set_var("PWD", canonical.to_string_lossy());
        state.env.current_dir = canonical;

        if announce {
            writeln!(stdout, "{}", state.env.current_dir.display())?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print a summary of the builtin commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode> {
        writeln!(stdout, "{} builtins:", state.progname)?;
        writeln!(stdout, "  exit [STATUS]            leave the shell")?;
        writeln!(stdout, "  cd [DIR|-]               change the working directory")?;
        writeln!(stdout, "  help                     print this summary")?;
        writeln!(stdout, "  history                  print the input history")?;
        writeln!(stdout, "  alias [NAME[=VALUE]...]  list, show or define aliases")?;
        writeln!(stdout, "  env                      print the environment")?;
        writeln!(stdout, "  setenv NAME VALUE        set an environment variable")?;
        writeln!(stdout, "  unsetenv NAME            remove an environment variable")?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the input history, oldest first.
pub struct History {}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(self, stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode> {
        for entry in state.history.iter() {
            writeln!(stdout, "{:>5}  {}", entry.index, entry.text)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List, show or define aliases.
pub struct Alias {
    #[argh(positional, greedy)]
    /// NAME=VALUE defines an alias, NAME prints one, no arguments list all.
    pub specs: Vec<String>,
}

impl BuiltinCommand for Alias {
    fn name() -> &'static str {
        "alias"
    }

    fn execute(self, stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode> {
        if self.specs.is_empty() {
            for entry in state.aliases.iter() {
                writeln!(stdout, "{}='{}'", entry.name, entry.value)?;
            }
            return Ok(0);
        }

        let mut code = 0;
        for spec in &self.specs {
            match spec.split_once('=') {
                Some((name, _)) if name.is_empty() => {
                    state.report(&format!("alias: {}: invalid alias name", spec));
                    code = 1;
                }
                Some((name, value)) => state.aliases.set(name, value),
                None => match state.aliases.get(spec) {
                    Some(value) => writeln!(stdout, "{}='{}'", spec, value)?,
                    None => {
                        state.report(&format!("alias: {} not found", spec));
                        code = 1;
                    }
                },
            }
        }
        Ok(code)
    }
}

#[derive(FromArgs)]
/// Print the current environment, one NAME=VALUE per line.
pub struct Env {}

impl BuiltinCommand for Env {
    fn name() -> &'static str {
        "env"
    }

    fn execute(self, stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode> {
        for (name, value) in state.env.iter() {
            writeln!(stdout, "{}={}", name, value)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Set or overwrite an environment variable.
pub struct Setenv {
    #[argh(positional)]
    /// variable name
    pub name: String,

    #[argh(positional)]
    /// value to assign
    pub value: String,
}

impl BuiltinCommand for Setenv {
    fn name() -> &'static str {
        "setenv"
    }

    fn execute(self, _stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode> {
        if self.name.is_empty() || self.name.contains('=') {
            return Err(anyhow::anyhow!("setenv: invalid name: {}", self.name));
        }
        state.env.set_var(self.name, self.value);
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Remove a variable from the environment.
pub struct Unsetenv {
    #[argh(positional)]
    /// variable name
    pub name: String,
}

impl BuiltinCommand for Unsetenv {
    fn name() -> &'static str {
        "unsetenv"
    }

    fn execute(self, _stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode> {
        state.env.unset_var(&self.name);
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasStore;
    use crate::env::Environment;
    use crate::history::HistoryStore;
    use crate::io_adapters::{MemReader, MemWriter};
    use std::env as stdenv;
    use std::io;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap()
    }

    fn test_state() -> ShellState {
        ShellState {
            progname: "minish".to_string(),
            line_no: 0,
            interactive: false,
            last_status: 0,
            exit_request: None,
            env: Environment::empty(),
            aliases: AliasStore::new(),
            history: HistoryStore::in_memory(),
        }
    }

    fn make_unique_temp_dir(tag: &str) -> io::Result<PathBuf> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let p = stdenv::temp_dir().join(format!(
            "minish_builtin_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&p)?;
        Ok(p)
    }

    /// Run the boxed `cd` command the way the dispatcher would.
    fn run_cd(target: Option<&str>, state: &mut ShellState) -> (ExitCode, String) {
        let (writer, handle) = MemWriter::with_handle();
        let cmd = Box::new(Cd {
            target: target.map(str::to_string),
        });
        let code = cmd
            .execute(Box::new(MemReader::empty()), Box::new(writer), state)
            .expect("cd execution");
        let out = String::from_utf8(handle.borrow().clone()).unwrap();
        (code, out)
    }

    #[test]
    fn exit_with_valid_status() {
        let mut state = test_state();
        let cmd = Exit {
            status: Some("42".to_string()),
        };
        let code = cmd.execute(&mut Vec::new(), &mut state).unwrap();
        assert_eq!(code, 42);
        assert_eq!(state.exit_request, Some(42));
    }

    #[test]
    fn exit_status_wraps_modulo_256() {
        let mut state = test_state();
        let cmd = Exit {
            status: Some("300".to_string()),
        };
        assert_eq!(cmd.execute(&mut Vec::new(), &mut state).unwrap(), 44);
        assert_eq!(state.exit_request, Some(44));
    }

    #[test]
    fn exit_without_argument_uses_last_status() {
        let mut state = test_state();
        state.last_status = 7;
        let cmd = Exit { status: None };
        assert_eq!(cmd.execute(&mut Vec::new(), &mut state).unwrap(), 7);
        assert_eq!(state.exit_request, Some(7));
    }

    #[test]
    fn exit_rejects_non_numeric_argument() {
        for bad in ["12x", "-1", "", "0x10"] {
            let mut state = test_state();
            let cmd = Exit {
                status: Some(bad.to_string()),
            };
            assert_eq!(cmd.execute(&mut Vec::new(), &mut state).unwrap(), 2);
            assert_eq!(state.exit_request, None, "{:?} must not exit", bad);
        }
    }

    #[test]
    fn cd_to_absolute_path_updates_pwd_and_oldpwd() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let temp = make_unique_temp_dir("abs").unwrap();
        let canonical = fs::canonicalize(&temp).unwrap();

        let mut state = test_state();
        let before = state.env.current_dir.clone();

        let (code, out) = run_cd(Some(canonical.to_str().unwrap()), &mut state);
        assert_eq!(code, 0);
        assert!(out.is_empty());
        assert_eq!(state.env.current_dir, canonical);
        assert_eq!(
            state.env.get_var("PWD"),
            Some(canonical.to_string_lossy().to_string())
        );
        assert_eq!(
            state.env.get_var("OLDPWD"),
            Some(before.to_string_lossy().to_string())
        );

        stdenv::set_current_dir(orig).unwrap();
        let _ = fs::remove_dir_all(temp);
    }

    #[test]
    fn cd_dash_round_trips_through_oldpwd() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let dir_a = fs::canonicalize(make_unique_temp_dir("dash_a").unwrap()).unwrap();
        let dir_b = fs::canonicalize(make_unique_temp_dir("dash_b").unwrap()).unwrap();

        let mut state = test_state();
        run_cd(Some(dir_a.to_str().unwrap()), &mut state);
        run_cd(Some(dir_b.to_str().unwrap()), &mut state);

        // first `cd -` goes back to A and announces it
        let (code, out) = run_cd(Some("-"), &mut state);
        assert_eq!(code, 0);
        assert_eq!(out.trim_end(), dir_a.to_string_lossy());
        assert_eq!(state.env.current_dir, dir_a);

        // second `cd -` returns to B
        let (code, _) = run_cd(Some("-"), &mut state);
        assert_eq!(code, 0);
        assert_eq!(state.env.current_dir, dir_b);

        stdenv::set_current_dir(orig).unwrap();
        let _ = fs::remove_dir_all(dir_a);
        let _ = fs::remove_dir_all(dir_b);
    }

    #[test]
    fn cd_defaults_to_home() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let temp = fs::canonicalize(make_unique_temp_dir("home").unwrap()).unwrap();

        let mut state = test_state();
        state
            .env
            .set_var("HOME", temp.to_string_lossy().to_string());

        let (code, _) = run_cd(None, &mut state);
        assert_eq!(code, 0);
        assert_eq!(state.env.current_dir, temp);

        stdenv::set_current_dir(orig).unwrap();
        let _ = fs::remove_dir_all(temp);
    }

    #[test]
    fn cd_without_home_fails() {
        let mut state = test_state();
        let (code, _) = run_cd(None, &mut state);
        assert_eq!(code, 1);
    }

    #[test]
    fn cd_to_missing_directory_fails_in_place() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();

        let mut state = test_state();
        let before = state.env.current_dir.clone();
        let (code, _) = run_cd(Some("/no/such/dir/for/minish"), &mut state);
        assert_eq!(code, 1);
        assert_eq!(state.env.current_dir, before);
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn alias_defines_and_lists_in_order() {
        let mut state = test_state();

        let define = Alias {
            specs: vec!["ll=ls -l".to_string(), "g=grep".to_string()],
        };
        assert_eq!(define.execute(&mut Vec::new(), &mut state).unwrap(), 0);

        let mut out = Vec::new();
        let list = Alias { specs: vec![] };
        assert_eq!(list.execute(&mut out, &mut state).unwrap(), 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ll='ls -l'\ng='grep'\n"
        );
    }

    #[test]
    fn alias_prints_one_definition() {
        let mut state = test_state();
        state.aliases.set("ll", "ls -l");

        let mut out = Vec::new();
        let cmd = Alias {
            specs: vec!["ll".to_string()],
        };
        assert_eq!(cmd.execute(&mut out, &mut state).unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap(), "ll='ls -l'\n");
    }

    #[test]
    fn alias_lookup_miss_is_an_error() {
        let mut state = test_state();
        let cmd = Alias {
            specs: vec!["nope".to_string()],
        };
        assert_eq!(cmd.execute(&mut Vec::new(), &mut state).unwrap(), 1);
    }

    #[test]
    fn setenv_and_unsetenv_round_trip() {
        let mut state = test_state();

        let set = Setenv {
            name: "FOO".to_string(),
            value: "bar".to_string(),
        };
        assert_eq!(set.execute(&mut Vec::new(), &mut state).unwrap(), 0);
        assert_eq!(state.env.get_var("FOO"), Some("bar".to_string()));

        let unset = Unsetenv {
            name: "FOO".to_string(),
        };
        assert_eq!(unset.execute(&mut Vec::new(), &mut state).unwrap(), 0);
        assert_eq!(state.env.get_var("FOO"), None);
    }

    #[test]
    fn setenv_rejects_name_containing_equals() {
        let mut state = test_state();
        let cmd = Setenv {
            name: "A=B".to_string(),
            value: "x".to_string(),
        };
        assert!(cmd.execute(&mut Vec::new(), &mut state).is_err());
    }

    #[test]
    fn env_prints_every_variable() {
        let mut state = test_state();
        state.env.set_var("ONE", "1");
        state.env.set_var("TWO", "2");

        let mut out = Vec::new();
        let cmd = Env {};
        assert_eq!(cmd.execute(&mut out, &mut state).unwrap(), 0);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("ONE=1\n"));
        assert!(printed.contains("TWO=2\n"));
    }

    #[test]
    fn history_builtin_prints_numbered_entries() {
        let mut state = test_state();
        state.history.push("echo one");
        state.history.push("echo two");

        let mut out = Vec::new();
        let cmd = History {};
        assert_eq!(cmd.execute(&mut out, &mut state).unwrap(), 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "    0  echo one\n    1  echo two\n"
        );
    }

    #[test]
    fn help_mentions_every_builtin() {
        let mut state = test_state();
        let mut out = Vec::new();
        let cmd = Help {};
        assert_eq!(cmd.execute(&mut out, &mut state).unwrap(), 0);

        let printed = String::from_utf8(out).unwrap();
        for name in [
            "exit", "cd", "help", "history", "alias", "env", "setenv", "unsetenv",
        ] {
            assert!(printed.contains(name), "help must mention {}", name);
        }
    }

    #[test]
    fn factory_matches_its_name_only() {
        let state = test_state();
        let factory = Factory::<Setenv>::default();
        assert!(factory.try_create(&state, "setenv", &["A", "1"]).is_some());
        assert!(factory.try_create(&state, "export", &["A", "1"]).is_none());
    }

    #[test]
    fn malformed_builtin_arguments_yield_usage_error() {
        let mut state = test_state();
        let factory = Factory::<Setenv>::default();
        // missing the value positional
        let cmd = factory.try_create(&state, "setenv", &["ONLY_NAME"]).unwrap();
        let (writer, _handle) = MemWriter::with_handle();
        let code = cmd
            .execute(Box::new(MemReader::empty()), Box::new(writer), &mut state)
            .unwrap();
        assert_eq!(code, 2);
    }

    #[test]
    fn cd_factory_accepts_dash_target() {
        let state = test_state();
        let factory = Factory::<Cd>::default();
        assert!(factory.try_create(&state, "cd", &["-"]).is_some());
        assert!(factory.try_create(&state, "chdir", &[]).is_none());
    }
}
