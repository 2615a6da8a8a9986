use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::session::{Factory, ShellState};
use anyhow::Result;
use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::io::ErrorKind;
use std::path::Path;
use std::process::ExitStatus;

/// A command resolved to an on-disk executable rather than a builtin.
pub struct ExternalCommand {
    /// The name as the user typed it, for diagnostics.
    name: String,
    /// The resolved executable path.
    path: OsString,
    args: Vec<OsString>,
}

impl ExternalCommand {
    pub fn new(name: &str, path: OsString, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            path,
            args: args.iter().map(|a| a.into()).collect(),
        }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        state: &ShellState,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let search_paths = state.env.get_var("PATH");
        let resolved = find_command_path(search_paths.as_deref().map(|p| OsStr::new(p)), name)?;
        Some(Box::new(ExternalCommand::new(
            name,
            resolved.as_os_str().to_owned(),
            args,
        )))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        let mut cmd = std::process::Command::new(&self.path);
        cmd.args(&self.args)
            .env_clear()
            .envs(state.env.iter())
            .current_dir(&state.env.current_dir)
            .stdin(stdin.stdio())
            .stdout(stdout.stdio());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                state.report(&format!("{}: {}", self.name, e));
                return Ok(spawn_failure_status(&e));
            }
        };
        let exit_status = child.wait()?;
        match exit_status.code() {
            Some(x) => Ok(x),
            None => Ok(terminated_by_signal(exit_status)),
        }
    }
}

/// Status for a command that could not be launched at all: 126 when the
/// file was found but may not be executed, 127 when it vanished between
/// resolution and spawn, 1 otherwise.
fn spawn_failure_status(e: &std::io::Error) -> ExitCode {
    match e.kind() {
        ErrorKind::PermissionDenied => 126,
        ErrorKind::NotFound => 127,
        _ => 1,
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match ExitStatusExt::signal(&exit_status) {
        Some(signal) => 128 + signal,
        None => -1,
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command name to an executable path.
///
/// A name containing `/` is taken as a literal path (absolute, or relative
/// to the working directory) and is returned when it points at an
/// executable. Any other name is searched for in each `search_paths`
/// directory in listed order; the first executable match wins, with no
/// tie-breaking. Returns `None` when nothing matches or when a bare name is
/// looked up without a `PATH`.
pub fn find_command_path<'a>(
    search_paths: Option<&OsStr>,
    name: &'a str,
) -> Option<Cow<'a, Path>> {
    if name.is_empty() {
        return None;
    }
    let path = Path::new(name);
    if name.contains('/') {
        return is_executable(path).then_some(Cow::Borrowed(path));
    }
    for dir in std::env::split_paths(search_paths?) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(Cow::Owned(candidate));
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
