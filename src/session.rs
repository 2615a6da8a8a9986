use crate::alias::AliasStore;
use crate::chain::ChainScanner;
use crate::command::{CommandFactory, ExitCode, Stdin};
use crate::env::Environment;
use crate::expand;
use crate::history::HistoryStore;
use crate::io_adapters::MemWriter;
use crate::lexer;
use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{BufRead, Read, Write};
use std::process::Stdio;

const PROMPT: &str = "$ ";

/// Factory allows creating instances of ExecutableCommand for one concrete
/// command type; the shell holds one per builtin plus the external launcher.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The mutable session context threaded through every command execution.
///
/// This is the explicit replacement for what a C shell would keep in a
/// global struct: program name, input position, last status, the pending
/// exit request, and the owned environment, alias and history stores.
///
/// Note: fields are public for simplicity, in keeping with the small size of
/// this crate.
pub struct ShellState {
    /// Program name used as the diagnostic prefix.
    pub progname: String,
    /// Number of the input line currently being executed, for diagnostics.
    pub line_no: usize,
    /// Whether input comes from a terminal (prompting, line counting).
    pub interactive: bool,
    /// Exit status of the most recently executed command; feeds `$?` and
    /// the chain gates.
    pub last_status: ExitCode,
    /// Set by the `exit` builtin; the read-eval loop stops when present.
    pub exit_request: Option<ExitCode>,
    pub env: Environment,
    pub aliases: AliasStore,
    pub history: HistoryStore,
}

impl ShellState {
    pub fn new(progname: impl Into<String>, interactive: bool) -> Self {
        let env = Environment::new();
        let history = HistoryStore::for_env(&env);
        Self {
            progname: progname.into(),
            line_no: 0,
            interactive,
            last_status: 0,
            exit_request: None,
            env,
            aliases: AliasStore::new(),
            history,
        }
    }

    /// Print a diagnostic in the shell's conventional format:
    /// `progname: line: message`.
    pub fn report(&self, message: &str) {
        eprintln!("{}: {}: {}", self.progname, self.line_no, message);
    }
}

/// The interpreter session: owns the state and the ordered command
/// factories, and drives the read-eval loop.
///
/// Example
/// ```no_run
/// use minish::Shell;
/// let mut sh = Shell::new("minish", false);
/// let status = sh.run_line("setenv GREETING hello");
/// assert_eq!(status, 0);
/// ```
pub struct Shell {
    pub state: ShellState,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Shell {
    pub fn new(progname: &str, interactive: bool) -> Self {
        Self::from_state(ShellState::new(progname, interactive))
    }

    /// Wire the default factory chain around an existing state: builtins
    /// first, the external launcher last, so unrecognized names fall
    /// through to PATH resolution.
    pub fn from_state(state: ShellState) -> Self {
        use crate::builtin::{Alias, Cd, Env, Exit, Help, History, Setenv, Unsetenv};
        use crate::external::ExternalCommand;
        Self {
            state,
            commands: vec![
                Box::new(Factory::<Exit>::default()),
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<Help>::default()),
                Box::new(Factory::<History>::default()),
                Box::new(Factory::<Alias>::default()),
                Box::new(Factory::<Env>::default()),
                Box::new(Factory::<Setenv>::default()),
                Box::new(Factory::<Unsetenv>::default()),
                Box::new(Factory::<ExternalCommand>::default()),
            ],
        }
    }

    /// Interactive read-eval loop over a rustyline editor.
    ///
    /// The editor is seeded with the persisted history. Ctrl-C discards the
    /// partially typed line and prompts again on a fresh line; Ctrl-D ends
    /// the session with the last status.
    pub fn repl(&mut self) -> Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;
        for entry in self.state.history.iter() {
            let _ = rl.add_history_entry(entry.text.as_str());
        }
        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                        self.state.history.push(&line);
                    }
                    self.run_line(&line);
                    if let Some(code) = self.state.exit_request {
                        return Ok(code);
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => return Ok(self.state.last_status),
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Execute lines from a script file or pipe until end-of-input or an
    /// `exit` request.
    pub fn run_reader<R: BufRead>(&mut self, reader: R) -> Result<ExitCode> {
        for line in reader.lines() {
            let line = line?;
            self.state.history.push(&line);
            self.run_line(&line);
            if let Some(code) = self.state.exit_request {
                return Ok(code);
            }
        }
        Ok(self.state.last_status)
    }

    /// Execute one input line; builtin output goes to the real stdout.
    pub fn run_line(&mut self, line: &str) -> ExitCode {
        self.run_line_to(line, None)
    }

    /// Execute one input line, capturing builtin output into `out`.
    ///
    /// External commands run detached from the capture buffer (their output
    /// is discarded); this entry point exists for embedding and tests.
    pub fn run_line_with_output(&mut self, line: &str, out: &mut dyn Write) -> ExitCode {
        self.run_line_to(line, Some(out))
    }

    fn run_line_to(&mut self, line: &str, mut sink: Option<&mut (dyn Write + '_)>) -> ExitCode {
        let stripped = lexer::strip_comment(line);
        if stripped.trim().is_empty() {
            if self.state.interactive {
                self.state.line_no += 1;
            }
            return self.state.last_status;
        }
        self.state.line_no += 1;

        // Units are substituted and executed one at a time: a `setenv` in
        // one unit is visible to the expansion of the next.
        for unit in ChainScanner::new(stripped) {
            if self.state.exit_request.is_some() {
                break;
            }
            if !unit.op.allows(self.state.last_status) {
                continue;
            }
            if let Some(status) = self.run_unit(unit.text, sink.as_deref_mut()) {
                self.state.last_status = status;
            }
        }
        self.state.last_status
    }

    /// Substitute, tokenize and dispatch one chain unit. Returns `None` when
    /// the unit turned out empty, leaving the last status untouched.
    fn run_unit(&mut self, text: &str, sink: Option<&mut (dyn Write + '_)>) -> Option<ExitCode> {
        let tokens = lexer::split_tokens(text, lexer::WHITESPACE);
        let mut tokens = expand::expand_alias_once(tokens, &self.state.aliases);
        expand::expand_variables(&mut tokens, self.state.last_status, &self.state.env);
        // a variable expanding to nothing drops its token entirely
        tokens.retain(|t| !t.is_empty());

        let name = tokens.first()?.clone();
        let args: Vec<&str> = tokens[1..].iter().map(String::as_str).collect();
        Some(self.dispatch(&name, &args, sink))
    }

    fn dispatch(&mut self, name: &str, args: &[&str], sink: Option<&mut (dyn Write + '_)>) -> ExitCode {
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.state, name, args) {
                let stdin = Box::new(InheritedStdin(std::io::stdin().lock()));
                let result = match sink {
                    None => cmd.execute(stdin, Box::new(std::io::stdout()), &mut self.state),
                    Some(out) => {
                        let (writer, handle) = MemWriter::with_handle();
                        let result = cmd.execute(stdin, Box::new(writer), &mut self.state);
                        let _ = out.write_all(&handle.borrow());
                        result
                    }
                };
                return match result {
                    Ok(code) => code,
                    Err(e) => {
                        self.state.report(&format!("{}: {}", name, e));
                        1
                    }
                };
            }
        }
        self.state.report(&format!("{}: not found", name));
        127
    }

    /// Flush the in-memory history to its backing file.
    pub fn save_history(&self) -> Result<()> {
        self.state.history.save()
    }
}

struct InheritedStdin<'a>(std::io::StdinLock<'a>);

impl Read for InheritedStdin<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin<'_> {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}
