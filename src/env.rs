use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, session-level view of the process environment.
///
/// The environment is captured once at startup and mutated only through the
/// `setenv`/`unsetenv`/`cd` builtins; external commands receive a flattened
/// snapshot of `vars` at spawn time, so an `unsetenv` really removes the
/// variable from children (the inherited process environment is not
/// consulted again after startup).
///
/// Note: fields are public for simplicity, in keeping with the small size of
/// this crate.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    /// Entries are unique by name; the last `setenv` wins.
    pub vars: HashMap<String, String>,
    /// The working directory commands run in, tracked by the `cd` builtin.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state into a new `Environment`.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// An empty environment with the process working directory; used by
    /// tests and callers that want full control over the variable set.
    pub fn empty() -> Self {
        Self {
            vars: HashMap::new(),
            current_dir: stdenv::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Get the value of an environment variable.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    /// Set or override an environment variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Remove a variable. Removing an absent name is not an error.
    pub fn unset_var(&mut self, key: &str) {
        self.vars.remove(key);
    }

    /// Iterate over `(name, value)` pairs, e.g. to materialize the
    /// environment for a child process.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
