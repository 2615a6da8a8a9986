//! The input history: an append-only log of prior lines, persisted under the
//! home directory.
//!
//! The on-disk format is one line per record. On load only the most recent
//! [`HISTORY_MAX`] lines are kept and entries are renumbered from 0; during
//! a session new lines are appended in memory and the whole store is
//! rewritten to disk when the session ends.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::env::Environment;

/// Upper bound on retained history entries.
pub const HISTORY_MAX: usize = 4096;

/// File name of the persisted history, relative to `$HOME`.
pub const HISTORY_FILE: &str = ".minish_history";

/// One recorded input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub index: usize,
    pub text: String,
}

/// In-memory history store with optional file backing.
#[derive(Debug)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
    path: Option<PathBuf>,
}

impl HistoryStore {
    /// A store with no file backing; [`save`](Self::save) becomes a no-op.
    pub fn in_memory() -> Self {
        Self {
            entries: Vec::new(),
            path: None,
        }
    }

    /// Open (or create on save) the history file at `path`, loading any
    /// existing entries. An unreadable file simply yields an empty store.
    pub fn open(path: PathBuf) -> Self {
        let mut store = Self {
            entries: Vec::new(),
            path: Some(path),
        };
        store.load();
        store
    }

    /// Resolve the history location from `$HOME`; with no home directory the
    /// history is kept in memory only.
    pub fn for_env(env: &Environment) -> Self {
        match env.get_var("HOME") {
            Some(home) => Self::open(Path::new(&home).join(HISTORY_FILE)),
            None => Self::in_memory(),
        }
    }

    fn load(&mut self) {
        let Some(path) = &self.path else { return };
        let Ok(file) = fs::File::open(path) else {
            return;
        };
        let mut lines: Vec<String> = BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter(|line| !line.is_empty())
            .collect();
        if lines.len() > HISTORY_MAX {
            lines.drain(..lines.len() - HISTORY_MAX);
        }
        self.entries = lines
            .into_iter()
            .enumerate()
            .map(|(index, text)| HistoryEntry { index, text })
            .collect();
    }

    /// Record an input line. Blank lines are not recorded. When the store
    /// exceeds [`HISTORY_MAX`] the oldest entry is dropped and the remaining
    /// entries renumbered.
    pub fn push(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let index = self.entries.last().map_or(0, |e| e.index + 1);
        self.entries.push(HistoryEntry {
            index,
            text: line.to_string(),
        });
        if self.entries.len() > HISTORY_MAX {
            self.entries.remove(0);
            self.renumber();
        }
    }

    fn renumber(&mut self) {
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.index = i;
        }
    }

    /// Rewrite the backing file with the current in-memory entries.
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = fs::File::create(path)
            .with_context(|| format!("can't write history file {}", path.display()))?;
        for entry in &self.entries {
            writeln!(file, "{}", entry.text)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "minish_history_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn push_numbers_sequentially_and_skips_blanks() {
        let mut store = HistoryStore::in_memory();
        store.push("first");
        store.push("   ");
        store.push("second");

        let entries: Vec<(usize, &str)> =
            store.iter().map(|e| (e.index, e.text.as_str())).collect();
        assert_eq!(entries, vec![(0, "first"), (1, "second")]);
    }

    #[test]
    fn save_and_reload_round_trip() {
        let path = unique_temp_path("roundtrip");

        let mut store = HistoryStore::open(path.clone());
        assert!(store.is_empty());
        store.push("echo one");
        store.push("echo two");
        store.save().expect("save history");

        let reloaded = HistoryStore::open(path.clone());
        let texts: Vec<&str> = reloaded.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["echo one", "echo two"]);
        assert_eq!(reloaded.iter().map(|e| e.index).collect::<Vec<_>>(), vec![0, 1]);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn load_keeps_only_most_recent_entries() {
        let path = unique_temp_path("truncate");
        {
            let mut file = fs::File::create(&path).unwrap();
            for i in 0..HISTORY_MAX + 10 {
                writeln!(file, "cmd {}", i).unwrap();
            }
        }

        let store = HistoryStore::open(path.clone());
        assert_eq!(store.len(), HISTORY_MAX);
        // oldest lines were dropped, survivors renumbered from 0
        assert_eq!(store.iter().next().unwrap().text, "cmd 10");
        assert_eq!(store.iter().next().unwrap().index, 0);
        assert_eq!(store.iter().last().unwrap().index, HISTORY_MAX - 1);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = HistoryStore::open(unique_temp_path("missing"));
        assert!(store.is_empty());
    }

    #[test]
    fn in_memory_save_is_a_no_op() {
        let mut store = HistoryStore::in_memory();
        store.push("anything");
        store.save().expect("in-memory save");
    }
}
