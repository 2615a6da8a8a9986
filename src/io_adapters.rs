//! Memory-backed IO adapters.
//!
//! Builtins write through the [`crate::command::Stdout`] trait; during
//! normal operation that is the real standard output, but captured
//! execution (and the unit tests) substitute a [`MemWriter`] whose buffer
//! remains readable through a shared handle after the boxed writer has been
//! consumed. [`MemReader`] is the matching input-side adapter.

use std::cell::RefCell;
use std::io::{Cursor, Read, Result as IoResult, Write};
use std::process::Stdio;
use std::rc::Rc;

/// In-memory reader handed to commands that must not touch the real stdin.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }

    /// A reader with no content, for commands that take no input.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl crate::command::Stdin for MemReader {
    /// External processes spawned under a memory reader get no input.
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}

/// In-memory writer capturing what a builtin printed.
///
/// Created together with a shared handle ([`MemWriter::with_handle`]) so the
/// caller can read the collected bytes after the boxed writer was consumed
/// by `execute`.
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    /// Create a writer and the handle its output can be read through.
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let buf = Rc::new(RefCell::new(Vec::new()));
        let handle = buf.clone();
        (Self { buf }, handle)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl crate::command::Stdout for MemWriter {
    /// External output cannot be routed into the in-process buffer, so a
    /// child spawned under a memory writer writes nowhere.
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}
