//! A tiny POSIX-style command interpreter.
//!
//! This crate provides the building blocks of a minimal interactive shell:
//! reading lines (from a terminal, a pipe, or a script file), splitting them
//! on the chain operators `;`, `&&` and `||`, expanding aliases and `$`
//! variables, dispatching built-in commands implemented in Rust, and
//! launching external programs discovered through `PATH`.
//!
//! The main entry point is [`Shell`], which owns the read-eval loop and the
//! session state ([`ShellState`]): environment, aliases and the persistent
//! input history. The public modules expose the individual stages so they can
//! be exercised and tested on their own.
//!
//! Deliberately unsupported: quoting, redirection, pipes, globbing, job
//! control and background execution. In particular, chain operators inside
//! what would be a quoted string are still treated as chain boundaries.

pub mod alias;
mod builtin;
pub mod chain;
pub mod command;
pub mod env;
pub mod expand;
mod external;
pub mod history;
mod io_adapters;
pub mod lexer;
mod session;

pub use io_adapters::{MemReader, MemWriter};
pub use session::{Shell, ShellState};
