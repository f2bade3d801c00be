//! A small interactive shell.
//!
//! Lines are read by a raw-mode [`editor::LineEditor`] with tab completion of command
//! names, split into words by [`lexer::tokenize`], stripped of an output redirection by
//! [`parser::resolve`] and then run by the [`Interpreter`], either as a builtin
//! implemented in Rust or as an external program found on `PATH`.
//!
//! The public modules [`command`] and [`env`] expose the traits and types needed to plug
//! in your own commands.

mod builtin;
pub mod command;
pub mod completion;
pub mod editor;
pub mod env;
mod external;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod terminal;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
