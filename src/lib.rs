//! trac64 - an interpreter for the TRAC T-64 string-rewriting language.
//!
//! TRAC is a self-modifying macro processor: a program is a mutable
//! character buffer that the engine rewrites, one character at a time,
//! until nothing is left. There is no grammar produced in advance -
//! parsing, evaluation, and source editing are the same streaming
//! operation over the *active* buffer, with evaluated text accumulating
//! in the *neutral* buffer.
//!
//! ## Syntax
//!
//! Four characters are syntactic: `#`, `(`, `)`, and `,`. A call written
//! `#(name,arg,…)` is *active* - its result re-enters the scanner and is
//! executed - while `##(name,arg,…)` is *neutral* - its result is
//! appended as plain data. Parentheses on their own quote their contents
//! protectively. The current meta-character (initially `'`) terminates a
//! record read from the input source.
//!
//! Named *forms* are the data store: `ds` defines one, `ss` cuts numbered
//! segment markers into it, `cl` fills them back in, and the navigation
//! primitives walk a per-form character pointer. A form shadows any
//! primitive of the same name, so `#(eq)` means the user's `eq` once one
//! is defined.
//!
//! ## Embedding
//!
//! Construct an [`Interpreter`] from a character source and sink, then
//! either [`Interpreter::execute`] a program string directly or
//! [`Interpreter::run`] an idle program such as [`READ_EVAL_PRINT`]
//! against the source:
//!
//! ```
//! use trac64::{BufferSink, Interpreter, RunMode, StringSource, READ_EVAL_PRINT};
//!
//! let sink = BufferSink::new();
//! let mut interp = Interpreter::new(
//!     Box::new(StringSource::new("#(ps,(hello world))'")),
//!     Box::new(sink.clone()),
//! );
//! interp.run(READ_EVAL_PRINT, RunMode::Batch);
//! assert_eq!(sink.contents(), "hello world");
//! ```
//!
//! ## Modules
//!
//! - `engine`: scanner state and the rewrite main loop
//! - `form`: the persistent store of marker-bearing forms
//! - `primitives`: the built-in function registry
//! - `number`: big-integer, radix, and Boolean-suffix adapters
//! - `io`: character source and sink seams

pub mod engine;
pub mod form;
pub mod io;
pub mod number;
pub mod primitives;

pub use engine::{Interpreter, RunMode, Signal};
pub use io::{BufferSink, CharSink, CharSource, StdoutSink, StringSource};
pub use primitives::PrimitiveFn;

/// The default idle program: print the result of reading one record.
pub const READ_EVAL_PRINT: &str = "#(ps,#(rs))";
