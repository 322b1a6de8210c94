//! Command-line front end: batch file/argument loading and the
//! interactive prompt loop.
//!
//! Arguments are ordered character sources: `@text` supplies its
//! remainder as literal program text, anything else names a file. All
//! sources are concatenated with newlines and read by the default idle
//! program. With no arguments the interpreter goes interactive, feeding
//! line-edited terminal input to the engine one character at a time.

use std::collections::VecDeque;
use std::fs;
use std::process;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use trac64::{CharSource, Interpreter, READ_EVAL_PRINT, RunMode, StdoutSink, StringSource};

/// Interpreter for the TRAC T-64 string-rewriting language.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Program sources, in order: `@text` is literal program text,
    /// anything else is a file to load. With none, start an interactive
    /// session.
    sources: Vec<String>,
}

/// Idle program for the interactive session: prompt, then read and
/// evaluate one record.
const PROMPT_PROGRAM: &str = "#(ps,(\r\nTRAC> ))#(ps,#(rs))";

fn main() {
    let cli = Cli::parse();
    if cli.sources.is_empty() {
        run_interactive();
    } else {
        run_batch(&cli.sources);
    }
}

fn run_batch(sources: &[String]) {
    let mut text = String::new();
    for source in sources {
        let piece = match source.strip_prefix('@') {
            Some(literal) => literal.to_owned(),
            None => match fs::read_to_string(source) {
                Ok(contents) => contents,
                Err(err) => {
                    eprintln!("trac64: {source}: {err}");
                    process::exit(1);
                }
            },
        };
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&piece);
    }
    let mut interp = Interpreter::new(Box::new(StringSource::new(&text)), Box::new(StdoutSink));
    interp.run(READ_EVAL_PRINT, RunMode::Batch);
}

fn run_interactive() {
    let editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("trac64: cannot open terminal: {err}");
            process::exit(1);
        }
    };
    let source = LineSource {
        editor,
        pending: VecDeque::new(),
    };
    let mut interp = Interpreter::new(Box::new(source), Box::new(StdoutSink));
    interp.run(PROMPT_PROGRAM, RunMode::Interactive);
}

/// Feeds line-edited terminal input to the engine one character at a
/// time, reading a fresh line whenever the previous one is spent. The
/// prompt itself comes from the idle program, so readline runs bare.
struct LineSource {
    editor: DefaultEditor,
    pending: VecDeque<char>,
}

impl CharSource for LineSource {
    fn next_char(&mut self) -> Option<char> {
        loop {
            if let Some(c) = self.pending.pop_front() {
                return Some(c);
            }
            match self.editor.readline("") {
                Ok(line) => {
                    let _ = self.editor.add_history_entry(line.as_str());
                    self.pending.extend(line.chars());
                    self.pending.push_back('\n');
                }
                Err(ReadlineError::Eof | ReadlineError::Interrupted) => return None,
                Err(err) => {
                    eprintln!("trac64: input error: {err}");
                    return None;
                }
            }
        }
    }
}
