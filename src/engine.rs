//! The rewrite engine: scanner state and the ten-step main loop.
//!
//! TRAC has no grammar produced in advance. The engine consumes the
//! *active* buffer one character at a time, accumulates evaluated text in
//! the *neutral* buffer, and splices each call's result into whichever
//! buffer the call mode selects: an active call (`#(`) feeds its result
//! back to the scanner, a neutral call (`##(`) appends it as data.
//! Parsing, evaluation, and source editing are the same operation.
//!
//! The active buffer is a character queue consumed from the front; the
//! scan cursor is always the front element, and active delivery pushes
//! the result's characters back on the front. The neutral buffer grows at
//! the end while call frames record index ranges into it; closing a frame
//! splices its span back out.

use std::collections::{HashMap, VecDeque};

use crate::form::FormStore;
use crate::io::{CharSink, CharSource};
use crate::primitives::{self, PrimitiveFn};

/// Control signal raised inside primitive evaluation.
///
/// `Halt` unwinds the main loop and clears the per-record state; the form
/// store survives. It is raised by `hl` and by a drained source in a
/// non-interactive read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Halt,
}

/// Whether `run` reseeds the active buffer when it is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// One cycle of the initial program; exhaustion halts.
    Batch,
    /// Reseed with the initial program on exhaustion; only the halt
    /// signal terminates.
    Interactive,
}

/// How a call delivers its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallMode {
    Active,
    Neutral,
}

/// One in-progress call.
struct Frame {
    /// Neutral-buffer index where this call's text begins.
    begin: usize,
    mode: CallMode,
    /// Closed argument slices, as `(start, end)` neutral-buffer ranges.
    arg_slices: Vec<(usize, usize)>,
    /// Start of the argument currently accumulating.
    arg_start: usize,
}

/// A TRAC interpreter instance.
///
/// The form store persists for the life of the value; the active buffer,
/// neutral buffer, and frame stack are per-record state, cleared between
/// top-level records.
pub struct Interpreter {
    forms: FormStore,
    meta: char,
    trace: bool,
    force_active: bool,
    active: VecDeque<char>,
    neutral: Vec<char>,
    frames: Vec<Frame>,
    user_primitives: HashMap<String, PrimitiveFn>,
    source: Box<dyn CharSource>,
    sink: Box<dyn CharSink>,
}

impl Interpreter {
    pub fn new(source: Box<dyn CharSource>, sink: Box<dyn CharSink>) -> Self {
        Interpreter {
            forms: FormStore::new(),
            meta: '\'',
            trace: false,
            force_active: false,
            active: VecDeque::new(),
            neutral: Vec::new(),
            frames: Vec::new(),
            user_primitives: HashMap::new(),
            source,
            sink,
        }
    }

    pub fn forms(&self) -> &FormStore {
        &self.forms
    }

    pub fn forms_mut(&mut self) -> &mut FormStore {
        &mut self.forms
    }

    /// The current meta-character (`qm`).
    pub fn meta(&self) -> char {
        self.meta
    }

    /// Change the meta-character (`cm`).
    pub fn set_meta(&mut self, meta: char) {
        self.meta = meta;
    }

    /// Turn call tracing on or off (`tn`/`tf`).
    pub fn set_trace(&mut self, on: bool) {
        self.trace = on;
    }

    /// Request that the next delivery go to the active buffer regardless
    /// of call mode. One-shot: consumed by that delivery.
    pub fn set_force_active(&mut self) {
        self.force_active = true;
    }

    /// One character from the source; `None` is end of source.
    pub fn read_char(&mut self) -> Option<char> {
        self.source.next_char()
    }

    /// Write text to the sink.
    pub fn write(&mut self, text: &str) {
        self.sink.put(text);
    }

    /// Install or replace a caller-supplied primitive. User primitives
    /// shadow built-ins of the same name and are themselves shadowed by
    /// forms.
    pub fn register_primitive(&mut self, name: &str, run: PrimitiveFn) {
        self.user_primitives.insert(name.to_owned(), run);
    }

    /// Run one program text as a single record and return the residual
    /// neutral text. The form store persists across calls; a halt leaves
    /// the residue empty.
    pub fn execute(&mut self, program: &str) -> String {
        self.seed(program);
        if self.scan(None).is_err() {
            self.clear_record_state();
        }
        self.neutral.iter().collect()
    }

    /// Drive the engine from an initial program. Batch mode halts when
    /// the active buffer is exhausted; interactive mode reseeds it with
    /// the initial program and terminates only on the halt signal.
    pub fn run(&mut self, initial_program: &str, mode: RunMode) {
        self.seed(initial_program);
        let reseed = match mode {
            RunMode::Interactive => Some(initial_program),
            RunMode::Batch => None,
        };
        if self.scan(reseed).is_err() {
            self.clear_record_state();
        }
    }

    /// Start a fresh record with the given program as active text.
    fn seed(&mut self, program: &str) {
        self.clear_record_state();
        self.active.extend(program.chars());
    }

    fn clear_record_state(&mut self) {
        self.active.clear();
        self.neutral.clear();
        self.frames.clear();
        self.force_active = false;
    }

    /// The ten-step scanner: one dispatch per character at the front of
    /// the active buffer, in the order the cases are written.
    fn scan(&mut self, reseed: Option<&str>) -> Result<(), Signal> {
        loop {
            let Some(&ch) = self.active.front() else {
                match reseed {
                    Some(program) => {
                        self.seed(program);
                        continue;
                    }
                    None => return Ok(()),
                }
            };
            if ch == '\t' || ch == '\n' || ch == '\r' || ch == self.meta {
                // Record terminators are plain deletions while scanning;
                // only `rs` gives the meta-character meaning.
                self.active.pop_front();
            } else if ch == '(' {
                self.active.pop_front();
                if !self.copy_protected() {
                    // Unbalanced protective parentheses: record abandoned.
                    self.clear_record_state();
                }
            } else if ch == ',' && !self.frames.is_empty() {
                self.active.pop_front();
                self.close_argument();
            } else if ch == '#' {
                if self.active.get(1) == Some(&'(') {
                    self.active.drain(..2);
                    self.open_frame(CallMode::Active);
                } else if self.active.get(1) == Some(&'#') && self.active.get(2) == Some(&'(') {
                    self.active.drain(..3);
                    self.open_frame(CallMode::Neutral);
                } else {
                    self.active.pop_front();
                    self.neutral.push('#');
                }
            } else if ch == ')' {
                self.active.pop_front();
                if self.frames.is_empty() {
                    // Close with no open call: record abandoned.
                    self.clear_record_state();
                } else {
                    self.close_frame()?;
                }
            } else {
                self.active.pop_front();
                self.neutral.push(ch);
            }
        }
    }

    /// Copy a protective-parenthesis group into the neutral buffer,
    /// honoring nesting; both delimiters are deleted. False when the
    /// buffer ends before the group closes.
    fn copy_protected(&mut self) -> bool {
        let mut depth = 1usize;
        while let Some(c) = self.active.pop_front() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return true;
                    }
                }
                _ => {}
            }
            self.neutral.push(c);
        }
        false
    }

    fn open_frame(&mut self, mode: CallMode) {
        let begin = self.neutral.len();
        self.frames.push(Frame {
            begin,
            mode,
            arg_slices: Vec::new(),
            arg_start: begin,
        });
    }

    /// A comma inside a call: close the current argument slice and start
    /// the next one.
    fn close_argument(&mut self) {
        let end = self.neutral.len();
        if let Some(frame) = self.frames.last_mut() {
            frame.arg_slices.push((frame.arg_start, end));
            frame.arg_start = end;
        }
    }

    /// Close the innermost call: extract the callee name and arguments,
    /// splice the call's span out of the neutral buffer, dispatch, and
    /// deliver the result.
    fn close_frame(&mut self) -> Result<(), Signal> {
        let Some(mut frame) = self.frames.pop() else {
            return Ok(());
        };
        frame.arg_slices.push((frame.arg_start, self.neutral.len()));
        let mut pieces: Vec<String> = frame
            .arg_slices
            .iter()
            .map(|&(start, end)| self.neutral[start..end].iter().collect())
            .collect();
        self.neutral.truncate(frame.begin);

        // The final slice always exists, so there is at least a name.
        let name = pieces.remove(0);
        let args = pieces;
        if self.trace {
            self.announce(&name, &args);
        }
        let value = self.dispatch(&name, &args)?;

        let forced = std::mem::take(&mut self.force_active);
        match frame.mode {
            CallMode::Neutral if !forced => self.neutral.extend(value.chars()),
            _ => {
                for c in value.chars().rev() {
                    self.active.push_front(c);
                }
            }
        }
        Ok(())
    }

    /// Resolution order: forms shadow user-registered primitives, which
    /// shadow built-ins; unknown callees yield the empty string.
    fn dispatch(&mut self, name: &str, args: &[String]) -> Result<String, Signal> {
        if let Some(form) = self.forms.get(name) {
            return Ok(form.fill(args));
        }
        if let Some(run) = self.user_primitives.get(name).copied() {
            return run(self, args);
        }
        if let Some(run) = primitives::lookup(name) {
            return run(self, args);
        }
        Ok(String::new())
    }

    /// Trace announcement: the call rendered back in TRAC syntax.
    fn announce(&mut self, name: &str, args: &[String]) {
        let mut call = String::from("#(");
        call.push_str(name);
        for arg in args {
            call.push(',');
            call.push_str(arg);
        }
        call.push_str(")\n");
        self.sink.put(&call);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{BufferSink, StringSource};

    fn interp_with_input(input: &str) -> (Interpreter, BufferSink) {
        let sink = BufferSink::new();
        let interp = Interpreter::new(
            Box::new(StringSource::new(input)),
            Box::new(sink.clone()),
        );
        (interp, sink)
    }

    fn interp() -> (Interpreter, BufferSink) {
        interp_with_input("")
    }

    #[test]
    fn test_call_free_program_reproduces_its_text() {
        let (mut interp, _) = interp();
        assert_eq!(interp.execute("hello, world"), "hello, world");
    }

    #[test]
    fn test_control_characters_and_meta_are_deleted() {
        let (mut interp, _) = interp();
        assert_eq!(interp.execute("a\tb\nc\rd'e"), "abcde");
    }

    #[test]
    fn test_protective_parentheses_quote_one_level() {
        let (mut interp, sink) = interp();
        assert_eq!(interp.execute("((3+4))*9 = #(ml,#(ad,3,4),9)'"), "(3+4)*9 = 63");
        assert_eq!(sink.contents(), "");
    }

    #[test]
    fn test_protected_text_keeps_commas_and_meta() {
        let (mut interp, sink) = interp();
        interp.execute("#(ps,(A,'B))'");
        assert_eq!(sink.contents(), "A,'B");
    }

    #[test]
    fn test_lone_hashes_are_ordinary_text() {
        let (mut interp, _) = interp();
        assert_eq!(interp.execute("a#b##c#"), "a#b##c#");
    }

    #[test]
    fn test_neutral_call_returns_text_unevaluated() {
        // From the reference suite: BB's body is itself a call. A neutral
        // call hands it over as data; an active call executes it.
        let (mut interp, sink) = interp();
        interp.execute("#(ds,AA,Cat)'");
        interp.execute("#(ds,BB,(#(cl,AA)))'");
        interp.execute("#(ps,##(cl,BB))'");
        assert_eq!(sink.contents(), "#(cl,AA)");
        interp.execute("#(ps,#(cl,BB))'");
        assert_eq!(sink.contents(), "#(cl,AA)Cat");
    }

    #[test]
    fn test_unbalanced_parenthesis_abandons_record_but_keeps_forms() {
        let (mut interp, _) = interp();
        assert_eq!(interp.execute("#(ds,keep,X)rest(oops"), "");
        assert_eq!(interp.execute("#(cl,keep)'"), "X");
    }

    #[test]
    fn test_stray_close_abandons_record() {
        let (mut interp, _) = interp();
        assert_eq!(interp.execute("abc)def"), "");
    }

    #[test]
    fn test_unknown_callee_yields_empty() {
        let (mut interp, _) = interp();
        assert_eq!(interp.execute("x#(nosuch,1,2)y'"), "xy");
    }

    #[test]
    fn test_form_shadows_primitive() {
        let (mut interp, sink) = interp();
        interp.execute("#(ds,eq,FORM)'");
        interp.execute("#(ps,#(eq))'");
        assert_eq!(sink.contents(), "FORM");
    }

    #[test]
    fn test_user_primitive_shadows_builtin_but_not_forms() {
        fn always_nine(_interp: &mut Interpreter, _args: &[String]) -> Result<String, Signal> {
            Ok("9".to_owned())
        }
        let (mut interp, _) = interp();
        interp.register_primitive("ad", always_nine);
        assert_eq!(interp.execute("#(ad,1,2)'"), "9");
        interp.execute("#(ds,ad,FORM)'");
        assert_eq!(interp.execute("#(ad)'"), "FORM");
    }

    #[test]
    fn test_halt_clears_record_and_stops_scan() {
        let (mut interp, sink) = interp();
        assert_eq!(interp.execute("#(ps,A)#(hl)#(ps,B)'"), "");
        assert_eq!(sink.contents(), "A");
    }

    #[test]
    fn test_factorial_recursion_with_big_integers() {
        let (mut interp, _) = interp();
        interp.execute("#(ds,Factorial,(#(eq,X,1,1,(#(ml,X,#(cl,Factorial,#(su,X,1)))))))'");
        interp.execute("#(ss,Factorial,X)'");
        assert_eq!(interp.execute("#(cl,Factorial,5)'"), "120");
        assert_eq!(
            interp.execute("#(cl,Factorial,50)'"),
            "30414093201713378043612608166064768844377641568960512000000000000"
        );
    }

    #[test]
    fn test_navigation_fallback_is_forced_active() {
        let (mut interp, sink) = interp();
        interp.execute("#(ds,F,abXcdYef)#(ss,F,X,Y)'");
        let residue = interp.execute("#(ps,#(cn,F,3,ZZ))#(ps,#(cn,F,2,ZZ))##(cn,F,10,ZZ)'");
        assert_eq!(sink.contents(), "abcde");
        // The overflow fallback was delivered into the active stream and
        // rescanned as ordinary text despite the neutral call mode.
        assert_eq!(residue, "ZZ");
    }

    #[test]
    fn test_trace_announces_calls_before_evaluation() {
        let (mut interp, sink) = interp();
        assert_eq!(interp.execute("#(tn)#(ad,1,2)'"), "3");
        assert_eq!(sink.contents(), "#(ad,1,2)\n");
        interp.execute("#(tf)'");
        interp.execute("#(ad,3,4)'");
        assert_eq!(sink.contents(), "#(ad,1,2)\n#(tf)\n");
    }

    #[test]
    fn test_changed_meta_character_takes_over_scanning_and_reads() {
        let (mut interp, _) = interp_with_input("hi!ignored");
        interp.execute("#(cm,!)");
        // `'` is no longer a terminator, `!` now is.
        assert_eq!(interp.execute("#(rs)!a'b"), "hia'b");
    }

    #[test]
    fn test_run_batch_executes_one_record_and_halts() {
        let (mut interp, sink) = interp_with_input("abc'xyz");
        interp.run(crate::READ_EVAL_PRINT, RunMode::Batch);
        assert_eq!(sink.contents(), "abc");
    }

    #[test]
    fn test_run_batch_quoted_output() {
        let (mut interp, sink) = interp_with_input("#(ps,(ABC))'");
        interp.run(crate::READ_EVAL_PRINT, RunMode::Batch);
        assert_eq!(sink.contents(), "ABC");
    }

    #[test]
    fn test_run_batch_nested_read_consumes_following_record() {
        let (mut interp, sink) = interp_with_input("#(ps,] )#(ps,#(rs))'XYZ'");
        interp.run(crate::READ_EVAL_PRINT, RunMode::Batch);
        assert_eq!(sink.contents(), "] XYZ");
    }

    #[test]
    fn test_run_batch_record_without_meta_still_executes() {
        let (mut interp, sink) = interp_with_input("#(ps,hi)");
        interp.run(crate::READ_EVAL_PRINT, RunMode::Batch);
        assert_eq!(sink.contents(), "hi");
    }

    #[test]
    fn test_run_interactive_reseeds_until_source_drained() {
        let (mut interp, sink) = interp_with_input("#(ps,one)'#(ps,two)'");
        interp.run(crate::READ_EVAL_PRINT, RunMode::Interactive);
        assert_eq!(sink.contents(), "onetwo");
    }

    #[test]
    fn test_read_character_one_at_a_time() {
        let (mut interp, sink) = interp_with_input("ab");
        interp.execute("#(ps,#(rc))#(ps,#(rc))'");
        assert_eq!(sink.contents(), "ab");
    }

    #[test]
    fn test_read_character_halts_on_drained_source() {
        let (mut interp, sink) = interp();
        interp.execute("#(ps,before)#(ps,#(rc))#(ps,after)'");
        assert_eq!(sink.contents(), "before");
    }
}
