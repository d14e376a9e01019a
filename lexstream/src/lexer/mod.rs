//! Scaffolding for generated scanners: matcher ownership and stacking,
//! start-condition state, and the echo output stream.
//!
//! Generated action code drives a [`Lexer`] by matching through the
//! current matcher, switching start conditions, pushing fresh matchers
//! for include-style context switches, and echoing unmatched text.

use std::io::{self, Write};

use crate::{
    engine::Engine,
    error::{LexerError, EXIT_ERROR},
    matcher::Matcher,
};

/// The initial start condition.
pub const INITIAL: usize = 0;

pub struct Lexer<'a, E: Engine> {
    matcher: Matcher<'a, E>,
    /// Suspended matchers for include-style context switching.
    stack: Vec<Matcher<'a, E>>,
    start: usize,
    state_stack: Vec<usize>,
    out: Box<dyn Write + 'a>,
    /// Overrides the default error action (report and exit 2).
    error_action: Option<Box<dyn FnMut(&LexerError) + 'a>>,
}

impl<'a, E: Engine> Lexer<'a, E> {
    /// Builds a lexer around `matcher`, echoing to stdout.
    pub fn new(matcher: Matcher<'a, E>) -> Self {
        Lexer {
            matcher,
            stack: Vec::new(),
            start: INITIAL,
            state_stack: Vec::new(),
            out: Box::new(io::stdout()),
            error_action: None,
        }
    }

    pub fn set_out(&mut self, out: Box<dyn Write + 'a>) {
        self.out = out;
    }

    pub fn set_error_action(&mut self, action: Box<dyn FnMut(&LexerError) + 'a>) {
        self.error_action = Some(action);
    }

    /// The current matcher.
    pub fn matcher(&mut self) -> &mut Matcher<'a, E> {
        &mut self.matcher
    }

    /// Transfers ownership of a fresh matcher onto the stack and installs
    /// it as current.
    pub fn push_matcher(&mut self, matcher: Matcher<'a, E>) {
        let previous = std::mem::replace(&mut self.matcher, matcher);
        self.stack.push(previous);
    }

    /// Drops the current matcher and restores the previous one. False when
    /// the stack is empty (the current matcher stays).
    pub fn pop_matcher(&mut self) -> bool {
        match self.stack.pop() {
            Some(previous) => {
                self.matcher = previous;
                true
            }
            None => false,
        }
    }

    // --- start conditions -------------------------------------------------

    /// The active start condition.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Switches the start condition without touching the stack.
    pub fn begin(&mut self, condition: usize) {
        self.start = condition;
    }

    /// Enters `condition`, saving the current one.
    pub fn push_state(&mut self, condition: usize) {
        self.state_stack.push(self.start);
        self.start = condition;
    }

    /// Returns to the saved start condition. False (and [`INITIAL`]) when
    /// the stack is empty.
    pub fn pop_state(&mut self) -> bool {
        match self.state_stack.pop() {
            Some(condition) => {
                self.start = condition;
                true
            }
            None => {
                self.start = INITIAL;
                false
            }
        }
    }

    /// The most recently saved start condition.
    pub fn top_state(&self) -> Option<usize> {
        self.state_stack.last().copied()
    }

    // --- character I/O ----------------------------------------------------

    /// Reads one octet from the current matcher's input.
    pub fn input(&mut self) -> Option<u8> {
        self.matcher.input()
    }

    /// Pushes one octet back.
    pub fn unput(&mut self, octet: u8) {
        self.matcher.unput(octet);
    }

    /// Reads one code point.
    pub fn winput(&mut self) -> Option<u32> {
        self.matcher.winput()
    }

    /// Pushes one code point back.
    pub fn wunput(&mut self, cp: u32) {
        self.matcher.wunput(cp);
    }

    /// Writes one octet to the echo stream.
    pub fn output(&mut self, octet: u8) {
        let _ = self.out.write_all(&[octet]);
    }

    /// Echoes the current match text.
    pub fn echo(&mut self) {
        let text = self.matcher.text().to_vec();
        let _ = self.out.write_all(&text);
    }

    /// The default rule action for unmatchable input: report and exit
    /// with status 2, unless an error action was installed.
    pub fn lexer_error(&mut self, message: &str) {
        let error = LexerError::new(message, self.matcher.lineno(), self.matcher.columno());
        match &mut self.error_action {
            Some(action) => action(&error),
            None => {
                eprintln!("{error}");
                std::process::exit(EXIT_ERROR);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{engine::bt, RegexMatcher};

    fn word_lexer(input: &'static str) -> Lexer<'static, bt::BtEngine> {
        let pattern = bt::Pattern::new(r"\w+").unwrap();
        Lexer::new(RegexMatcher::builder(pattern).input(input).build())
    }

    #[test]
    fn start_condition_stack() {
        let mut lx = word_lexer("x");
        assert_eq!(lx.start(), INITIAL);
        lx.push_state(2);
        lx.push_state(5);
        assert_eq!(lx.start(), 5);
        assert_eq!(lx.top_state(), Some(2));
        assert!(lx.pop_state());
        assert_eq!(lx.start(), 2);
        assert!(lx.pop_state());
        assert!(!lx.pop_state());
        assert_eq!(lx.start(), INITIAL);
    }

    #[test]
    fn matcher_stack_for_includes() {
        let mut lx = word_lexer("outer outer");
        assert_eq!(lx.matcher().find(), 1);
        assert_eq!(lx.matcher().text(), b"outer");

        // Switch to an "included" input, then come back.
        let pattern = bt::Pattern::new(r"\w+").unwrap();
        lx.push_matcher(RegexMatcher::builder(pattern).input("inner").build());
        assert_eq!(lx.matcher().find(), 1);
        assert_eq!(lx.matcher().text(), b"inner");
        assert_eq!(lx.matcher().find(), 0);

        assert!(lx.pop_matcher());
        assert_eq!(lx.matcher().find(), 1);
        assert_eq!(lx.matcher().text(), b"outer");
        assert!(!lx.pop_matcher());
    }

    #[test]
    fn input_unput_and_echo() {
        let mut lx = word_lexer("abc");
        assert_eq!(lx.input(), Some(b'a'));
        lx.unput(b'z');
        assert_eq!(lx.input(), Some(b'z'));
        assert_eq!(lx.input(), Some(b'b'));

        let sink: Rc<RefCell<Vec<u8>>> = Rc::default();
        // Rc<RefCell<Vec<u8>>> does not implement Write; a small shim does.
        struct Sink(Rc<RefCell<Vec<u8>>>);
        impl Write for Sink {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        lx.set_out(Box::new(Sink(sink.clone())));
        lx.output(b'!');
        assert_eq!(lx.matcher().find(), 1);
        assert_eq!(lx.matcher().text(), b"c");
        lx.echo();
        assert_eq!(&*sink.borrow(), b"!c");
    }

    #[test]
    fn error_action_override() {
        let mut lx = word_lexer("?!");
        let seen: Rc<RefCell<Option<LexerError>>> = Rc::default();
        let sink = seen.clone();
        lx.set_error_action(Box::new(move |e| {
            *sink.borrow_mut() = Some(e.clone());
        }));
        lx.lexer_error("scanner jammed");
        let error = seen.borrow().clone().unwrap();
        assert_eq!(error.message, "scanner jammed");
        assert_eq!(error.line, 1);
    }
}
