/*!
The streaming matcher: abstract state shared by every engine, the four
match methods, and the iterators over them.

A [`Matcher`] pairs an [`Input`] with a compiled pattern and yields
matches on demand:

```
use lexstream::{engine::bt, RegexMatcher};

let pattern = bt::Pattern::new(r"\w+").unwrap();
let mut matcher = RegexMatcher::builder(pattern).input("abc 123\n").build();
let words: Vec<_> = matcher.find_iter().map(|m| m.as_str().into_owned()).collect();
assert_eq!(words, ["abc", "123"]);
```

The buffer may be smaller than the input: the engines refill it on
demand, shifting already-reported text out and growing only when a match
spans more than the current allocation. Text returned by the borrowing
accessors is valid until the next match operation.
*/

use bon::bon;
use lexstream_encoding::utf8;

use crate::{
    engine::{Engine, Group, Method},
    input::Input,
};

pub(crate) mod buffer;
mod matches;
mod options;

pub use matches::{Match, EMPTY};
pub use options::{Flags, Options};

use buffer::{expand_tabs, Buffer, GOT_BOB};

/// Default refill block size in octets.
pub const BLOCK: usize = 4096;

/// The abstract matcher state every engine drives: the dynamic buffer and
/// its four positions, the input source, options, the current accept, and
/// the line/column/indent bookkeeping.
///
/// Engines move `pos` as they read, record accepts by setting `cur`, and
/// must go through [`fill`](Context::fill)/[`ensure_pos`](Context::ensure_pos)
/// for more input: a refill may shift or grow the buffer, which rebases
/// every position. Offsets held in engine locals across a refill are
/// stale; engine-derived state (e.g. a reissued third-party search) must
/// be rebuilt instead.
pub struct Context<'a> {
    pub(crate) buf: Buffer,
    pub(crate) input: Input<'a>,
    pub(crate) opt: Options,
    /// Accept index of the current match; 0 when none.
    pub(crate) cap: usize,
    /// Length of the current match text. Usually `cur - txt`; differs for
    /// split, where `cur` sits past the delimiter but the text is the run
    /// before it.
    pub(crate) len: usize,
    /// Lookahead head positions, indexed by lookahead number.
    pub(crate) lap: Vec<Option<usize>>,
    /// Indent stop columns, strictly ascending.
    pub(crate) stops: Vec<usize>,
    /// Saved stop vectors for push/pop of context.
    pub(crate) stop_stack: Vec<Vec<usize>>,
    /// Dedents still owed by the last `dedent()` decision.
    pub(crate) ded: usize,
    /// Keep `txt` for the next match (`more()`).
    pub(crate) mor: bool,
    /// Anchor of text kept by `more()`, pinned against shifts until the
    /// next match finalizes.
    pub(crate) kep: Option<usize>,
    /// Terminal split run has been yielded.
    pub(crate) fin: bool,
    /// Stream-global end of the last zero-width match, for the
    /// one-code-unit progress rule.
    pub(crate) zw_end: Option<usize>,
}

impl<'a> Context<'a> {
    fn new(input: Input<'a>, opt: Options, block: usize) -> Self {
        Context {
            buf: Buffer::new(block),
            input,
            opt,
            cap: 0,
            len: 0,
            lap: Vec::new(),
            stops: Vec::new(),
            stop_stack: Vec::new(),
            ded: 0,
            mor: false,
            kep: None,
            fin: false,
            zw_end: None,
        }
    }

    /// Brings more octets into the buffer, rebasing the lookahead table
    /// when the refill shifted. Returns octets added; 0 at end of input.
    pub(crate) fn fill(&mut self) -> usize {
        let keep = self.kep.map_or(self.buf.txt, |k| k.min(self.buf.txt));
        let before = self.buf.num;
        let n = self.buf.fill(&mut self.input, self.opt.tab, keep);
        let delta = self.buf.num - before;
        if delta > 0 {
            for slot in self.lap.iter_mut().flatten() {
                *slot -= delta.min(*slot);
            }
            if let Some(k) = self.kep.as_mut() {
                *k -= delta.min(*k);
            }
        }
        n
    }

    /// Makes the octet at `pos` available, filling as needed.
    #[cfg_attr(feature = "perf-inline", inline(always))]
    pub(crate) fn ensure_pos(&mut self) -> bool {
        while self.buf.pos >= self.buf.end {
            if self.buf.eof || self.fill() == 0 {
                return false;
            }
        }
        true
    }

    /// Makes the octet at `cur` available, filling as needed.
    pub(crate) fn ensure_cur(&mut self) -> bool {
        while self.buf.cur >= self.buf.end {
            if self.buf.eof || self.fill() == 0 {
                return false;
            }
        }
        true
    }

    /// Ensures `end - cur ≥ n` where the input allows, filling as needed.
    /// Returns the window actually available.
    pub(crate) fn window(&mut self, n: usize) -> usize {
        while self.buf.end - self.buf.cur < n {
            if self.buf.eof || self.fill() == 0 {
                break;
            }
        }
        self.buf.end - self.buf.cur
    }

    /// Stream-global position of a buffer offset.
    #[cfg_attr(feature = "perf-inline", inline(always))]
    pub(crate) fn global(&self, offset: usize) -> usize {
        self.buf.num + offset
    }

    /// Starts a new match attempt: `txt` moves up to `cur` unless `more()`
    /// asked to keep the current text, in which case its start is pinned
    /// until the attempt finalizes.
    pub(crate) fn begin(&mut self) {
        if self.mor {
            self.mor = false;
            self.kep = Some(self.buf.txt);
        } else {
            self.kep = None;
        }
        self.buf.txt = self.buf.cur;
        self.cap = 0;
        self.len = 0;
        self.lap.clear();
    }

    /// Folds the text pinned by `more()` back into a finalized match.
    pub(crate) fn absorb_kept(&mut self) {
        if let Some(k) = self.kep.take() {
            self.len += self.buf.txt - k;
            self.buf.txt = k;
        }
    }

    /// Finalizes a successful match of `cap` ending at `cur`.
    pub(crate) fn take(&mut self, cap: usize) -> usize {
        self.buf.pos = self.buf.cur;
        self.len = self.buf.cur - self.buf.txt;
        self.absorb_kept();
        self.cap = cap;
        cap
    }

    /// Finalizes a failed attempt.
    pub(crate) fn miss(&mut self) -> usize {
        self.kep = None;
        self.buf.pos = self.buf.cur;
        self.len = 0;
        self.cap = 0;
        0
    }

    /// Advances `cur` (and `txt`) by one code unit; used to guarantee
    /// progress after zero-width matches and failed FIND attempts.
    pub(crate) fn bump(&mut self) {
        if !self.ensure_cur() {
            return;
        }
        let n = utf8::lead_len(self.buf.byte(self.buf.cur));
        self.buf.cur = (self.buf.cur + n).min(self.buf.end);
        self.buf.txt = self.buf.cur;
        self.buf.pos = self.buf.cur;
    }

    /// Extends a FIND match over its terminating newline (option `A`).
    pub(crate) fn extend_newline(&mut self) {
        self.buf.pos = self.buf.cur;
        if self.ensure_pos() && self.buf.byte(self.buf.cur) == b'\n' {
            self.buf.cur += 1;
            self.buf.pos = self.buf.cur;
            self.len += 1;
        }
    }

    // --- predicates ------------------------------------------------------

    /// The octet before `at`, or `None` at the beginning of the stream.
    pub(crate) fn before(&self, at: usize) -> Option<u8> {
        if at > 0 {
            Some(self.buf.byte(at - 1))
        } else if self.buf.got == GOT_BOB {
            None
        } else {
            Some(self.buf.got as u8)
        }
    }

    /// ASCII word octet, as the DFA meta predicates define words.
    #[inline]
    pub(crate) fn is_word(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_'
    }

    pub(crate) fn at_bob(&self) -> bool {
        self.global(self.buf.pos) == 0
    }

    pub(crate) fn at_bol(&self) -> bool {
        match self.before(self.buf.pos) {
            None => true,
            Some(b) => b == b'\n',
        }
    }

    /// End of buffered input with no more to come.
    pub(crate) fn at_eob(&mut self) -> bool {
        !self.ensure_pos()
    }

    pub(crate) fn at_eol(&mut self) -> bool {
        if !self.ensure_pos() {
            return true;
        }
        self.buf.byte(self.buf.pos) == b'\n'
    }

    pub(crate) fn at_word_begin(&mut self) -> bool {
        let prev = self.before(self.buf.pos).is_some_and(Self::is_word);
        let next = self.ensure_pos() && Self::is_word(self.buf.byte(self.buf.pos));
        !prev && next
    }

    pub(crate) fn at_word_end(&mut self) -> bool {
        let prev = self.before(self.buf.pos).is_some_and(Self::is_word);
        let next = self.ensure_pos() && Self::is_word(self.buf.byte(self.buf.pos));
        prev && !next
    }

    pub(crate) fn at_non_word_boundary(&mut self) -> bool {
        let prev = self.before(self.buf.pos).is_some_and(Self::is_word);
        let next = self.ensure_pos() && Self::is_word(self.buf.byte(self.buf.pos));
        prev == next
    }

    // --- line/column -----------------------------------------------------

    /// Line number (1-based) at a buffer offset, counted lazily from the
    /// buffer base. `memchr` supplies the vectorized newline scan.
    pub(crate) fn lineno_at(&self, offset: usize) -> usize {
        self.buf.lno_base + memchr::memchr_iter(b'\n', &self.buf.octets()[..offset]).count()
    }

    /// Column (0-based, tab-expanded per option `T`) at a buffer offset.
    pub(crate) fn columno_at(&self, offset: usize) -> usize {
        let head = &self.buf.octets()[..offset];
        match memchr::memrchr(b'\n', head) {
            Some(nl) => expand_tabs(&head[nl + 1..], 0, self.opt.tab),
            None => expand_tabs(head, self.buf.cno_base, self.opt.tab),
        }
    }

    // --- indent engine ---------------------------------------------------

    /// True iff the column at `pos` exceeds the top indent stop; pushes it.
    pub(crate) fn indent(&mut self) -> bool {
        let col = self.columno_at(self.buf.pos);
        if col > self.stops.last().copied().unwrap_or(0) {
            self.stops.push(col);
            true
        } else {
            false
        }
    }

    /// True iff the column at `pos` is below the top indent stop. Pops
    /// every stop above the column and owes one dedent per popped stop, so
    /// consecutive FSM cycles emit one dedent token each.
    pub(crate) fn dedent(&mut self) -> bool {
        if self.ded > 0 {
            self.ded -= 1;
            return true;
        }
        let col = self.columno_at(self.buf.pos);
        if self.stops.last().is_some_and(|&stop| col < stop) {
            while self.stops.last().is_some_and(|&stop| stop > col) {
                self.stops.pop();
                self.ded += 1;
            }
            self.ded -= 1;
            true
        } else {
            false
        }
    }

    /// Resets indent bookkeeping entirely.
    pub(crate) fn undent(&mut self) -> bool {
        self.stops.clear();
        self.ded = 0;
        true
    }

    // --- lookahead table -------------------------------------------------

    pub(crate) fn lap_set(&mut self, index: usize, at: usize) {
        if self.lap.len() <= index {
            self.lap.resize(index + 1, None);
        }
        self.lap[index] = Some(at);
    }

    pub(crate) fn lap_get(&self, index: usize) -> Option<usize> {
        self.lap.get(index).copied().flatten()
    }
}

/// A streaming matcher: a compiled pattern, an engine driving it, and the
/// shared [`Context`]. Generic over the engine; the common pairings have
/// aliases ([`DfaMatcher`](crate::DfaMatcher),
/// [`RegexMatcher`](crate::RegexMatcher),
/// [`LineMatcher`](crate::LineMatcher)).
pub struct Matcher<'a, E: Engine> {
    ctx: Context<'a>,
    engine: E,
}

#[bon]
impl<'a, E: Engine> Matcher<'a, E> {
    /// Builds a matcher over `pattern`.
    #[builder]
    pub fn new(
        #[builder(start_fn)] pattern: E::Pattern,

        /// The input source; anything convertible, including another
        /// matcher's released input.
        #[builder(into)]
        input: Input<'a>,

        /// Option string `(A|N|X|W|T(=digit)?|;)*`; unknown characters
        /// are ignored.
        options: Option<&str>,

        /// Refill block size in octets.
        #[builder(default = BLOCK)]
        block: usize,
    ) -> Self {
        Matcher {
            ctx: Context::new(
                input,
                options.map(Options::parse).unwrap_or_default(),
                block,
            ),
            engine: E::from_pattern(pattern),
        }
    }

    fn step(&mut self, method: Method) -> usize {
        // Progress rule: after a zero-width match the next attempt starts
        // one code unit further, except for the single accept permitted at
        // the beginning of input.
        if let Some(end) = self.ctx.zw_end.take() {
            if self.ctx.global(self.ctx.buf.cur) == end && method != Method::Split {
                self.ctx.bump();
                if self.ctx.global(self.ctx.buf.cur) == end {
                    // End of input: no progress is possible.
                    return self.ctx.miss();
                }
            }
        }
        let cap = self.engine.search(&mut self.ctx, method);
        if cap != 0
            && self.ctx.len == 0
            && matches!(method, Method::Scan | Method::Find)
        {
            self.ctx.zw_end = Some(self.ctx.global(self.ctx.buf.cur));
        }
        self.ctx.buf.check_invariants();
        cap
    }

    /// Anchored scan: the accept index of a match starting exactly at the
    /// current position, or 0.
    pub fn scan(&mut self) -> usize {
        self.step(Method::Scan)
    }

    /// Search: the accept index of the next match at or after the current
    /// position, or 0.
    pub fn find(&mut self) -> usize {
        self.step(Method::Find)
    }

    /// Split: yields the next run of non-matching input. Returns the
    /// delimiter's accept index, [`EMPTY`] once for the terminal run, then 0.
    pub fn split(&mut self) -> usize {
        self.step(Method::Split)
    }

    /// Full match: the accept index if the entire remaining input matches,
    /// or 0.
    pub fn matches(&mut self) -> usize {
        self.step(Method::Match)
    }

    // --- accessors (valid until the next match operation) ----------------

    /// The current match text.
    pub fn text(&self) -> &[u8] {
        let txt = self.ctx.buf.txt;
        &self.ctx.buf.octets()[txt..txt + self.ctx.len]
    }

    /// The current match text as a string, lossily where the non-character
    /// sentinel appears.
    pub fn text_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.text())
    }

    /// Length of the current match text in octets.
    pub fn size(&self) -> usize {
        self.ctx.len
    }

    /// Accept index of the current match.
    pub fn accept(&self) -> usize {
        self.ctx.cap
    }

    /// Stream-global byte range of the current match text.
    pub fn span(&self) -> std::ops::Range<usize> {
        let start = self.ctx.global(self.ctx.buf.txt);
        start..start + self.ctx.len
    }

    /// Line number (1-based) of the start of the current match.
    pub fn lineno(&self) -> usize {
        self.ctx.lineno_at(self.ctx.buf.txt)
    }

    /// Column (0-based, tab-expanded) of the start of the current match.
    pub fn columno(&self) -> usize {
        self.ctx.columno_at(self.ctx.buf.txt)
    }

    /// True at the beginning of input with nothing consumed.
    pub fn at_bob(&self) -> bool {
        self.ctx.global(self.ctx.buf.cur) == 0
    }

    /// True once the input is exhausted and fully consumed.
    pub fn at_end(&mut self) -> bool {
        self.ctx.buf.pos = self.ctx.buf.cur;
        !self.ctx.ensure_pos()
    }

    /// True while the input source saw no read error.
    pub fn good(&self) -> bool {
        self.ctx.input.good()
    }

    /// True once the input source reached end-of-file.
    pub fn eof(&self) -> bool {
        self.ctx.input.eof()
    }

    /// False once malformed UTF-8 was replaced in the input stream.
    pub fn is_utf8(&self) -> bool {
        self.ctx.input.is_utf8()
    }

    // --- input utilities --------------------------------------------------

    /// The next octet without consuming it.
    pub fn peek(&mut self) -> Option<u8> {
        self.ctx.buf.pos = self.ctx.buf.cur;
        self.ctx.ensure_pos().then(|| self.ctx.buf.byte(self.ctx.buf.cur))
    }

    /// Reads one octet.
    pub fn input(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.ctx.buf.cur += 1;
        self.ctx.buf.txt = self.ctx.buf.cur;
        self.ctx.buf.pos = self.ctx.buf.cur;
        self.ctx.len = 0;
        Some(b)
    }

    /// Reads one code point (possibly the non-character sentinel).
    pub fn winput(&mut self) -> Option<u32> {
        let lead = self.peek()?;
        let need = utf8::lead_len(lead);
        while self.ctx.buf.end - self.ctx.buf.cur < need {
            if self.ctx.buf.eof || self.ctx.fill() == 0 {
                break;
            }
        }
        let cur = self.ctx.buf.cur;
        let avail = &self.ctx.buf.octets()[cur..];
        let (cp, n) = utf8::decode(avail);
        self.ctx.buf.cur += n;
        self.ctx.buf.txt = self.ctx.buf.cur;
        self.ctx.buf.pos = self.ctx.buf.cur;
        self.ctx.len = 0;
        Some(cp)
    }

    /// Pushes one octet back; it is the next octet read.
    pub fn unput(&mut self, b: u8) {
        self.ctx.buf.insert(self.ctx.buf.cur, &[b]);
        self.ctx.buf.pos = self.ctx.buf.cur;
    }

    /// Pushes one code point back in UTF-8 form.
    pub fn wunput(&mut self, cp: u32) {
        let mut seq = [0u8; 6];
        let n = utf8::encode(cp, &mut seq);
        self.ctx.buf.insert(self.ctx.buf.cur, &seq[..n]);
        self.ctx.buf.pos = self.ctx.buf.cur;
    }

    /// Keeps the current text: the next match extends it instead of
    /// starting after it.
    pub fn more(&mut self) {
        self.ctx.mor = true;
    }

    /// Truncates the current match to its first `n` octets; the rest is
    /// rescanned by the next match operation.
    pub fn less(&mut self, n: usize) {
        if n < self.ctx.len {
            self.ctx.buf.cur = self.ctx.buf.txt + n;
            self.ctx.buf.pos = self.ctx.buf.cur;
            self.ctx.len = n;
        }
    }

    // --- indent stops ----------------------------------------------------

    /// The current indent stop columns, strictly ascending.
    pub fn stops(&self) -> &[usize] {
        &self.ctx.stops
    }

    pub fn last_stop(&self) -> usize {
        self.ctx.stops.last().copied().unwrap_or(0)
    }

    pub fn insert_stop(&mut self, column: usize) {
        if let Err(at) = self.ctx.stops.binary_search(&column) {
            self.ctx.stops.insert(at, column);
        }
    }

    /// Removes stops at or above `column`.
    pub fn delete_stop(&mut self, column: usize) {
        self.ctx.stops.retain(|&stop| stop < column);
    }

    pub fn clear_stops(&mut self) {
        self.ctx.stops.clear();
    }

    /// Saves the current stop vector.
    pub fn push_stops(&mut self) {
        let saved = std::mem::take(&mut self.ctx.stops);
        self.ctx.stop_stack.push(saved);
    }

    /// Restores the last saved stop vector.
    pub fn pop_stops(&mut self) {
        if let Some(stops) = self.ctx.stop_stack.pop() {
            self.ctx.stops = stops;
        }
    }

    // --- groups -----------------------------------------------------------

    /// Capture group `n` of the current match; group 0 is the whole match.
    pub fn group(&self, n: usize) -> Option<&[u8]> {
        let Group { start, end } = self.engine.group(&self.ctx, n)?;
        Some(&self.ctx.buf.octets()[start..end])
    }

    /// First matched capture group (index and name), restarting traversal.
    pub fn group_id(&mut self) -> Option<(usize, Option<&str>)> {
        self.engine.group_id()
    }

    /// Next matched capture group in order.
    pub fn group_next_id(&mut self) -> Option<(usize, Option<&str>)> {
        self.engine.group_next_id()
    }

    // --- lifecycle ---------------------------------------------------------

    /// Clears all positions and counters (retaining the buffer allocation)
    /// and optionally installs a new option string.
    pub fn reset(&mut self, options: Option<&str>) {
        if let Some(spec) = options {
            self.ctx.opt = Options::parse(spec);
        }
        self.ctx.buf.reset();
        self.ctx.cap = 0;
        self.ctx.len = 0;
        self.ctx.lap.clear();
        self.ctx.stops.clear();
        self.ctx.stop_stack.clear();
        self.ctx.ded = 0;
        self.ctx.mor = false;
        self.ctx.kep = None;
        self.ctx.fin = false;
        self.ctx.zw_end = None;
        self.engine.reset();
    }

    /// Rebinds the matcher to a new input, resetting all positions.
    pub fn set_input(&mut self, input: impl Into<Input<'a>>) {
        self.ctx.input = input.into();
        self.reset(None);
    }

    /// Replaces the pattern; cached engine iteration state is discarded.
    pub fn set_pattern(&mut self, pattern: E::Pattern) {
        self.engine.set_pattern(pattern);
        self.engine.reset();
    }

    /// Discards all buffered input (for lexer buffer flushes).
    pub fn flush(&mut self) {
        let tab = self.ctx.opt.tab;
        self.ctx.buf.flush(tab);
    }

    // --- iterators ---------------------------------------------------------

    /// Iterates over FIND matches.
    pub fn find_iter(&mut self) -> FindIter<'_, 'a, E> {
        FindIter { matcher: self }
    }

    /// Iterates over SCAN matches (stops at the first gap).
    pub fn scan_iter(&mut self) -> ScanIter<'_, 'a, E> {
        ScanIter { matcher: self }
    }

    /// Iterates over SPLIT runs, including the terminal one.
    pub fn split_iter(&mut self) -> SplitIter<'_, 'a, E> {
        SplitIter { matcher: self }
    }

    fn take_match(&self, accept: usize) -> Match {
        Match {
            accept,
            text: self.text().to_vec().into_boxed_slice(),
            start: self.ctx.global(self.ctx.buf.txt),
            line: self.lineno(),
            column: self.columno(),
        }
    }
}

pub struct FindIter<'m, 'a, E: Engine> {
    matcher: &'m mut Matcher<'a, E>,
}

impl<E: Engine> Iterator for FindIter<'_, '_, E> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        match self.matcher.find() {
            0 => None,
            cap => Some(self.matcher.take_match(cap)),
        }
    }
}

pub struct ScanIter<'m, 'a, E: Engine> {
    matcher: &'m mut Matcher<'a, E>,
}

impl<E: Engine> Iterator for ScanIter<'_, '_, E> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        match self.matcher.scan() {
            0 => None,
            cap => Some(self.matcher.take_match(cap)),
        }
    }
}

pub struct SplitIter<'m, 'a, E: Engine> {
    matcher: &'m mut Matcher<'a, E>,
}

impl<E: Engine> Iterator for SplitIter<'_, '_, E> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        match self.matcher.split() {
            0 => None,
            cap => Some(self.matcher.take_match(cap)),
        }
    }
}
