//! The third-party regex engine: an adapter over `regex-automata`'s
//! [`BoundedBacktracker`] with capture-group support.
//!
//! The backtracker searches a complete slice, so the adapter buffers
//! greedily: a search whose outcome could still change with more input (a
//! no-match, or a match touching the buffered end) triggers a refill and
//! is reissued from scratch. The refill may shift or grow the buffer, so
//! nothing derived from a previous search survives it.

use std::sync::Arc;

use bon::bon;
use lexstream_encoding::utf8;
use regex_automata::{
    nfa::thompson::backtrack::{self, BoundedBacktracker},
    util::{captures::Captures, pool::Pool, syntax},
    Anchored, Input as ReInput,
};

use crate::matcher::{Context, Flags, EMPTY};

use super::{Engine, Group, Method};

pub use regex_automata::nfa::thompson::BuildError;

type Cache = backtrack::Cache;
type CachePool = Pool<Cache, Box<dyn Fn() -> Cache + Send + Sync>>;

/// A compiled backtracking pattern. Cheap to clone; the compiled engine
/// is shared.
#[derive(Clone)]
pub struct Pattern {
    re: Arc<BoundedBacktracker>,
}

#[bon]
impl Pattern {
    /// Compiles `pattern` with the default configuration.
    pub fn new(pattern: &str) -> Result<Pattern, BuildError> {
        Pattern::builder().build(pattern)
    }

    /// Compiles several patterns; matches report the pattern's accept
    /// index (its position plus one).
    pub fn new_many(patterns: &[&str]) -> Result<Pattern, BuildError> {
        BoundedBacktracker::builder()
            .configure(Pattern::config())
            .build_many(patterns)
            .map(|re| Pattern { re: Arc::new(re) })
    }

    fn config() -> backtrack::Config {
        // Generous visit budget: the streaming adapter re-searches whole
        // buffers, which are usually much longer than a typical haystack.
        backtrack::Config::new().visited_capacity(1 << 24)
    }

    /// Returns a builder for configuring the compilation, in particular
    /// the syntax options.
    #[builder(start_fn = builder, finish_fn = build)]
    pub fn compile(
        #[builder(finish_fn)] pattern: &str,
        syntax: Option<syntax::Config>,
        visited_capacity: Option<usize>,
    ) -> Result<Pattern, BuildError> {
        let mut config = Pattern::config();
        if let Some(capacity) = visited_capacity {
            config = config.visited_capacity(capacity);
        }
        BoundedBacktracker::builder()
            .syntax(syntax.unwrap_or_else(syntax::Config::new))
            .configure(config)
            .build(pattern)
            .map(|re| Pattern { re: Arc::new(re) })
    }
}

/// Adapter engine over a backtracking [`Pattern`].
pub struct BtEngine {
    pattern: Pattern,
    pool: CachePool,
    caps: Captures,
    /// Buffer-offset spans of the last match's groups.
    groups: Vec<Option<Group>>,
    /// Names of the matched pattern's groups, index-aligned.
    names: Vec<Option<String>>,
    /// Ordered group traversal cursor.
    cursor: usize,
}

impl crate::private::Sealed for BtEngine {}

impl Clone for BtEngine {
    fn clone(&self) -> Self {
        // A clone gets a fresh cache pool, like cloning the underlying
        // regex types does.
        BtEngine::from_pattern(self.pattern.clone())
    }
}

impl BtEngine {
    /// One backtracker pass over the currently buffered octets. An
    /// associated function so a pool guard can stay live at the call site.
    fn try_once(
        re: &BoundedBacktracker,
        caps: &mut Captures,
        ctx: &Context<'_>,
        cache: &mut Cache,
        anchored: Anchored,
        from: usize,
    ) -> Option<regex_automata::Match> {
        let input = ReInput::new(ctx.buf.octets())
            .range(from..ctx.buf.end)
            .anchored(anchored);
        match re.try_captures(cache, input, caps) {
            Ok(()) => caps.get_match(),
            // A search error (visit budget exhausted) reports no match.
            Err(_) => None,
        }
    }

    /// True once more input cannot change the outcome.
    fn settled(ctx: &Context<'_>, m: &Option<regex_automata::Match>) -> bool {
        ctx.buf.eof || m.as_ref().is_some_and(|m| m.end() < ctx.buf.end)
    }

    /// Snapshots the capture spans and names of a finished match.
    fn snapshot(&mut self, m: &regex_automata::Match) {
        self.groups = self
            .caps
            .iter()
            .map(|span| span.map(|s| Group { start: s.start, end: s.end }))
            .collect();
        let info = self.pattern.re.get_nfa().group_info();
        self.names = info
            .pattern_names(m.pattern())
            .map(|name| name.map(String::from))
            .collect();
        self.cursor = 0;
    }

    fn clear_snapshot(&mut self) {
        self.groups.clear();
        self.names.clear();
        self.cursor = 0;
    }

    fn accept(&mut self, ctx: &mut Context<'_>, m: &regex_automata::Match) -> usize {
        self.snapshot(m);
        ctx.buf.txt = m.start();
        ctx.buf.cur = m.end();
        ctx.take(m.pattern().as_usize() + 1)
    }

    fn fail(&mut self, ctx: &mut Context<'_>) -> usize {
        self.clear_snapshot();
        ctx.miss()
    }

    /// Anchored scan; with `full`, the entire remaining input must match.
    fn run_anchored(&mut self, ctx: &mut Context<'_>, full: bool) -> usize {
        ctx.begin();
        if full {
            // A full match needs the whole input on hand anyway.
            while ctx.fill() > 0 {}
        }
        let mut cache = self.pool.get();
        loop {
            let m = Self::try_once(
                &self.pattern.re,
                &mut self.caps,
                ctx,
                &mut cache,
                Anchored::Yes,
                ctx.buf.cur,
            );
            if Self::settled(ctx, &m) {
                drop(cache);
                let Some(m) = m else { return self.fail(ctx) };
                if m.is_empty() && !ctx.opt.has(Flags::NULLABLE) {
                    return self.fail(ctx);
                }
                if full && !(ctx.buf.eof && m.end() == ctx.buf.end) {
                    return self.fail(ctx);
                }
                return self.accept(ctx, &m);
            }
            ctx.fill();
        }
    }

    fn find(&mut self, ctx: &mut Context<'_>) -> usize {
        ctx.begin();
        let mut cache = self.pool.get();
        let mut from = ctx.buf.cur;
        loop {
            let m = Self::try_once(
                &self.pattern.re,
                &mut self.caps,
                ctx,
                &mut cache,
                Anchored::No,
                from,
            );
            if Self::settled(ctx, &m) {
                match m {
                    Some(m) if self.rejected(ctx, &m) => {
                        // Restart one code unit past the rejected start.
                        if m.start() >= ctx.buf.end {
                            drop(cache);
                            return self.fail(ctx);
                        }
                        from = (m.start() + utf8::lead_len(ctx.buf.byte(m.start())))
                            .min(ctx.buf.end);
                    }
                    Some(m) => {
                        drop(cache);
                        let cap = self.accept(ctx, &m);
                        if ctx.opt.has(Flags::NEWLINE) {
                            ctx.extend_newline();
                        }
                        return cap;
                    }
                    None => {
                        drop(cache);
                        return self.fail(ctx);
                    }
                }
            } else {
                let before = ctx.buf.num;
                ctx.fill();
                // A shift rebases the restart offset with everything else.
                from -= ctx.buf.num - before;
            }
        }
    }

    /// Empty matches without option `N`, and off-boundary matches under
    /// option `W`, are skipped rather than reported.
    fn rejected(&self, ctx: &Context<'_>, m: &regex_automata::Match) -> bool {
        if m.is_empty() && !ctx.opt.has(Flags::NULLABLE) {
            return true;
        }
        if ctx.opt.has(Flags::WORDS) {
            let left = !ctx.before(m.start()).is_some_and(Context::is_word);
            let right = !(m.end() < ctx.buf.end && Context::is_word(ctx.buf.byte(m.end())));
            return !(left && right);
        }
        false
    }

    fn split(&mut self, ctx: &mut Context<'_>) -> usize {
        if ctx.fin {
            return self.fail(ctx);
        }
        ctx.begin();
        let mut cache = self.pool.get();
        let mut from = ctx.buf.cur;
        loop {
            let m = Self::try_once(
                &self.pattern.re,
                &mut self.caps,
                ctx,
                &mut cache,
                Anchored::No,
                from,
            );
            if Self::settled(ctx, &m) {
                match m {
                    Some(m) if !m.is_empty() => {
                        drop(cache);
                        self.snapshot(&m);
                        ctx.len = m.start() - ctx.buf.txt;
                        ctx.absorb_kept();
                        ctx.buf.cur = m.end();
                        ctx.buf.pos = m.end();
                        ctx.cap = m.pattern().as_usize() + 1;
                        return ctx.cap;
                    }
                    Some(m) if m.start() < ctx.buf.end => {
                        // Empty delimiter: probe further.
                        from = (m.start() + utf8::lead_len(ctx.buf.byte(m.start())))
                            .min(ctx.buf.end);
                    }
                    _ => {
                        drop(cache);
                        self.clear_snapshot();
                        ctx.buf.cur = ctx.buf.end;
                        ctx.buf.pos = ctx.buf.end;
                        ctx.len = ctx.buf.end - ctx.buf.txt;
                        ctx.absorb_kept();
                        ctx.cap = EMPTY;
                        ctx.fin = true;
                        return EMPTY;
                    }
                }
            } else {
                let before = ctx.buf.num;
                ctx.fill();
                from -= ctx.buf.num - before;
            }
        }
    }
}

impl Engine for BtEngine {
    type Pattern = Pattern;

    fn from_pattern(pattern: Pattern) -> Self {
        let re = pattern.re.clone();
        let caps = pattern.re.create_captures();
        BtEngine {
            pattern,
            pool: Pool::new(Box::new(move || re.create_cache())),
            caps,
            groups: Vec::new(),
            names: Vec::new(),
            cursor: 0,
        }
    }

    fn set_pattern(&mut self, pattern: Pattern) {
        *self = BtEngine::from_pattern(pattern);
    }

    fn reset(&mut self) {
        self.clear_snapshot();
    }

    fn search(&mut self, ctx: &mut Context<'_>, method: Method) -> usize {
        match method {
            Method::Scan => self.run_anchored(ctx, false),
            Method::Find => self.find(ctx),
            Method::Split => self.split(ctx),
            Method::Match => self.run_anchored(ctx, true),
        }
    }

    fn group(&self, ctx: &Context<'_>, index: usize) -> Option<Group> {
        if index == 0 && self.groups.is_empty() && ctx.cap != 0 {
            // Split yields runs without captures.
            return Some(Group {
                start: ctx.buf.txt,
                end: ctx.buf.txt + ctx.len,
            });
        }
        self.groups.get(index).copied().flatten()
    }

    fn group_id(&mut self) -> Option<(usize, Option<&str>)> {
        self.cursor = 1;
        self.advance_cursor()
    }

    fn group_next_id(&mut self) -> Option<(usize, Option<&str>)> {
        self.advance_cursor()
    }
}

impl BtEngine {
    fn advance_cursor(&mut self) -> Option<(usize, Option<&str>)> {
        while self.cursor < self.groups.len() {
            let index = self.cursor;
            self.cursor += 1;
            if self.groups[index].is_some() {
                return Some((index, self.names.get(index)?.as_deref()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{matcher::EMPTY, RegexMatcher};

    #[test]
    fn find_words_with_positions() {
        let p = Pattern::new(r"\w+").unwrap();
        let mut m = RegexMatcher::builder(p).input("abc 123\n").build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"abc");
        assert_eq!((m.lineno(), m.columno()), (1, 0));
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"123");
        assert_eq!((m.lineno(), m.columno()), (1, 4));
        assert_eq!(m.find(), 0);
    }

    #[test]
    fn refill_reissues_the_search() {
        // A match far beyond the first block, with the buffer forced to
        // shift repeatedly.
        let hay = "x".repeat(300) + " needle tail";
        let p = Pattern::new("needle").unwrap();
        let mut m = RegexMatcher::builder(p).input(hay.as_str()).block(7).build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.span(), 301..307);
        assert_eq!(m.find(), 0);
    }

    #[test]
    fn match_crossing_a_grow_boundary() {
        // One match longer than the initial allocation: the buffer must
        // grow and the result must equal the pre-filled case.
        let hay = format!("<{}>", "a".repeat(100));
        let p = Pattern::new("<a+>").unwrap();
        let mut m = RegexMatcher::builder(p).input(hay.as_str()).block(4).build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.size(), hay.len());
        assert_eq!(m.span(), 0..hay.len());
    }

    #[test]
    fn captures_and_group_traversal() {
        let p = Pattern::new(r"(?<key>\w+)=(?<val>\w+)").unwrap();
        let mut m = RegexMatcher::builder(p).input("best_year=1973;").build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.group(0), Some(&b"best_year=1973"[..]));
        assert_eq!(m.group(1), Some(&b"best_year"[..]));
        assert_eq!(m.group(2), Some(&b"1973"[..]));
        assert_eq!(m.group(3), None);
        assert_eq!(m.group_id(), Some((1, Some("key"))));
        assert_eq!(m.group_next_id(), Some((2, Some("val"))));
        assert_eq!(m.group_next_id(), None);
    }

    #[test]
    fn unmatched_groups_are_skipped() {
        let p = Pattern::new(r"(a)|(b)").unwrap();
        let mut m = RegexMatcher::builder(p).input("b").build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.group(1), None);
        assert_eq!(m.group(2), Some(&b"b"[..]));
        assert_eq!(m.group_id(), Some((2, None)));
        assert_eq!(m.group_next_id(), None);
    }

    #[test]
    fn scan_and_full_match() {
        let p = Pattern::new(r"[0-9]{4}").unwrap();
        let mut m = RegexMatcher::builder(p.clone()).input("2010-03").build();
        assert_eq!(m.scan(), 1);
        assert_eq!(m.text(), b"2010");
        assert_eq!(m.scan(), 0);

        let mut m = RegexMatcher::builder(p.clone()).input("2010").build();
        assert_eq!(m.matches(), 1);
        let mut m = RegexMatcher::builder(p).input("2010-").build();
        assert_eq!(m.matches(), 0);
    }

    #[test]
    fn split_runs() {
        let p = Pattern::new(",").unwrap();
        let mut m = RegexMatcher::builder(p).input("a,b,,c").build();
        let runs: Vec<_> = m
            .split_iter()
            .map(|m| (m.accept(), m.as_str().into_owned()))
            .collect();
        assert_eq!(
            runs,
            vec![
                (1, "a".into()),
                (1, "b".into()),
                (1, "".into()),
                (EMPTY, "c".into()),
            ]
        );
    }

    #[test]
    fn multi_pattern_accept_indices() {
        let p = Pattern::new_many(&[r"[0-9]+", r"[a-z]+"]).unwrap();
        let mut m = RegexMatcher::builder(p).input("abc 123").build();
        assert_eq!(m.find(), 2);
        assert_eq!(m.text(), b"abc");
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"123");
    }

    #[test]
    fn nullable_find_needs_option_n() {
        let p = Pattern::new("a*").unwrap();
        let mut m = RegexMatcher::builder(p.clone()).input("bba").build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"a");

        let mut m = RegexMatcher::builder(p).input("ba").options("N").build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.size(), 0);
        // Progress after the zero-width match.
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"a");
    }

    #[test]
    fn same_input_same_results() {
        let hay = "one two three";
        let collect = |block: usize| {
            let p = Pattern::new(r"\w+").unwrap();
            let mut m = RegexMatcher::builder(p).input(hay).block(block).build();
            m.find_iter()
                .map(|m| (m.accept(), m.range(), m.as_str().into_owned()))
                .collect::<Vec<_>>()
        };
        assert_eq!(collect(4096), collect(3));
    }
}
