//! The DFA engine: drives a compiled opcode table over the buffer, with
//! Boyer–Moore / predicted-match prefilters on FIND.

use lexstream_encoding::utf8;

use crate::{
    matcher::{Context, Flags, EMPTY},
    pattern::{
        bm_find, predict_hash, Meta, Pattern, Prefilter, OP_ACCEPT, OP_HALT, OP_HEAD,
        OP_META, OP_RANGE, OP_REDO, OP_TAIL,
    },
};

use super::{Engine, Group, Method};

/// Drives a [`Pattern`]'s opcode table. Supports only capture 0 (the
/// whole match); use the [backtracking engine](super::bt) for groups.
#[derive(Clone)]
pub struct DfaEngine {
    pattern: Pattern,
}

impl crate::private::Sealed for DfaEngine {}

impl DfaEngine {
    /// Runs the DFA anchored at `cur`. On success `cur` is one past the
    /// last accepted octet and the accept index is in `ctx.cap`; on
    /// failure `cur` is untouched. `pos` may overrun `cur` (lookahead).
    fn run(&self, ctx: &mut Context<'_>) -> usize {
        ctx.buf.pos = ctx.buf.cur;
        ctx.cap = 0;
        ctx.lap.clear();
        let mut at = 0usize;
        'state: loop {
            let mut i = at;
            // The octet at `pos` is fetched once per state, on the first
            // consuming edge.
            let mut fetched: Option<Option<u8>> = None;
            loop {
                let (op, a, b, arg) = self.pattern.word(i);
                match op {
                    OP_HALT => break 'state,
                    OP_ACCEPT => {
                        ctx.cap = arg as usize;
                        ctx.buf.cur = ctx.buf.pos;
                    }
                    OP_REDO => {
                        ctx.cap = EMPTY;
                        ctx.buf.cur = ctx.buf.pos;
                    }
                    OP_HEAD => ctx.lap_set(arg as usize, ctx.buf.pos),
                    OP_TAIL => {
                        if let Some(head) = ctx.lap_get(arg as usize) {
                            ctx.buf.cur = head;
                        }
                    }
                    OP_META => {
                        if self.meta(ctx, Meta::from_u8(a)) {
                            at = arg as usize;
                            continue 'state;
                        }
                    }
                    OP_RANGE => {
                        let octet = match fetched {
                            Some(v) => v,
                            None => {
                                let v = ctx
                                    .ensure_pos()
                                    .then(|| ctx.buf.byte(ctx.buf.pos));
                                fetched = Some(v);
                                v
                            }
                        };
                        if let Some(c) = octet {
                            if a <= c && c <= b {
                                ctx.buf.pos += 1;
                                at = arg as usize;
                                continue 'state;
                            }
                        }
                    }
                    _ => debug_assert!(false, "bad opcode {op}"),
                }
                i += 2;
            }
        }
        if ctx.cap != 0 && ctx.cap != EMPTY && ctx.cap > self.pattern.accepts() {
            crate::error::pattern_mismatch(ctx.cap, self.pattern.accepts());
        }
        ctx.cap
    }

    fn meta(&self, ctx: &mut Context<'_>, predicate: Meta) -> bool {
        match predicate {
            Meta::Bob => ctx.at_bob(),
            Meta::Eob => ctx.at_eob(),
            Meta::Bol => ctx.at_bol(),
            Meta::Eol => ctx.at_eol(),
            Meta::Bwb | Meta::Bwe => ctx.at_word_begin(),
            Meta::Ewb | Meta::Ewe => ctx.at_word_end(),
            Meta::Nwb | Meta::Nwe => ctx.at_non_word_boundary(),
            Meta::Ind => ctx.indent(),
            Meta::Ded => ctx.dedent(),
            Meta::Und => ctx.undent(),
        }
    }

    fn scan(&self, ctx: &mut Context<'_>) -> usize {
        ctx.begin();
        let cap = self.run(ctx);
        if cap == 0 {
            return ctx.miss();
        }
        if ctx.buf.cur == ctx.buf.txt && !ctx.opt.has(Flags::NULLABLE) {
            return ctx.miss();
        }
        ctx.take(cap)
    }

    fn full_match(&self, ctx: &mut Context<'_>) -> usize {
        ctx.begin();
        let cap = self.run(ctx);
        ctx.buf.pos = ctx.buf.cur;
        if cap != 0 && !ctx.ensure_pos() {
            ctx.take(cap)
        } else {
            ctx.miss()
        }
    }

    fn find(&self, ctx: &mut Context<'_>) -> usize {
        ctx.begin();
        loop {
            if !self.advance_to_candidate(ctx) {
                return ctx.miss();
            }
            ctx.buf.txt = ctx.buf.cur;
            let cap = self.run(ctx);
            if cap != 0 {
                let empty = ctx.buf.cur == ctx.buf.txt;
                let rejected = (empty && !ctx.opt.has(Flags::NULLABLE))
                    || (ctx.opt.has(Flags::WORDS) && !self.whole_word(ctx));
                if !rejected {
                    ctx.take(cap);
                    if ctx.opt.has(Flags::NEWLINE) {
                        ctx.extend_newline();
                    }
                    return ctx.cap;
                }
            }
            // Failed (or rejected) attempt: restart one code unit further.
            ctx.buf.cur = ctx.buf.txt;
            ctx.buf.pos = ctx.buf.cur;
            let before = ctx.buf.cur;
            ctx.bump();
            if ctx.buf.cur == before && ctx.buf.eof {
                return ctx.miss();
            }
        }
    }

    fn split(&self, ctx: &mut Context<'_>) -> usize {
        if ctx.fin {
            return ctx.miss();
        }
        ctx.begin();
        loop {
            let probe_global = ctx.global(ctx.buf.cur);
            let cap = self.run(ctx);
            let probe = probe_global - ctx.buf.num;
            if cap != 0 && ctx.buf.cur != probe {
                // Delimiter matched: the yield is the run before it.
                ctx.cap = cap;
                ctx.len = probe - ctx.buf.txt;
                ctx.absorb_kept();
                ctx.buf.pos = ctx.buf.cur;
                return cap;
            }
            ctx.buf.cur = probe;
            ctx.buf.pos = probe;
            if !ctx.ensure_pos() {
                // Terminal run, delivered once with the sentinel accept.
                ctx.buf.cur = ctx.buf.end;
                ctx.buf.pos = ctx.buf.end;
                ctx.len = ctx.buf.end - ctx.buf.txt;
                ctx.absorb_kept();
                ctx.cap = EMPTY;
                ctx.fin = true;
                return EMPTY;
            }
            let step = utf8::lead_len(ctx.buf.byte(ctx.buf.cur));
            ctx.buf.cur = (ctx.buf.cur + step).min(ctx.buf.end);
            ctx.buf.pos = ctx.buf.cur;
        }
    }

    /// Whole-word postcondition for option `W`.
    fn whole_word(&self, ctx: &mut Context<'_>) -> bool {
        let left = !ctx
            .before(ctx.buf.txt)
            .is_some_and(Context::is_word);
        ctx.buf.pos = ctx.buf.cur;
        let right = !(ctx.ensure_pos() && Context::is_word(ctx.buf.byte(ctx.buf.pos)));
        left && right
    }

    /// Skips `cur` ahead to the next position a match could start at,
    /// using the pattern's prefilter. False when input is exhausted with
    /// no candidate left.
    fn advance_to_candidate(&self, ctx: &mut Context<'_>) -> bool {
        match *self.pattern.prefilter() {
            Prefilter::None => {
                if self.pattern.min_len() == 0 {
                    return true;
                }
                ctx.buf.pos = ctx.buf.cur;
                ctx.ensure_pos()
            }
            Prefilter::OneByte(octet) => loop {
                // Skipped text is dead: let a shift reclaim it.
                ctx.buf.txt = ctx.buf.cur;
                ctx.buf.pos = ctx.buf.cur;
                if !ctx.ensure_pos() {
                    return false;
                }
                let window = &ctx.buf.octets()[ctx.buf.cur..];
                match memchr::memchr(octet, window) {
                    Some(i) => {
                        ctx.buf.cur += i;
                        ctx.buf.pos = ctx.buf.cur;
                        return true;
                    }
                    None => {
                        ctx.buf.cur = ctx.buf.end;
                    }
                }
            },
            Prefilter::BoyerMoore => {
                let needle = self.pattern.prefix().to_vec();
                let skip = *self.pattern.bm_skip().expect("skip table with BM prefilter");
                loop {
                    ctx.buf.txt = ctx.buf.cur;
                    let have = ctx.window(needle.len());
                    if have < needle.len() {
                        return false;
                    }
                    let window = &ctx.buf.octets()[ctx.buf.cur..];
                    if let Some(i) = bm_find(window, &needle, &skip) {
                        ctx.buf.cur += i;
                        ctx.buf.pos = ctx.buf.cur;
                        return true;
                    }
                    if ctx.buf.eof {
                        return false;
                    }
                    // Keep the last m-1 octets: an occurrence may straddle
                    // the refill.
                    ctx.buf.cur = ctx.buf.end - (needle.len() - 1);
                    ctx.buf.pos = ctx.buf.cur;
                }
            }
            Prefilter::Predict => {
                let pmh = *self.pattern.pmh().expect("bloom with predict prefilter");
                let k = self.pattern.min_len().min(4);
                debug_assert!(k >= 1);
                loop {
                    ctx.buf.txt = ctx.buf.cur;
                    let have = ctx.window(k);
                    if have < k {
                        return false;
                    }
                    let window = &ctx.buf.octets()[ctx.buf.cur..];
                    let mut h = 0u8;
                    for &b in &window[..k] {
                        h = predict_hash(h, b);
                    }
                    if pmh[h as usize] & (1 << (k - 1)) != 0 {
                        ctx.buf.pos = ctx.buf.cur;
                        return true;
                    }
                    let mut shift = window.len().min(4);
                    for (j, &b) in window.iter().enumerate().take(4).skip(1) {
                        if pmh[predict_hash(0, b) as usize] & 1 != 0 {
                            shift = j;
                            break;
                        }
                    }
                    ctx.buf.cur += shift;
                    ctx.buf.pos = ctx.buf.cur;
                }
            }
        }
    }
}

impl Engine for DfaEngine {
    type Pattern = Pattern;

    fn from_pattern(pattern: Pattern) -> Self {
        DfaEngine { pattern }
    }

    fn set_pattern(&mut self, pattern: Pattern) {
        self.pattern = pattern;
    }

    fn reset(&mut self) {}

    fn search(&mut self, ctx: &mut Context<'_>, method: Method) -> usize {
        match method {
            Method::Scan => self.scan(ctx),
            Method::Find => self.find(ctx),
            Method::Split => self.split(ctx),
            Method::Match => self.full_match(ctx),
        }
    }

    fn group(&self, ctx: &Context<'_>, index: usize) -> Option<Group> {
        (index == 0 && ctx.cap != 0).then(|| Group {
            start: ctx.buf.txt,
            end: ctx.buf.txt + ctx.len,
        })
    }

    fn group_id(&mut self) -> Option<(usize, Option<&str>)> {
        None
    }

    fn group_next_id(&mut self) -> Option<(usize, Option<&str>)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        matcher::EMPTY,
        pattern::{Meta, Pattern},
        DfaMatcher,
    };

    /// `\w+` as a hand-assembled DFA.
    fn word_pattern() -> Pattern {
        let mut b = Pattern::builder();
        let s0 = b.state();
        let s1 = b.state();
        for state in [s0, s1] {
            b.range(state, b'0', b'9', s1);
            b.range(state, b'A', b'Z', s1);
            b.byte(state, b'_', s1);
            b.range(state, b'a', b'z', s1);
        }
        b.accept(s1, 1);
        b.build().unwrap()
    }

    /// `,` as a DFA.
    fn comma_pattern() -> Pattern {
        let mut b = Pattern::builder();
        let s0 = b.state();
        let s1 = b.state();
        b.byte(s0, b',', s1);
        b.accept(s1, 1);
        b.build().unwrap()
    }

    #[test]
    fn find_words_with_positions() {
        let mut m = DfaMatcher::builder(word_pattern()).input("abc 123\n").build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"abc");
        assert_eq!((m.lineno(), m.columno()), (1, 0));
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"123");
        assert_eq!((m.lineno(), m.columno()), (1, 4));
        assert_eq!(m.find(), 0);
    }

    #[test]
    fn find_across_tiny_blocks() {
        // Matches crossing every shift/grow boundary must be identical to
        // the pre-filled case.
        let mut m = DfaMatcher::builder(word_pattern())
            .input("alpha beta gamma delta")
            .block(3)
            .build();
        let words: Vec<_> = m.find_iter().map(|m| m.as_str().into_owned()).collect();
        assert_eq!(words, ["alpha", "beta", "gamma", "delta"]);
    }

    #[test]
    fn scan_is_anchored() {
        let mut m = DfaMatcher::builder(word_pattern()).input(" abc").build();
        assert_eq!(m.scan(), 0);
        let mut m = DfaMatcher::builder(word_pattern()).input("abc def").build();
        assert_eq!(m.scan(), 1);
        assert_eq!(m.text(), b"abc");
        // The space stops the next anchored scan.
        assert_eq!(m.scan(), 0);
    }

    #[test]
    fn split_on_comma() {
        let mut m = DfaMatcher::builder(comma_pattern()).input("a,b,,c").build();
        let mut runs = Vec::new();
        loop {
            let cap = m.split();
            if cap == 0 {
                break;
            }
            runs.push((cap, m.text_str().into_owned()));
        }
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
    fn split_accounts_for_every_octet() {
        let input = "one,two,,three,";
        let mut m = DfaMatcher::builder(comma_pattern()).input(input).build();
        let mut total = 0;
        let mut delims = 0;
        loop {
            let cap = m.split();
            if cap == 0 {
                break;
            }
            total += m.size();
            if cap != EMPTY {
                delims += 1;
            }
        }
        assert_eq!(total + delims, input.len());
    }

    #[test]
    fn full_match_requires_everything() {
        let mut m = DfaMatcher::builder(word_pattern()).input("abc").build();
        assert_eq!(m.matches(), 1);
        let mut m = DfaMatcher::builder(word_pattern()).input("abc ").build();
        assert_eq!(m.matches(), 0);
        let mut m = DfaMatcher::builder(word_pattern()).input("").build();
        assert_eq!(m.matches(), 0);
    }

    #[test]
    fn empty_input_yields_no_match() {
        let mut m = DfaMatcher::builder(word_pattern()).input("").build();
        assert_eq!(m.scan(), 0);
        let mut m = DfaMatcher::builder(word_pattern()).input("").build();
        assert_eq!(m.find(), 0);
        let mut m = DfaMatcher::builder(comma_pattern()).input("").build();
        assert_eq!(m.split(), EMPTY);
        assert_eq!(m.text(), b"");
        assert_eq!(m.split(), 0);
    }

    fn literal(pat: &[u8]) -> Pattern {
        let mut b = Pattern::builder();
        let mut from = b.state();
        for &octet in pat {
            let to = b.state();
            b.byte(from, octet, to);
            from = to;
        }
        b.accept(from, 1);
        b.build().unwrap()
    }

    #[test]
    fn literal_prefix_prefilter_find() {
        // A common literal selects the 4-gram filter.
        let p = literal(b"needle");
        assert_eq!(p.prefix(), b"needle");
        let mut m = DfaMatcher::builder(p)
            .input("a haystack with a needle inside")
            .block(4)
            .build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"needle");
        assert_eq!(m.span(), 18..24);
        assert_eq!(m.find(), 0);
    }

    #[test]
    fn boyer_moore_prefilter_find() {
        use crate::pattern::Prefilter;
        // A rare literal selects Boyer–Moore.
        let p = literal(b"@#$%^&");
        assert_eq!(*p.prefilter(), Prefilter::BoyerMoore);
        let mut m = DfaMatcher::builder(p)
            .input("noise, then @#$%^& and a tail")
            .block(4)
            .build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.span(), 12..18);
        assert_eq!(m.find(), 0);
    }

    #[test]
    fn bol_and_eol_anchors() {
        // `^x$` spelled with metas.
        let mut b = Pattern::builder();
        let s0 = b.state();
        let s1 = b.state();
        let s2 = b.state();
        let s3 = b.state();
        b.meta(s0, Meta::Bol, s1);
        b.byte(s1, b'x', s2);
        b.meta(s2, Meta::Eol, s3);
        b.accept(s3, 1);
        let p = b.build().unwrap();
        let mut m = DfaMatcher::builder(p).input("ax\nx\nxa\n").build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.lineno(), 2);
        assert_eq!(m.find(), 0);
    }

    #[test]
    fn word_boundary_option() {
        let mut m = DfaMatcher::builder(word_pattern()).input("foo bar").options("W").build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"foo");
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"bar");
        assert_eq!(m.find(), 0);
    }

    #[test]
    fn newline_option_extends_find() {
        // `.*` (dot-not-newline): any octet but \n, one or more… spelled
        // as zero-or-more via an accepting start state is nullable, so
        // spell one-or-more and option A appends the newline.
        let mut b = Pattern::builder();
        let s0 = b.state();
        let s1 = b.state();
        for state in [s0, s1] {
            b.range(state, 0x00, 0x09, s1);
            b.range(state, 0x0B, 0xFF, s1);
        }
        b.accept(s1, 1);
        let p = b.build().unwrap();
        let mut m = DfaMatcher::builder(p).input("x\ny").options("A").build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"x\n");
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"y");
        assert_eq!(m.find(), 0);
    }

    #[test]
    fn lookahead_rewinds_cur() {
        // `ab(?=c)`: match "ab" only when "c" follows.
        let mut b = Pattern::builder();
        let s0 = b.state();
        let s1 = b.state();
        let s2 = b.state();
        let s3 = b.state();
        let s4 = b.state();
        b.byte(s0, b'a', s1);
        b.byte(s1, b'b', s2);
        b.head(s2, 0);
        b.byte(s2, b'c', s3);
        b.meta(s3, Meta::Und, s4); // unconditional hop to the accept state
        b.accept(s4, 1);
        b.tail(s4, 0);
        let p = b.build().unwrap();
        let mut m = DfaMatcher::builder(p).input("abd abc").build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.text(), b"ab");
        assert_eq!(m.span(), 4..6);
    }

    /// Line-start indentation pattern: `^[ ]*` guarded by an indent or
    /// dedent predicate.
    fn indent_pattern() -> Pattern {
        let mut b = Pattern::builder();
        let s0 = b.state();
        let ls = b.state();
        let sp = b.state();
        let ind = b.state();
        let ded = b.state();
        b.meta(s0, Meta::Bol, ls);
        b.byte(ls, b' ', sp);
        b.byte(sp, b' ', sp);
        for state in [ls, sp] {
            b.meta(state, Meta::Ind, ind);
            b.meta(state, Meta::Ded, ded);
        }
        b.accept(ind, 1);
        b.accept(ded, 2);
        b.build().unwrap()
    }

    #[test]
    fn indent_stops_evolve() {
        let mut m = DfaMatcher::builder(indent_pattern())
            .input("a\n  b\n    c\n")
            .options("T=4")
            .build();
        assert_eq!(m.stops(), &[] as &[usize]);
        assert_eq!(m.find(), 1);
        assert_eq!(m.stops(), &[2]);
        assert_eq!(m.find(), 1);
        assert_eq!(m.stops(), &[2, 4]);
    }

    #[test]
    fn dedents_emitted_per_stop() {
        // Indent twice, then dedent back to the margin; option N lets the
        // zero-width dedent token through.
        let mut m = DfaMatcher::builder(indent_pattern())
            .input("  a\nb\n")
            .options("NT=4")
            .build();
        assert_eq!(m.find(), 1);
        assert_eq!(m.stops(), &[2]);
        assert_eq!(m.find(), 2);
        assert_eq!(m.size(), 0);
        assert_eq!(m.lineno(), 2);
        assert_eq!(m.stops(), &[] as &[usize]);
    }
}
