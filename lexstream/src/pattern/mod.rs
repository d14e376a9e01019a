/*!
Compiled patterns consumed by the [DFA engine](crate::engine::dfa).

A [`Pattern`] is a flat array of 32-bit opcode words plus an accept
table, produced by an external pattern compiler or assembled by hand with
[`Pattern::builder`] (in the spirit of hand-assembling an NFA when no
parser is wanted). The engine treats the words as opaque state cursors;
the layout is fixed here:

Every instruction is a pair of words. The head word packs the operation
and two octet arguments, the second word is the operand:

```text
head = op << 24 | a << 16 | b << 8
```

| op | a | b | operand |
|---|---|---|---|
| `HALT` | — | — | — (ends a state's word list) |
| `RANGE` | low octet | high octet | target word index |
| `META` | predicate | — | target word index |
| `ACCEPT` | — | — | accept index ≥ 1 |
| `REDO` | — | — | — (zero-width accept) |
| `HEAD` | — | — | lookahead number |
| `TAIL` | — | — | lookahead number |

A state is a contiguous run of instructions ending in `HALT`; `ACCEPT`,
`REDO`, `HEAD` and `TAIL` execute when the cursor enters the state,
`META` edges transfer without consuming, `RANGE` edges consume one octet.
The start state is at word index 0.
*/

use std::{fmt, sync::Arc};

use itertools::Itertools;

mod prefilter;

pub(crate) use prefilter::{bm_find, predict_hash};
pub use prefilter::Prefilter;

pub(crate) const OP_HALT: u8 = 0;
pub(crate) const OP_RANGE: u8 = 1;
pub(crate) const OP_META: u8 = 2;
pub(crate) const OP_ACCEPT: u8 = 3;
pub(crate) const OP_REDO: u8 = 4;
pub(crate) const OP_HEAD: u8 = 5;
pub(crate) const OP_TAIL: u8 = 6;

/// Meta predicates evaluated at the read position without consuming.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Meta {
    /// Beginning of input.
    Bob = 0,
    /// End of input.
    Eob = 1,
    /// Beginning of a line (after `\n` or at the beginning of input).
    Bol = 2,
    /// End of a line (before `\n` or at the end of input).
    Eol = 3,
    /// A word begins here (anchoring the match begin).
    Bwb = 4,
    /// A word ends here (anchoring the match begin).
    Ewb = 5,
    /// A word begins here (anchoring the match end).
    Bwe = 6,
    /// A word ends here (anchoring the match end).
    Ewe = 7,
    /// Not at a word boundary (match begin).
    Nwb = 8,
    /// Not at a word boundary (match end).
    Nwe = 9,
    /// Indent: the column exceeds the top indent stop.
    Ind = 10,
    /// Dedent: the column is below the top indent stop.
    Ded = 11,
    /// Undent: clear indent bookkeeping.
    Und = 12,
}

impl Meta {
    pub(crate) fn from_u8(value: u8) -> Meta {
        match value {
            0 => Meta::Bob,
            1 => Meta::Eob,
            2 => Meta::Bol,
            3 => Meta::Eol,
            4 => Meta::Bwb,
            5 => Meta::Ewb,
            6 => Meta::Bwe,
            7 => Meta::Ewe,
            8 => Meta::Nwb,
            9 => Meta::Nwe,
            10 => Meta::Ind,
            11 => Meta::Ded,
            _ => Meta::Und,
        }
    }
}

/// Identifies a state while assembling; resolved to a word index at
/// [`Builder::build`] time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateId(usize);

#[derive(Clone, Debug)]
enum Edge {
    Accept(u32),
    Redo,
    Head(u32),
    Tail(u32),
    Range(u8, u8, StateId),
    Meta(Meta, StateId),
}

/// Pattern assembly error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// The pattern has no states.
    Empty,
    /// A transition names a state that was never created.
    UnknownState(usize),
    /// A byte range with `low > high`.
    BadRange(u8, u8),
    /// Accept indices start at 1.
    BadAccept,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Empty => write!(f, "pattern has no states"),
            BuildError::UnknownState(s) => write!(f, "transition to unknown state {s}"),
            BuildError::BadRange(lo, hi) => {
                write!(f, "byte range {lo:#04x}-{hi:#04x} is inverted")
            }
            BuildError::BadAccept => write!(f, "accept index 0 is reserved for no-match"),
        }
    }
}

impl std::error::Error for BuildError {}

/// A compiled pattern: opcode words, the accept table, and the prefilter
/// artifacts derived by analysis. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Pattern {
    ops: Arc<[u32]>,
    /// Accept index (1-based) to rule number.
    rules: Arc<[usize]>,
    /// Literal prefix shared by every match, when one exists.
    prefix: Arc<[u8]>,
    /// Boyer–Moore skip table over the prefix.
    bm_skip: Option<Arc<[u8; 256]>>,
    /// Packed 4-gram bloom: bit `k-1` of `pmh[h]` is set when some path of
    /// `k` octets from the start state hashes to `h`.
    pmh: Option<Arc<[u8; 256]>>,
    /// Minimum accepting path length in octets (capped at 8).
    min_len: usize,
    prefilter: Prefilter,
}

impl Pattern {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Wraps externally compiled opcode words and an accept table,
    /// optionally with a precomputed literal prefix and skip table, then
    /// runs the prefilter analysis for whatever was not supplied.
    pub fn from_parts(
        ops: Vec<u32>,
        rules: Vec<usize>,
        prefix: Option<Vec<u8>>,
        bm_skip: Option<[u8; 256]>,
        pmh: Option<[u8; 256]>,
    ) -> Pattern {
        let ops: Arc<[u32]> = ops.into();
        let prefix: Arc<[u8]> = prefix
            .unwrap_or_else(|| prefilter::literal_prefix(&ops))
            .into();
        let min_len = prefilter::min_accept_len(&ops);
        let bm_skip = bm_skip
            .map(Arc::new)
            .or_else(|| prefilter::bm_table(&prefix).map(Arc::new));
        let pmh = pmh
            .map(Arc::new)
            .or_else(|| prefilter::predict_table(&ops).map(Arc::new));
        let prefilter =
            prefilter::select(&prefix, bm_skip.is_some(), pmh.is_some(), min_len);
        #[cfg(feature = "logging")]
        log::trace!("pattern prefilter: {prefilter:?}, min_len {min_len}");
        Pattern {
            ops,
            rules: rules.into(),
            prefix,
            bm_skip,
            pmh,
            min_len,
            prefilter,
        }
    }

    #[cfg_attr(feature = "perf-inline", inline(always))]
    pub(crate) fn word(&self, at: usize) -> (u8, u8, u8, u32) {
        let head = self.ops[at];
        (
            (head >> 24) as u8,
            (head >> 16) as u8,
            (head >> 8) as u8,
            self.ops[at + 1],
        )
    }

    /// The raw opcode words, as a compiler produced them.
    pub fn words(&self) -> &[u32] {
        &self.ops
    }

    pub(crate) fn prefilter(&self) -> &Prefilter {
        &self.prefilter
    }

    pub(crate) fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub(crate) fn bm_skip(&self) -> Option<&[u8; 256]> {
        self.bm_skip.as_deref()
    }

    pub(crate) fn pmh(&self) -> Option<&[u8; 256]> {
        self.pmh.as_deref()
    }

    pub(crate) fn min_len(&self) -> usize {
        self.min_len
    }

    /// Number of accept indices.
    pub fn accepts(&self) -> usize {
        self.rules.len()
    }

    /// Maps an accept index to its rule number.
    pub fn rule_of(&self, accept: usize) -> Option<usize> {
        self.rules.get(accept.checked_sub(1)?).copied()
    }
}

/// Hand-assembler for [`Pattern`] tables.
///
/// ```
/// use lexstream::pattern::Pattern;
///
/// // A DFA for `[0-9]+`.
/// let mut b = Pattern::builder();
/// let s0 = b.state();
/// let s1 = b.state();
/// b.range(s0, b'0', b'9', s1);
/// b.range(s1, b'0', b'9', s1);
/// b.accept(s1, 1);
/// let pattern = b.build().unwrap();
/// assert_eq!(pattern.accepts(), 1);
/// ```
#[derive(Default)]
pub struct Builder {
    states: Vec<Vec<Edge>>,
    rules: Vec<(u32, usize)>,
}

impl Builder {
    /// Creates a state; the first one is the start state.
    pub fn state(&mut self) -> StateId {
        self.states.push(Vec::new());
        StateId(self.states.len() - 1)
    }

    /// Adds a consuming transition on `low..=high`.
    pub fn range(&mut self, from: StateId, low: u8, high: u8, to: StateId) -> &mut Self {
        self.states[from.0].push(Edge::Range(low, high, to));
        self
    }

    /// Adds a consuming transition on one octet.
    pub fn byte(&mut self, from: StateId, octet: u8, to: StateId) -> &mut Self {
        self.range(from, octet, octet, to)
    }

    /// Adds a non-consuming transition guarded by a meta predicate.
    pub fn meta(&mut self, from: StateId, predicate: Meta, to: StateId) -> &mut Self {
        self.states[from.0].push(Edge::Meta(predicate, to));
        self
    }

    /// Marks `state` accepting with `accept` (≥ 1).
    pub fn accept(&mut self, state: StateId, accept: u32) -> &mut Self {
        self.states[state.0].push(Edge::Accept(accept));
        self
    }

    /// Marks `state` as a zero-width accept (lookbehind tail).
    pub fn redo(&mut self, state: StateId) -> &mut Self {
        self.states[state.0].push(Edge::Redo);
        self
    }

    /// Stashes the read position in lookahead slot `lookahead`.
    pub fn head(&mut self, state: StateId, lookahead: u32) -> &mut Self {
        self.states[state.0].push(Edge::Head(lookahead));
        self
    }

    /// Rewinds the accept end to lookahead slot `lookahead`.
    pub fn tail(&mut self, state: StateId, lookahead: u32) -> &mut Self {
        self.states[state.0].push(Edge::Tail(lookahead));
        self
    }

    /// Maps `accept` to a rule number other than itself.
    pub fn rule(&mut self, accept: u32, rule: usize) -> &mut Self {
        self.rules.push((accept, rule));
        self
    }

    /// Assembles the opcode words and runs the prefilter analysis.
    pub fn build(&self) -> Result<Pattern, BuildError> {
        if self.states.is_empty() {
            return Err(BuildError::Empty);
        }
        // Normalize each state first: entry operations (accepts, redo,
        // lookahead marks) run on state entry and precede the transitions;
        // adjacent same-target ranges collapse into one instruction.
        let states = self
            .states
            .iter()
            .map(|edges| {
                let (entries, transitions): (Vec<_>, Vec<_>) =
                    edges.iter().cloned().partition(|e| {
                        matches!(
                            e,
                            Edge::Accept(_) | Edge::Redo | Edge::Head(_) | Edge::Tail(_)
                        )
                    });
                entries
                    .into_iter()
                    .chain(transitions.into_iter().coalesce(|a, b| match (&a, &b) {
                        (Edge::Range(alo, ahi, at_), Edge::Range(blo, bhi, bt))
                            if at_ == bt && *ahi < 0xFF && ahi + 1 == *blo =>
                        {
                            Ok(Edge::Range(*alo, *bhi, *at_))
                        }
                        _ => Err((a, b)),
                    }))
                    .collect_vec()
            })
            .collect_vec();
        // Lay out the states: each costs 2 words per instruction plus HALT.
        let mut offsets = Vec::with_capacity(states.len());
        let mut at = 0usize;
        for edges in &states {
            offsets.push(at);
            at += 2 * (edges.len() + 1);
        }
        let mut ops = Vec::with_capacity(at);
        let mut max_accept = 0u32;
        for edges in &states {
            for edge in edges.iter().cloned() {
                match edge {
                    Edge::Accept(accept) => {
                        if accept == 0 {
                            return Err(BuildError::BadAccept);
                        }
                        max_accept = max_accept.max(accept);
                        ops.push(head(OP_ACCEPT, 0, 0));
                        ops.push(accept);
                    }
                    Edge::Redo => {
                        ops.push(head(OP_REDO, 0, 0));
                        ops.push(0);
                    }
                    Edge::Head(la) => {
                        ops.push(head(OP_HEAD, 0, 0));
                        ops.push(la);
                    }
                    Edge::Tail(la) => {
                        ops.push(head(OP_TAIL, 0, 0));
                        ops.push(la);
                    }
                    Edge::Range(lo, hi, to) => {
                        if lo > hi {
                            return Err(BuildError::BadRange(lo, hi));
                        }
                        let target = *offsets
                            .get(to.0)
                            .ok_or(BuildError::UnknownState(to.0))?;
                        ops.push(head(OP_RANGE, lo, hi));
                        ops.push(target as u32);
                    }
                    Edge::Meta(predicate, to) => {
                        let target = *offsets
                            .get(to.0)
                            .ok_or(BuildError::UnknownState(to.0))?;
                        ops.push(head(OP_META, predicate as u8, 0));
                        ops.push(target as u32);
                    }
                }
            }
            ops.push(head(OP_HALT, 0, 0));
            ops.push(0);
        }
        let mut rules: Vec<usize> = (1..=max_accept as usize).collect();
        for &(accept, rule) in &self.rules {
            if accept == 0 || accept > max_accept {
                return Err(BuildError::BadAccept);
            }
            rules[accept as usize - 1] = rule;
        }
        Ok(Pattern::from_parts(ops, rules, None, None, None))
    }
}

#[inline]
fn head(op: u8, a: u8, b: u8) -> u32 {
    (op as u32) << 24 | (a as u32) << 16 | (b as u32) << 8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `\w+` as a hand-assembled DFA.
    pub(crate) fn word_pattern() -> Pattern {
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

    #[test]
    fn assembles_word_pattern() {
        let p = word_pattern();
        assert_eq!(p.accepts(), 1);
        assert_eq!(p.rule_of(1), Some(1));
        assert_eq!(p.rule_of(2), None);
        // No literal prefix for a class-headed pattern.
        assert!(p.prefix().is_empty());
        assert_eq!(p.min_len(), 1);
    }

    #[test]
    fn literal_prefix_extraction() {
        let mut b = Pattern::builder();
        let s0 = b.state();
        let s1 = b.state();
        let s2 = b.state();
        let s3 = b.state();
        b.byte(s0, b'f', s1);
        b.byte(s1, b'o', s2);
        b.byte(s2, b'o', s3);
        b.range(s3, b'0', b'9', s3);
        b.accept(s3, 1);
        let p = b.build().unwrap();
        assert_eq!(p.prefix(), b"foo");
        assert!(p.bm_skip().is_some());
        assert_eq!(p.min_len(), 3);
    }

    #[test]
    fn ranges_coalesce() {
        let mut b = Pattern::builder();
        let s0 = b.state();
        let s1 = b.state();
        b.range(s0, b'a', b'm', s1);
        b.range(s0, b'n', b'z', s1);
        b.accept(s1, 1);
        let p = b.build().unwrap();
        // One RANGE, one HALT for s0; ACCEPT + HALT for s1: 4 pairs.
        assert_eq!(p.words().len(), 8);
    }

    #[test]
    fn rule_table() {
        let mut b = Pattern::builder();
        let s0 = b.state();
        let s1 = b.state();
        b.byte(s0, b'x', s1);
        b.accept(s1, 2);
        b.rule(2, 7);
        let p = b.build().unwrap();
        assert_eq!(p.rule_of(2), Some(7));
    }

    #[test]
    fn build_errors() {
        let b = Pattern::builder();
        assert_eq!(b.build().unwrap_err(), BuildError::Empty);

        let mut b = Pattern::builder();
        let s0 = b.state();
        b.range(s0, b'z', b'a', s0);
        assert_eq!(b.build().unwrap_err(), BuildError::BadRange(b'z', b'a'));

        let mut b = Pattern::builder();
        let s0 = b.state();
        b.accept(s0, 0);
        assert_eq!(b.build().unwrap_err(), BuildError::BadAccept);
    }
}
