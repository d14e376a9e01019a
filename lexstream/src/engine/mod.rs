//! The engine contract behind [`Matcher`](crate::matcher::Matcher).
//!
//! Every engine drives the same abstract state (the
//! [`Context`](crate::matcher::Context)) through the same four methods;
//! the matcher is generic over the engine, so each pairing monomorphizes.

use crate::matcher::Context;

pub mod bt;
pub mod dfa;
pub mod line;

/// The four match methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// Succeed only on a match starting exactly at the current position.
    Scan,
    /// Succeed on a match starting anywhere at or after the current
    /// position, skipping non-matching input.
    Find,
    /// Yield runs of non-matching input delimited by matches.
    Split,
    /// Succeed only when the entire remaining input matches.
    Match,
}

/// A capture-group span in buffer offsets, valid until the next match
/// operation that may refill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Group {
    pub start: usize,
    pub end: usize,
}

/// The capability set every engine provides. Sealed: the match loop
/// assumes engines uphold the refill/position contract documented on
/// [`Context`](crate::matcher::Context).
pub trait Engine: crate::private::Sealed + Clone {
    /// The compiled pattern this engine is driven by.
    type Pattern;

    fn from_pattern(pattern: Self::Pattern) -> Self;

    /// Replaces the pattern, discarding any cached iteration state.
    fn set_pattern(&mut self, pattern: Self::Pattern);

    /// Clears per-match state (captures, group traversal cursors).
    fn reset(&mut self);

    /// Runs one match method. Returns the accept index: 0 for no match,
    /// [`EMPTY`](crate::matcher::EMPTY) for a zero-width accept or the
    /// terminal split run, otherwise ≥ 1.
    fn search(&mut self, ctx: &mut Context<'_>, method: Method) -> usize;

    /// Capture group `index`; group 0 is the whole match.
    fn group(&self, ctx: &Context<'_>, index: usize) -> Option<Group>;

    /// Restarts ordered traversal of the matched groups; returns the first
    /// matched group index (> 0) and its name if any.
    fn group_id(&mut self) -> Option<(usize, Option<&str>)>;

    /// Continues the traversal started by [`group_id`](Engine::group_id).
    fn group_next_id(&mut self) -> Option<(usize, Option<&str>)>;
}
