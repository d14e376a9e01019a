/*!
A streaming regular-expression matching and lexical-scanning runtime.

A [`Matcher`](matcher::Matcher) consumes characters from an arbitrary
source (in-memory buffer, wide string, file or reader, in any of ~38
encodings transcoded to UTF-8 on the fly) and produces matches on demand
through four methods over a growable buffer that may be far smaller than
the input:

- **scan** — succeed only on a match starting exactly at the current position;
- **find** — search forward, skipping non-matching input;
- **split** — yield the runs of non-matching input between delimiters;
- **matches** — succeed only when the entire remaining input matches.

## Engines

Three engines drive the same matcher state and can be mixed freely:

- [`engine::dfa`] — a driver for precompiled DFA opcode tables (see
  [`pattern`]), with Boyer–Moore and predicted-match prefilters;
- [`engine::bt`] — a backtracking regex engine with capture groups,
  adapted from `regex-automata`'s `BoundedBacktracker`;
- [`engine::line`] — a trivial engine whose match is the next line.

## Usage

```
use lexstream::{engine::bt, RegexMatcher};

let pattern = bt::Pattern::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}").unwrap();
let hay = "What do 1865-04-14 and 1881-07-02 have in common?";
let mut matcher = RegexMatcher::builder(pattern).input(hay).build();
let dates: Vec<_> = matcher.find_iter().map(|m| m.as_str().into_owned()).collect();
assert_eq!(dates, ["1865-04-14", "1881-07-02"]);
```

Splitting, with the terminal run carrying the
[`EMPTY`](matcher::EMPTY) sentinel:

```
use lexstream::{engine::bt, RegexMatcher};

let pattern = bt::Pattern::new(r",\s*").unwrap();
let mut matcher = RegexMatcher::builder(pattern).input("a, b,c").build();
let runs: Vec<_> = matcher.split_iter().map(|m| m.as_str().into_owned()).collect();
assert_eq!(runs, ["a", "b", "c"]);
```

Inputs carry their encoding; everything is matched as UTF-8 octets:

```
use lexstream::{engine::bt, input::{Encoding, Input}, RegexMatcher};

let input = Input::builder(&b"caf\x82 au lait"[..])
    .encoding(Encoding::Cp437)
    .build();
let pattern = bt::Pattern::new(r"caf.").unwrap();
let mut matcher = RegexMatcher::builder(pattern).input(input).build();
assert_eq!(matcher.find(), 1);
assert_eq!(matcher.text_str(), "café");
```
*/
pub mod engine;
pub mod error;
pub mod input;
pub mod lexer;
pub mod matcher;
pub mod pattern;

pub use lexstream_encoding as encoding;

/// A matcher driven by a precompiled DFA opcode table.
pub type DfaMatcher<'a> = matcher::Matcher<'a, engine::dfa::DfaEngine>;

/// A matcher driven by the backtracking regex engine.
pub type RegexMatcher<'a> = matcher::Matcher<'a, engine::bt::BtEngine>;

/// A matcher whose pattern is "the next line".
pub type LineMatcher<'a> = matcher::Matcher<'a, engine::line::LineEngine>;

pub(crate) mod private {
    pub trait Sealed {}
}
