/*!
A regular expression pattern compiler producing compact, byte-oriented
DFA programs.

This crate turns a regex source string into an array of fixed-width
32-bit opcodes for an external matcher runtime. The pipeline is a
recursive-descent parser that computes position sets in place (the
followpos construction, extended with laziness, greediness, anchors,
lookahead and bounded-repetition unrolling), a subset-construction DFA
builder with range-based character transitions, a compaction pass, and
an encoder. The compiler never executes matches itself.

```
use regex_fsm::Pattern;

let pattern = Pattern::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
assert!(pattern.reachable(1));
assert!(!pattern.opcodes().is_empty());
```

Options are given either as an option string or through
[`PatternBuilder`]:

```
use regex_fsm::PatternBuilder;

let pattern = PatternBuilder::new()
    .case_insensitive(true)
    .build("select|insert")
    .unwrap();
assert_eq!(pattern.size(), 2);
```

The opcode layout is documented on [`Opcode`]; meta characters, which
encode anchor and word-boundary conditions as pseudo-inputs above the
byte range, are the `META_*` constants.
*/

// #![deny(missing_docs)]

pub use crate::builder::PatternBuilder;
pub use crate::classes::{
    is_meta, Char, META_BOB, META_BOL, META_BWB, META_BWE, META_DED,
    META_EOB, META_EOL, META_EWB, META_EWE, META_IND, META_MAX, META_MIN,
    META_NWB, META_NWE,
};
pub use crate::encode::Opcode;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::pattern::Pattern;
pub use crate::position::{Index, Location, IMAX};

mod builder;
mod classes;
mod determinize;
mod dfa;
mod encode;
mod error;
mod export;
mod nfa;
mod pattern;
mod position;
mod ranges;
