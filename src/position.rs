use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A byte offset into the pattern source.
pub type Location = u32;

/// The scalar used for rule indices, repetition-unrolling counts and
/// program counters.
pub type Index = u16;

/// Sentinel index meaning "no such state", "halt" or "overflow".
pub const IMAX: Index = 0xFFFF;

const LOC_BITS: u64 = 24;
const LOC_MASK: u64 = (1 << LOC_BITS) - 1;
const ITER_SHIFT: u64 = LOC_BITS;
const ITER_MASK: u64 = 0xFFFF << ITER_SHIFT;
const ACCEPT: u64 = 1 << 40;
const ANCHOR: u64 = 1 << 41;
const GREEDY: u64 = 1 << 42;
const TICKED: u64 = 1 << 43;
const LAZY_SHIFT: u64 = 48;
const LAZY_MASK: u64 = 0xFFFF << LAZY_SHIFT;

/// A position in the pattern source, decorated with the attribute bits the
/// compiler tracks per NFA leaf.
///
/// A position is a packed 64-bit word. From least to most significant:
/// the source offset (`loc`, 24 bits), the repetition-unrolling index
/// (`iter`, 16 bits), the `accept`, `anchor`, `greedy` and `ticked` flags,
/// and finally the lazy marker (16 bits, the offset of the `?` that made
/// this position lazy, or 0).
///
/// Two positions are equal only when every field agrees, so the same
/// source offset can occur several times in one set with different
/// decorations. The lazy marker deliberately occupies the topmost bits:
/// in any ordered set of positions the lazy members form a suffix, which
/// is what lets [`trim_lazy`] strip them with a single backward scan.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct Position(u64);

impl Position {
    /// The "no position" sentinel.
    pub const NPOS: Position = Position(u64::MAX);

    pub fn new(loc: Location) -> Position {
        Position(loc as u64 & LOC_MASK)
    }

    /// For accept positions the source offset field holds the rule index.
    pub fn rule(rule: Index) -> Position {
        Position(rule as u64)
    }

    pub fn loc(self) -> Location {
        (self.0 & LOC_MASK) as Location
    }

    /// The rule index of an accept position.
    pub fn accepts(self) -> Index {
        (self.0 & LOC_MASK) as Index
    }

    pub fn iters(self) -> Index {
        ((self.0 & ITER_MASK) >> ITER_SHIFT) as Index
    }

    pub fn lazy_loc(self) -> Location {
        ((self.0 & LAZY_MASK) >> LAZY_SHIFT) as Location
    }

    pub fn is_accept(self) -> bool {
        self.0 & ACCEPT != 0
    }

    pub fn is_anchor(self) -> bool {
        self.0 & ANCHOR != 0
    }

    pub fn is_greedy(self) -> bool {
        self.0 & GREEDY != 0
    }

    pub fn is_ticked(self) -> bool {
        self.0 & TICKED != 0
    }

    pub fn is_lazy(self) -> bool {
        self.0 & LAZY_MASK != 0
    }

    pub fn is_npos(self) -> bool {
        self == Position::NPOS
    }

    pub fn accept(self, yes: bool) -> Position {
        Position(if yes { self.0 | ACCEPT } else { self.0 & !ACCEPT })
    }

    pub fn anchor(self, yes: bool) -> Position {
        Position(if yes { self.0 | ANCHOR } else { self.0 & !ANCHOR })
    }

    pub fn greedy(self, yes: bool) -> Position {
        Position(if yes { self.0 | GREEDY } else { self.0 & !GREEDY })
    }

    pub fn ticked(self, yes: bool) -> Position {
        Position(if yes { self.0 | TICKED } else { self.0 & !TICKED })
    }

    pub fn lazy(self, loc: Location) -> Position {
        Position((self.0 & !LAZY_MASK) | ((loc as u64) << LAZY_SHIFT))
    }

    /// Advance the repetition-unrolling index by `n`. Advancing rather
    /// than overwriting lets nested bounded repetitions compose: the
    /// copies made by an outer `{n,m}` shift the copies an inner one
    /// already made.
    pub fn iter(self, n: Index) -> Position {
        Position(self.0 + ((n as u64) << ITER_SHIFT))
    }

    /// The undecorated form used to key the follow map: the source offset,
    /// iteration index and accept flag, with the anchor, greedy, ticked
    /// and lazy decorations stripped.
    pub fn pos(self) -> Position {
        Position(self.0 & (LOC_MASK | ITER_MASK | ACCEPT))
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_npos() {
            return write!(f, "npos");
        }
        if self.is_accept() {
            write!(f, "({})", self.accepts())?;
        } else {
            if self.iters() != 0 {
                write!(f, "{}.", self.iters())?;
            }
            write!(f, "{}", self.loc())?;
        }
        if self.is_lazy() {
            write!(f, "?{}", self.lazy_loc())?;
        }
        if self.is_anchor() {
            write!(f, "^")?;
        }
        if self.is_greedy() {
            write!(f, "!")?;
        }
        if self.is_ticked() {
            write!(f, "'")?;
        }
        Ok(())
    }
}

/// An ordered set of positions. This is the working currency of the
/// compiler: firstpos/lastpos/startpos sets and DFA state labels.
pub(crate) type Positions = BTreeSet<Position>;

/// The follow map: for every non-accept position, the positions that may
/// match immediately after it. Entries keyed by a lazy-decorated position
/// are memoized lazy rewrites added during determinization.
pub(crate) type Follow = BTreeMap<Position, Positions>;

/// Rewrite every position in `pos` to carry each lazy marker in
/// `lazypos`, appending the rewrites to `out`.
pub(crate) fn lazy_into(
    lazypos: &Positions,
    pos: &Positions,
    out: &mut Positions,
) {
    for p in pos {
        for q in lazypos {
            out.insert(p.lazy(q.loc()));
        }
    }
}

/// Rewrite `pos` in place to carry the lazy markers in `lazypos`.
pub(crate) fn lazy(lazypos: &Positions, pos: &mut Positions) {
    if lazypos.is_empty() {
        return;
    }
    let mut rewritten = Positions::new();
    lazy_into(lazypos, pos, &mut rewritten);
    *pos = rewritten;
}

/// Clear the lazy marker of every position in `pos` and mark it greedy.
pub(crate) fn greedy(pos: &mut Positions) {
    let marked: Positions =
        pos.iter().map(|p| p.lazy(0).greedy(true)).collect();
    *pos = marked;
}

/// Trim the lazy suffix of an ordered position set.
///
/// Scanning from the greatest position down, lazy accept and anchor
/// positions are rewritten to their non-lazy form and every following
/// position carrying the same lazy marker is dropped; a lazy greedy
/// position contributes its non-lazy form and is kept; the scan stops at
/// the first lazy position that is neither. The result is a fixed point:
/// `trim_lazy(trim_lazy(p)) == trim_lazy(p)`.
pub(crate) fn trim_lazy(pos: &mut Positions) {
    let suffix: Vec<Position> = pos
        .iter()
        .rev()
        .take_while(|p| p.is_lazy())
        .copied()
        .collect();
    let mut i = 0;
    while i < suffix.len() {
        let p = suffix[i];
        if !pos.contains(&p) {
            i += 1;
            continue;
        }
        let marker = p.lazy_loc();
        if p.is_accept() || p.is_anchor() {
            pos.insert(p.lazy(0));
            pos.remove(&p);
            i += 1;
            while i < suffix.len() && suffix[i].lazy_loc() == marker {
                pos.remove(&suffix[i]);
                i += 1;
            }
        } else if p.is_greedy() {
            pos.insert(p.lazy(0));
            i += 1;
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_round_trips() {
        let p = Position::new(1234)
            .iter(7)
            .anchor(true)
            .greedy(true)
            .ticked(true)
            .lazy(56);
        assert_eq!(p.loc(), 1234);
        assert_eq!(p.iters(), 7);
        assert_eq!(p.lazy_loc(), 56);
        assert!(p.is_anchor());
        assert!(p.is_greedy());
        assert!(p.is_ticked());
        assert!(!p.is_accept());
        assert_eq!(p.pos(), Position::new(1234).iter(7));
    }

    #[test]
    fn accept_positions_carry_the_rule() {
        let p = Position::rule(3).accept(true);
        assert!(p.is_accept());
        assert_eq!(p.accepts(), 3);
        assert_eq!(p.pos(), p);
    }

    #[test]
    fn distinct_decorations_are_distinct_positions() {
        let mut set = Positions::new();
        set.insert(Position::new(5));
        set.insert(Position::new(5).iter(1));
        set.insert(Position::new(5).lazy(9));
        set.insert(Position::new(5).anchor(true));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn lazy_positions_sort_last() {
        let mut set = Positions::new();
        set.insert(Position::new(100).lazy(3));
        set.insert(Position::new(1));
        set.insert(Position::new(2).lazy(3));
        set.insert(Position::new(999));
        let lazies: Vec<bool> = set.iter().map(|p| p.is_lazy()).collect();
        assert_eq!(lazies, vec![false, false, true, true]);
    }

    #[test]
    fn iter_advances_nested_copies() {
        let p = Position::new(4).iter(1);
        assert_eq!(p.iter(2).iters(), 3);
    }

    #[test]
    fn trim_lazy_drops_trailing_nongreedy() {
        let mut pos = Positions::new();
        pos.insert(Position::new(1));
        pos.insert(Position::new(2).lazy(7));
        trim_lazy(&mut pos);
        assert_eq!(pos.len(), 1);
        assert!(pos.contains(&Position::new(1)));
    }

    #[test]
    fn trim_lazy_rewrites_lazy_accept() {
        let mut pos = Positions::new();
        pos.insert(Position::new(1));
        pos.insert(Position::rule(1).accept(true).lazy(7));
        pos.insert(Position::new(2).lazy(7));
        trim_lazy(&mut pos);
        assert!(pos.contains(&Position::rule(1).accept(true)));
        assert!(!pos.iter().any(|p| p.is_lazy()));
    }

    #[test]
    fn trim_lazy_keeps_greedy_with_nonlazy_copy() {
        let mut pos = Positions::new();
        pos.insert(Position::new(3).greedy(true).lazy(7));
        trim_lazy(&mut pos);
        assert!(pos.contains(&Position::new(3).greedy(true)));
        assert!(pos.contains(&Position::new(3).greedy(true).lazy(7)));
    }

    #[test]
    fn trim_lazy_is_idempotent() {
        let mut pos = Positions::new();
        pos.insert(Position::new(1));
        pos.insert(Position::new(3).greedy(true).lazy(7));
        pos.insert(Position::rule(2).accept(true).lazy(9));
        pos.insert(Position::new(8).lazy(9));
        trim_lazy(&mut pos);
        let once = pos.clone();
        trim_lazy(&mut pos);
        assert_eq!(once, pos);
    }
}
