use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::classes::Char;
use crate::position::{Index, Positions};

/// Identifies a state in the arena. States are allocated in creation
/// order, which is also the order in which the encoder lays them out.
pub(crate) type StateId = u32;

/// The target of an edge with no live state: the matcher halts there.
pub(crate) const DEAD: StateId = StateId::MAX;

/// A DFA state.
///
/// A state is defined by its set of positions; the determinizer never
/// allocates two states with the same set. Edges map a low input unit to
/// its range high bound and target state. Meta edges (units at and above
/// `0x100`) never mix with byte edges in one range.
#[derive(Clone, Debug)]
pub(crate) struct State {
    /// The defining position set.
    pub positions: Rc<Positions>,
    /// lo -> (hi, target), pairwise disjoint ranges.
    pub edges: BTreeMap<Char, (Char, StateId)>,
    /// Lowest nonzero rule index among the accept positions, or 0.
    pub accept: Index,
    /// Whether an `accepts == 0` position is present: the matcher must
    /// discard the attempt matched through this state.
    pub redo: bool,
    /// Lookahead IDs whose head markers occur in this state.
    pub heads: BTreeSet<Index>,
    /// Lookahead IDs whose stop markers occur in this state.
    pub tails: BTreeSet<Index>,
    /// The program counter assigned by the encoder.
    pub index: Index,
}

impl State {
    pub fn new(positions: Rc<Positions>) -> State {
        State {
            positions,
            edges: BTreeMap::new(),
            accept: 0,
            redo: false,
            heads: BTreeSet::new(),
            tails: BTreeSet::new(),
            index: 0,
        }
    }
}

/// The determinized automaton, before and after encoding.
#[derive(Clone, Debug)]
pub(crate) struct Dfa {
    /// All states in creation order; index 0 is the start state.
    pub states: Vec<State>,
    /// Per-rule reachability of the accept state.
    pub acc: Vec<bool>,
    /// Total number of byte/meta values covered by all edges.
    pub edge_count: usize,
}

impl Dfa {
    pub fn new(rules: usize) -> Dfa {
        Dfa { states: vec![], acc: vec![false; rules], edge_count: 0 }
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Merge consecutive edges that share a target: `[lo1..hi1] -> T`
    /// directly followed by `[hi1+1..hi2] -> T` becomes one edge. Merging
    /// never crosses a gap, an edge with another target, or the byte/meta
    /// boundary, so the edges of a state stay pairwise disjoint.
    pub fn compact(&mut self) {
        for state in &mut self.states {
            let edges: Vec<(Char, Char, StateId)> = state
                .edges
                .iter()
                .map(|(&lo, &(hi, t))| (lo, hi, t))
                .collect();
            let mut out: Vec<(Char, (Char, StateId))> =
                Vec::with_capacity(edges.len());
            for (lo, hi, t) in edges {
                if let Some((_, (last_hi, last_t))) = out.last_mut() {
                    if *last_t == t && *last_hi < 0xFF && *last_hi + 1 == lo
                    {
                        *last_hi = hi;
                        continue;
                    }
                }
                out.push((lo, (hi, t)));
            }
            state.edges = out.into_iter().collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_edges(edges: &[(Char, Char, StateId)]) -> State {
        let mut state = State::new(Rc::new(Positions::new()));
        for &(lo, hi, t) in edges {
            state.edges.insert(lo, (hi, t));
        }
        state
    }

    fn dfa_with(state: State) -> Dfa {
        let mut dfa = Dfa::new(0);
        dfa.states.push(state);
        dfa
    }

    fn edges_of(dfa: &Dfa) -> Vec<(Char, Char, StateId)> {
        dfa.states[0]
            .edges
            .iter()
            .map(|(&lo, &(hi, t))| (lo, hi, t))
            .collect()
    }

    #[test]
    fn compact_merges_adjacent_same_target() {
        let mut dfa = dfa_with(state_with_edges(&[
            (b'a' as Char, b'f' as Char, 1),
            (b'g' as Char, b'z' as Char, 1),
        ]));
        dfa.compact();
        assert_eq!(edges_of(&dfa), vec![(b'a' as Char, b'z' as Char, 1)]);
    }

    #[test]
    fn compact_keeps_distinct_targets() {
        let mut dfa = dfa_with(state_with_edges(&[
            (b'a' as Char, b'f' as Char, 1),
            (b'g' as Char, b'z' as Char, 2),
        ]));
        dfa.compact();
        assert_eq!(edges_of(&dfa).len(), 2);
    }

    #[test]
    fn compact_stops_at_gaps() {
        let mut dfa = dfa_with(state_with_edges(&[
            (b'a' as Char, b'c' as Char, 1),
            (b'x' as Char, b'z' as Char, 1),
        ]));
        dfa.compact();
        assert_eq!(edges_of(&dfa).len(), 2);
    }

    #[test]
    fn compact_never_merges_past_another_target() {
        // the chain is gap-free, but merging the outer ranges would make
        // them overlap the middle one; all three stay disjoint
        let mut dfa = dfa_with(state_with_edges(&[
            (0, 5, 1),
            (6, 10, 2),
            (11, 15, 1),
        ]));
        dfa.compact();
        assert_eq!(
            edges_of(&dfa),
            vec![(0, 5, 1), (6, 10, 2), (11, 15, 1)]
        );
    }

    #[test]
    fn compact_never_merges_bytes_with_metas() {
        use crate::classes::META_NWB;
        let mut dfa = dfa_with(state_with_edges(&[
            (0xF0, 0xFF, 1),
            (META_NWB, META_NWB, 1),
        ]));
        dfa.compact();
        assert_eq!(edges_of(&dfa).len(), 2);
    }
}
