use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::classes::{
    is_meta, posix, Char, Chars, META_BOB, META_BOL, META_BWB, META_BWE,
    META_DED, META_EOB, META_EOL, META_EWB, META_EWE, META_IND, META_NWB,
    META_NWE, POSIX_CLASSES,
};
use crate::dfa::{Dfa, State, StateId};
use crate::error::{Error, Result};
use crate::nfa::Nfa;
use crate::position::{trim_lazy, Index, Location, Position, Positions};
use crate::ranges::is_modified;

/// A pending transition: a character set and the positions it leads to.
/// The sets of distinct moves are kept disjoint.
pub(crate) type Move = (Chars, Positions);
pub(crate) type Moves = Vec<Move>;

/// Converts a position-set NFA into a DFA by subset construction.
///
/// States are uniqued through a cache keyed by their position set, so the
/// defining sets double as identity. The worklist is the arena itself:
/// states are processed in creation order while new ones are appended.
pub(crate) struct Determinizer<'a> {
    rex: &'a str,
    nfa: &'a mut Nfa,
    states: Vec<State>,
    cache: HashMap<Rc<Positions>, StateId>,
    edge_count: usize,
}

impl<'a> Determinizer<'a> {
    pub fn new(rex: &'a str, nfa: &'a mut Nfa) -> Determinizer<'a> {
        Determinizer {
            rex,
            nfa,
            states: vec![],
            cache: HashMap::new(),
            edge_count: 0,
        }
    }

    pub fn build(mut self) -> Result<Dfa> {
        let mut startpos = self.nfa.startpos.clone();
        trim_lazy(&mut startpos);
        self.add_state(Rc::new(startpos));
        let mut acc = vec![false; self.nfa.end.len()];
        let mut id = 0;
        while id < self.states.len() {
            let moves = self.compile_state(id as StateId)?;
            for (chars, mut pos) in moves {
                trim_lazy(&mut pos);
                if pos.is_empty() {
                    continue;
                }
                let target = self.cached_state(pos);
                for &(lo, hi) in chars.ranges() {
                    self.states[id].edges.insert(lo, (hi, target));
                    self.edge_count += (hi - lo + 1) as usize;
                }
            }
            let accept = self.states[id].accept;
            if accept > 0 && (accept as usize) <= acc.len() {
                acc[accept as usize - 1] = true;
            }
            id += 1;
        }
        debug!(
            "determinize: {} states, {} edge characters",
            self.states.len(),
            self.edge_count
        );
        Ok(Dfa { states: self.states, acc, edge_count: self.edge_count })
    }

    fn cached_state(&mut self, pos: Positions) -> StateId {
        let pos = Rc::new(pos);
        if let Some(&id) = self.cache.get(&pos) {
            return id;
        }
        self.add_state(pos)
    }

    fn add_state(&mut self, positions: Rc<Positions>) -> StateId {
        let id = self.states.len() as StateId;
        self.cache.insert(positions.clone(), id);
        self.states.push(State::new(positions));
        id
    }

    /// Compute the moves out of a state: accept and redo bookkeeping,
    /// lookahead head/tail deposits, and one (chars, follow) contribution
    /// per ordinary leaf, merged into a disjoint move list.
    fn compile_state(&mut self, id: StateId) -> Result<Moves> {
        let positions = self.states[id as usize].positions.clone();
        trace!("compile state {} over {} positions", id, positions.len());
        let mut moves = Moves::new();
        for &k in positions.iter() {
            if k.is_accept() {
                let state = &mut self.states[id as usize];
                let accepts = k.accepts();
                if state.accept == 0 || accepts < state.accept {
                    state.accept = accepts;
                }
                if accepts == 0 {
                    state.redo = true;
                }
                continue;
            }
            let loc = k.loc();
            let c = self.at(loc);
            let literal = is_modified(b'q', &self.nfa.modifiers, loc);
            if c == b'/' && self.nfa.opts.l && !literal {
                // the unticked marker opens the lookahead, the ticked one
                // stops it
                let (heads, tails) = self.lookahead_ids(loc, !k.is_ticked());
                let state = &mut self.states[id as usize];
                state.heads.extend(heads);
                state.tails.extend(tails);
            } else if c == b'(' && !literal {
                let (heads, _) = self.lookahead_ids(loc, true);
                self.states[id as usize].heads.extend(heads);
            } else if c == b')' && !literal {
                let (_, tails) = self.lookahead_ids(loc, false);
                self.states[id as usize].tails.extend(tails);
            } else {
                let base = match self.nfa.followpos.get(&k.pos()) {
                    None => continue,
                    Some(f) => f.clone(),
                };
                let follow: Positions;
                if k.is_lazy() {
                    if k.is_greedy() {
                        // trim_lazy keeps a non-lazy twin of this position
                        continue;
                    }
                    if let Some(memo) = self.nfa.followpos.get(&k) {
                        follow = memo.clone();
                    } else {
                        // memoize the lazy rewrite; ticked successors keep
                        // the lookahead stop intact
                        let lazied: Positions = base
                            .iter()
                            .map(|p| {
                                if p.is_ticked() {
                                    *p
                                } else {
                                    p.lazy(k.lazy_loc())
                                }
                            })
                            .collect();
                        self.nfa.followpos.insert(k, lazied.clone());
                        follow = lazied;
                    }
                } else {
                    follow = base;
                }
                let chars = self.leaf_chars(k, c, loc, literal)?;
                transition(&mut moves, chars, follow);
            }
        }
        Ok(moves)
    }

    /// The global lookahead IDs whose ranges contain `loc`, split into
    /// head and tail candidates. IDs number lookahead intervals across
    /// rules in ascending rule order.
    fn lookahead_ids(
        &self,
        loc: Location,
        head: bool,
    ) -> (BTreeSet<Index>, BTreeSet<Index>) {
        let mut heads = BTreeSet::new();
        let mut tails = BTreeSet::new();
        let mut n: usize = 0;
        for ranges in self.nfa.lookahead.values() {
            if let Some(rank) = ranges.find(loc) {
                let id = (n + rank) as Index;
                if head {
                    heads.insert(id);
                } else {
                    tails.insert(id);
                }
            }
            n += ranges.len();
        }
        (heads, tails)
    }

    /// The character set accepted by the leaf at `loc`.
    fn leaf_chars(
        &self,
        k: Position,
        c: u8,
        loc: Location,
        literal: bool,
    ) -> Result<Chars> {
        let mut chars = Chars::new();
        if literal {
            chars.insert(c as Char);
            return Ok(chars);
        }
        match c {
            b'.' => {
                if self.nfa.opts.s
                    || is_modified(b's', &self.nfa.modifiers, loc)
                {
                    chars.insert_range(0, 0xFF);
                } else {
                    chars.insert_range(0, 9);
                    chars.insert_range(11, 0xFF);
                }
            }
            b'^' => {
                chars.insert(
                    if self.nfa.opts.m
                        || is_modified(b'm', &self.nfa.modifiers, loc)
                    {
                        META_BOL
                    } else {
                        META_BOB
                    },
                );
            }
            b'$' => {
                chars.insert(
                    if self.nfa.opts.m
                        || is_modified(b'm', &self.nfa.modifiers, loc)
                    {
                        META_EOL
                    } else {
                        META_EOB
                    },
                );
            }
            _ => {
                if c == b'[' && self.escapes_at(loc, b"AZBb<>ij") == 0 {
                    self.compile_list(loc + 1, &mut chars)?;
                } else {
                    match self.escape_at(loc) {
                        b'i' => chars.insert(META_IND),
                        b'j' => chars.insert(META_DED),
                        b'A' => chars.insert(META_BOB),
                        b'Z' => chars.insert(META_EOB),
                        b'B' => chars.insert(if k.is_anchor() {
                            META_NWB
                        } else {
                            META_NWE
                        }),
                        b'b' => {
                            if k.is_anchor() {
                                chars.insert_range(META_BWB, META_EWB);
                            } else {
                                chars.insert_range(META_BWE, META_EWE);
                            }
                        }
                        b'<' => chars.insert(if k.is_anchor() {
                            META_BWB
                        } else {
                            META_BWE
                        }),
                        b'>' => chars.insert(if k.is_anchor() {
                            META_EWB
                        } else {
                            META_EWE
                        }),
                        0 => {
                            if c.is_ascii_alphabetic()
                                && (self.nfa.opts.i
                                    || is_modified(
                                        b'i',
                                        &self.nfa.modifiers,
                                        loc,
                                    ))
                            {
                                chars.insert(c.to_ascii_uppercase() as Char);
                                chars.insert(c.to_ascii_lowercase() as Char);
                            } else {
                                chars.insert(c as Char);
                            }
                        }
                        _ => {
                            self.compile_esc(loc + 1, &mut chars)?;
                        }
                    }
                }
            }
        }
        Ok(chars)
    }

    /// Expand the escape at `loc` (past the escape character) into
    /// `chars`. Returns the single code point denoted, or a value above
    /// the byte range when the escape expanded to a class.
    fn compile_esc(&self, loc: Location, chars: &mut Chars) -> Result<Char> {
        let c = self.at(loc);
        let mut ch = c as Char;
        if c == b'0' {
            let mut v: u32 = 0;
            let mut i: Location = 0;
            while i < 3 {
                let d = self.at(loc + 1 + i);
                if !(b'0'..=b'7').contains(&d) {
                    break;
                }
                v = 8 * v + (d - b'0') as u32;
                i += 1;
            }
            ch = v as Char;
        } else if (c == b'x' || c == b'u') && self.at(loc + 1) == b'{' {
            let mut v: u32 = 0;
            let mut i = loc + 2;
            while self.at(i).is_ascii_hexdigit() && v <= 0xFFFF {
                v = 16 * v + hex(self.at(i));
                i += 1;
            }
            ch = if v > 0xFF { META_EOL } else { v as Char };
        } else if c == b'x' && self.at(loc + 1).is_ascii_hexdigit() {
            let mut v: u32 = 0;
            let mut i: Location = 0;
            while i < 2 && self.at(loc + 1 + i).is_ascii_hexdigit() {
                v = 16 * v + hex(self.at(loc + 1 + i));
                i += 1;
            }
            ch = v as Char;
        } else if c == b'c' {
            ch = (self.at(loc + 1) % 32) as Char;
        } else if c == b'e' {
            ch = 0x1B;
        } else if c == b'_' {
            posix(6, chars); // \_ is Alpha
            ch = META_EOL;
        } else if c == b'p' && self.at(loc + 1) == b'{' {
            let mut index = POSIX_CLASSES.len();
            for (i, name) in POSIX_CLASSES.iter().enumerate() {
                if self.eq_at(loc + 2, name) {
                    index = i;
                    break;
                }
            }
            if index < POSIX_CLASSES.len() {
                posix(index, chars);
            } else {
                self.report(Error::syntax(
                    "unrecognized character class",
                    loc,
                ))?;
            }
            return Ok(META_EOL);
        } else if let Some(i) = b"abtnvfr".iter().position(|&x| x == c) {
            ch = i as Char + 0x07;
        } else {
            let class = match c {
                b's' => Some((1, false)),
                b'S' => Some((1, true)),
                b'x' => Some((2, false)),
                b'X' => Some((2, true)),
                b'h' => Some((7, false)),
                b'H' => Some((7, true)),
                b'd' => Some((8, false)),
                b'D' => Some((8, true)),
                b'l' => Some((10, false)),
                b'L' => Some((10, true)),
                b'u' => Some((12, false)),
                b'U' => Some((12, true)),
                b'w' => Some((13, false)),
                b'W' => Some((13, true)),
                _ => None,
            };
            if let Some((index, complement)) = class {
                posix(index, chars);
                if complement {
                    chars.flip();
                }
                return Ok(META_EOL);
            }
        }
        if ch <= 0xFF {
            chars.insert(ch);
        }
        Ok(ch)
    }

    /// Walk a bracket list, starting past the opening `[`.
    fn compile_list(&self, loc: Location, chars: &mut Chars) -> Result<()> {
        let mut loc = loc;
        let complement = self.at(loc) == b'^';
        if complement {
            loc += 1;
        }
        let mut prev: Char = META_BOL;
        let mut lo: Char = META_EOL;
        let mut c = self.at(loc) as Char;
        while c != 0 && (c != b']' as Char || prev == META_BOL) {
            if c == b'-' as Char && !is_meta(prev) && is_meta(lo) {
                lo = prev;
            } else {
                let nested = if c == b'[' as Char && self.at(loc + 1) == b':'
                {
                    self.find_at(loc + 2, b':')
                        .filter(|&cl| self.at(cl + 1) == b']')
                } else {
                    None
                };
                if let Some(c_loc) = nested {
                    if c_loc == loc + 3 {
                        // [:c:] with a single-letter body acts as the
                        // escape class c
                        c = self.compile_esc(loc + 2, chars)?;
                    } else {
                        let mut index = POSIX_CLASSES.len();
                        for (i, name) in POSIX_CLASSES.iter().enumerate() {
                            // the first letter is matched regardless of
                            // case
                            if self.eq_at(loc + 3, &name[1..]) {
                                index = i;
                                break;
                            }
                        }
                        if index < POSIX_CLASSES.len() {
                            posix(index, chars);
                        } else {
                            self.report(Error::syntax(
                                "unrecognized POSIX character class",
                                loc,
                            ))?;
                        }
                        c = META_EOL;
                    }
                    loc = c_loc + 1;
                } else if c == self.nfa.opts.e as Char
                    && self.nfa.opts.e != 0
                    && !self.nfa.opts.b
                {
                    c = self.compile_esc(loc + 1, chars)?;
                    let mut esc_end = loc;
                    self.skip_esc(&mut esc_end);
                    loc = esc_end - 1;
                }
                if !is_meta(c) {
                    let fold = self.nfa.opts.i
                        || is_modified(b'i', &self.nfa.modifiers, loc);
                    if !is_meta(lo) {
                        if lo <= c {
                            chars.insert_range(lo, c);
                        } else {
                            self.report(Error::list(
                                "inverted character range in list",
                                loc,
                            ))?;
                        }
                        if fold {
                            for a in lo..=c.min(0xFF) {
                                let a = a as u8;
                                if a.is_ascii_uppercase() {
                                    chars
                                        .insert(a.to_ascii_lowercase()
                                            as Char);
                                } else if a.is_ascii_lowercase() {
                                    chars
                                        .insert(a.to_ascii_uppercase()
                                            as Char);
                                }
                            }
                        }
                        c = META_EOL;
                    } else if (c as u8).is_ascii_alphabetic() && fold {
                        chars.insert((c as u8).to_ascii_uppercase() as Char);
                        chars.insert((c as u8).to_ascii_lowercase() as Char);
                    } else {
                        chars.insert(c);
                    }
                }
                prev = c;
                lo = META_EOL;
            }
            loc += 1;
            c = self.at(loc) as Char;
        }
        if !is_meta(lo) {
            // a trailing - is literal
            chars.insert(b'-' as Char);
        }
        if complement {
            chars.flip();
        }
        Ok(())
    }

    /// Advance past an escape sequence. Shape errors were already
    /// reported during parsing, so this scan is silent.
    fn skip_esc(&self, loc: &mut Location) {
        *loc += 1;
        let c = self.at(*loc);
        if c == 0 {
            return;
        }
        if c == b'0' {
            *loc += 1;
            let mut digits = 0;
            while digits < 3 && self.at(*loc).is_ascii_digit() {
                *loc += 1;
                digits += 1;
            }
        } else if (c == b'p' || c == b'u' || c == b'x')
            && self.at(*loc + 1) == b'{'
        {
            *loc += 1;
            loop {
                *loc += 1;
                if !self.at(*loc).is_ascii_alphanumeric() {
                    break;
                }
            }
            if self.at(*loc) == b'}' {
                *loc += 1;
            }
        } else if c == b'x' {
            *loc += 1;
            let mut digits = 0;
            while digits < 2 && self.at(*loc).is_ascii_hexdigit() {
                *loc += 1;
                digits += 1;
            }
        } else {
            if c == b'c' {
                *loc += 1;
            }
            if self.at(*loc) != 0 {
                *loc += 1;
            }
        }
    }

    fn at(&self, loc: Location) -> u8 {
        *self.rex.as_bytes().get(loc as usize).unwrap_or(&0)
    }

    fn escape_at(&self, loc: Location) -> u8 {
        if self.nfa.opts.e != 0 && self.at(loc) == self.nfa.opts.e {
            self.at(loc + 1)
        } else {
            0
        }
    }

    fn escapes_at(&self, loc: Location, set: &[u8]) -> u8 {
        let c = self.escape_at(loc);
        if c != 0 && set.contains(&c) {
            c
        } else {
            0
        }
    }

    fn find_at(&self, loc: Location, c: u8) -> Option<Location> {
        self.rex.as_bytes()[(loc as usize).min(self.rex.len())..]
            .iter()
            .position(|&b| b == c)
            .map(|i| loc + i as Location)
    }

    fn eq_at(&self, loc: Location, s: &str) -> bool {
        self.rex.as_bytes()[(loc as usize).min(self.rex.len())..]
            .starts_with(s.as_bytes())
    }

    fn report(&self, err: Error) -> Result<()> {
        if self.nfa.opts.w {
            warn!("{}", err.display_with(self.rex));
        }
        if self.nfa.opts.r || err.is_fatal() {
            return Err(err);
        }
        Ok(())
    }
}

/// Merge a new `(chars, follow)` pair into the move list, keeping the
/// character sets of distinct moves disjoint. Overlaps split: the
/// intersection goes to the union of the follow sets, the complements
/// keep their originals, and moves subsumed on both components collapse.
pub(crate) fn transition(moves: &mut Moves, chars: Chars, follow: Positions) {
    let mut rest = chars.clone();
    let mut appended = Moves::new();
    let old = std::mem::take(moves);
    for mut mv in old {
        if mv.1 == follow {
            rest.union_with(&mv.0);
            continue;
        }
        if chars.intersects(&mv.0) {
            let common = chars.intersection(&mv.0);
            if is_subset(&follow, &mv.1) {
                rest.subtract(&common);
                moves.push(mv);
            } else if mv.0 == common && is_subset(&mv.1, &follow) {
                // subsumed by the new move
            } else {
                rest.subtract(&common);
                mv.0.subtract(&common);
                if mv.0.any() {
                    let mut joint = mv.1.clone();
                    joint.extend(follow.iter().copied());
                    appended.push((common, joint));
                    moves.push(mv);
                } else {
                    let mut joint = mv.1;
                    joint.extend(follow.iter().copied());
                    moves.push((common, joint));
                }
            }
        } else {
            moves.push(mv);
        }
    }
    moves.extend(appended);
    if rest.any() {
        moves.push((rest, follow));
    }
}

fn is_subset(a: &Positions, b: &Positions) -> bool {
    a.iter().all(|p| b.contains(p))
}

fn hex(b: u8) -> u32 {
    (b as char).to_digit(16).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars_of(ranges: &[(Char, Char)]) -> Chars {
        let mut c = Chars::new();
        for &(lo, hi) in ranges {
            c.insert_range(lo, hi);
        }
        c
    }

    fn pos_of(locs: &[Location]) -> Positions {
        locs.iter().map(|&l| Position::new(l)).collect()
    }

    #[test]
    fn transition_unions_chars_of_equal_follow() {
        let mut moves = Moves::new();
        transition(&mut moves, chars_of(&[(b'a' as Char, b'a' as Char)]), pos_of(&[1]));
        transition(&mut moves, chars_of(&[(b'b' as Char, b'b' as Char)]), pos_of(&[1]));
        assert_eq!(moves.len(), 1);
        assert_eq!(
            moves[0].0.ranges(),
            &[(b'a' as Char, b'b' as Char)]
        );
    }

    #[test]
    fn transition_splits_overlap() {
        let mut moves = Moves::new();
        transition(&mut moves, chars_of(&[(b'a' as Char, b'm' as Char)]), pos_of(&[1]));
        transition(&mut moves, chars_of(&[(b'g' as Char, b'z' as Char)]), pos_of(&[2]));
        // three disjoint pieces: a-f -> {1}, g-m -> {1,2}, n-z -> {2}
        assert_eq!(moves.len(), 3);
        let mut all = Chars::new();
        for (chars, _) in &moves {
            all.union_with(chars);
        }
        assert_eq!(all.ranges(), &[(b'a' as Char, b'z' as Char)]);
        let joint = moves
            .iter()
            .find(|(c, _)| c.contains(b'g' as Char))
            .unwrap();
        assert_eq!(joint.1, pos_of(&[1, 2]));
    }

    #[test]
    fn transition_keeps_subset_follow_with_existing() {
        let mut moves = Moves::new();
        transition(&mut moves, chars_of(&[(b'a' as Char, b'z' as Char)]), pos_of(&[1, 2]));
        transition(&mut moves, chars_of(&[(b'c' as Char, b'd' as Char)]), pos_of(&[1]));
        // the narrower move's follow is a subset, so the wide move wins
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].1, pos_of(&[1, 2]));
    }

    #[test]
    fn transition_absorbs_subsumed_move() {
        let mut moves = Moves::new();
        transition(&mut moves, chars_of(&[(b'c' as Char, b'd' as Char)]), pos_of(&[1]));
        transition(&mut moves, chars_of(&[(b'a' as Char, b'z' as Char)]), pos_of(&[1, 2]));
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].0.ranges(), &[(b'a' as Char, b'z' as Char)]);
        assert_eq!(moves[0].1, pos_of(&[1, 2]));
    }

    #[test]
    fn moves_stay_disjoint() {
        let mut moves = Moves::new();
        transition(&mut moves, chars_of(&[(0, 0x7F)]), pos_of(&[1]));
        transition(&mut moves, chars_of(&[(0x40, 0xBF)]), pos_of(&[2]));
        transition(&mut moves, chars_of(&[(0x20, 0x5F)]), pos_of(&[3]));
        for (i, (a, _)) in moves.iter().enumerate() {
            for (b, _) in moves.iter().skip(i + 1) {
                assert!(!a.intersects(b));
            }
        }
    }
}
