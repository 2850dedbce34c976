use log::{debug, trace, warn};

use crate::builder::Options;
use crate::error::{Error, Result};
use crate::position::{
    greedy, lazy, lazy_into, Follow, Index, Location, Position, Positions,
    IMAX,
};
use crate::ranges::{LookMap, ModMap, Ranges};

/// The parsed form of a pattern: a position-set NFA.
///
/// There are no explicit NFA nodes. Leaves are source positions, and the
/// follow map encodes the whole transition closure. The start set plus the
/// follow map are everything the determinizer needs; the modifier and
/// lookahead maps carry the side annotations the parser collected along
/// the way.
#[derive(Debug)]
pub(crate) struct Nfa {
    pub startpos: Positions,
    pub followpos: Follow,
    pub modifiers: ModMap,
    pub lookahead: LookMap,
    /// End offset of each top-level alternative, in rule order.
    pub end: Vec<Location>,
    /// The options after parsing; global `(?imqsx)` modifiers stick.
    pub opts: Options,
}

/// A recursive-descent parser over the pattern source.
///
/// The grammar is parsed by four mutually recursive procedures:
///
/// ```text
/// parse1 = parse2 ('|' parse2)*
/// parse2 = anchors? parse3 (parse3)*
/// parse3 = parse4 quantifier?
/// parse4 = atom
/// ```
///
/// Each procedure communicates through out-parameters: the firstpos and
/// lastpos sets, nullability, additions to the follow map, pending lazy
/// quantifier offsets, modifier and lookahead ranges, and the current
/// repetition-unrolling multiplier.
pub(crate) struct Parser<'p> {
    rex: &'p str,
    opts: Options,
    end: Vec<Location>,
}

/// Whitespace in the C locale sense, as free-spacing mode skips it.
fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r')
}

impl<'p> Parser<'p> {
    pub fn new(rex: &'p str, opts: Options) -> Parser<'p> {
        Parser { rex, opts, end: vec![] }
    }

    /// The byte at the given offset, or 0 past the end.
    fn at(&self, loc: Location) -> u8 {
        *self.rex.as_bytes().get(loc as usize).unwrap_or(&0)
    }

    /// The character escaped at `loc`, or 0 if `loc` is no escape.
    fn escape_at(&self, loc: Location) -> u8 {
        if self.opts.e != 0 && self.at(loc) == self.opts.e {
            self.at(loc + 1)
        } else {
            0
        }
    }

    /// The character escaped at `loc` if it is one of `set`, else 0.
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

    /// Report an error: emit a diagnostic when the `w` option is set, and
    /// fail when the `r` option is set or the error is fatal. Otherwise
    /// parsing continues with degraded semantics.
    fn report(&self, err: Error) -> Result<()> {
        if self.opts.w {
            warn!("{}", err.display_with(self.rex));
        }
        if self.opts.r || err.is_fatal() {
            return Err(err);
        }
        Ok(())
    }

    /// Parse the whole pattern. Top-level alternatives become rules with
    /// 1-based accept indices; each contributes its firstpos to the start
    /// set and an accept position to the follow set of its lastpos.
    pub fn parse(mut self) -> Result<Nfa> {
        trace!("parse: begin");
        let mut loc: Location = 0;
        let mut choice: Index = 1;
        let mut startpos = Positions::new();
        let mut followpos = Follow::new();
        let mut modifiers = ModMap::new();
        let mut lookahead = LookMap::new();
        let mut firstpos = Positions::new();
        let mut lastpos = Positions::new();
        let mut nullable = false;
        let mut iter: Index = 1;
        loop {
            let mut lazypos = Positions::new();
            let mut look = Ranges::new();
            self.parse2(
                true,
                &mut loc,
                &mut firstpos,
                &mut lastpos,
                &mut nullable,
                &mut followpos,
                &mut lazypos,
                &mut modifiers,
                &mut look,
                &mut iter,
            )?;
            if !look.is_empty() {
                lookahead.insert(choice, look);
            }
            self.end.push(loc);
            startpos.extend(firstpos.iter().copied());
            if nullable {
                if lazypos.is_empty() {
                    startpos.insert(Position::rule(choice).accept(true));
                } else {
                    for q in &lazypos {
                        startpos.insert(
                            Position::rule(choice).accept(true).lazy(q.loc()),
                        );
                    }
                }
            }
            for p in &lastpos {
                let follow = followpos.entry(p.pos()).or_default();
                if lazypos.is_empty() {
                    follow.insert(Position::rule(choice).accept(true));
                } else {
                    for q in &lazypos {
                        follow.insert(
                            Position::rule(choice).accept(true).lazy(q.loc()),
                        );
                    }
                }
            }
            choice += 1;
            let c = self.at(loc);
            loc += 1;
            if c != b'|' {
                break;
            }
        }
        debug!(
            "parse: {} rule(s), {} positions at start, {} follow entries",
            self.end.len(),
            startpos.len(),
            followpos.len()
        );
        Ok(Nfa {
            startpos,
            followpos,
            modifiers,
            lookahead,
            end: self.end,
            opts: self.opts,
        })
    }

    /// Alternation inside a group.
    #[allow(clippy::too_many_arguments)]
    fn parse1(
        &mut self,
        begin: bool,
        loc: &mut Location,
        firstpos: &mut Positions,
        lastpos: &mut Positions,
        nullable: &mut bool,
        followpos: &mut Follow,
        lazypos: &mut Positions,
        modifiers: &mut ModMap,
        lookahead: &mut Ranges,
        iter: &mut Index,
    ) -> Result<()> {
        trace!("parse1 at {}", loc);
        self.parse2(
            begin, loc, firstpos, lastpos, nullable, followpos, lazypos,
            modifiers, lookahead, iter,
        )?;
        let mut firstpos1 = Positions::new();
        let mut lastpos1 = Positions::new();
        let mut nullable1 = false;
        let mut lazypos1 = Positions::new();
        let mut iter1: Index = 1;
        while self.at(*loc) == b'|' {
            *loc += 1;
            self.parse2(
                begin,
                loc,
                &mut firstpos1,
                &mut lastpos1,
                &mut nullable1,
                followpos,
                &mut lazypos1,
                modifiers,
                lookahead,
                &mut iter1,
            )?;
            firstpos.extend(firstpos1.iter().copied());
            lastpos.extend(lastpos1.iter().copied());
            lazypos.extend(lazypos1.iter().copied());
            if nullable1 {
                *nullable = true;
            }
            if iter1 > *iter {
                *iter = iter1;
            }
        }
        Ok(())
    }

    /// Anchor prefix, concatenation and trailing context.
    #[allow(clippy::too_many_arguments)]
    fn parse2(
        &mut self,
        begin: bool,
        loc: &mut Location,
        firstpos: &mut Positions,
        lastpos: &mut Positions,
        nullable: &mut bool,
        followpos: &mut Follow,
        lazypos: &mut Positions,
        modifiers: &mut ModMap,
        lookahead: &mut Ranges,
        iter: &mut Index,
    ) -> Result<()> {
        trace!("parse2 at {}", loc);
        let mut begin = begin;
        let mut a_pos = Positions::new();
        if begin {
            loop {
                if self.opts.x {
                    while is_space(self.at(*loc)) {
                        *loc += 1;
                    }
                }
                if self.at(*loc) == b'^' {
                    a_pos.insert(Position::new(*loc));
                    *loc += 1;
                } else if self.escapes_at(*loc, b"ABb<>") != 0 {
                    a_pos.insert(Position::new(*loc));
                    *loc += 2;
                } else {
                    if self.escapes_at(*loc, b"ij") != 0 {
                        begin = false;
                    }
                    break;
                }
            }
        }
        self.parse3(
            begin, loc, firstpos, lastpos, nullable, followpos, lazypos,
            modifiers, lookahead, iter,
        )?;
        let mut firstpos1 = Positions::new();
        let mut lastpos1 = Positions::new();
        let mut nullable1 = false;
        let mut lazypos1 = Positions::new();
        let mut iter1: Index = 1;
        let mut l_pos = Position::NPOS;
        loop {
            let c = self.at(*loc);
            if c == 0 || c == b'|' || c == b')' {
                break;
            }
            if c == b'/'
                && l_pos.is_npos()
                && self.opts.l
                && (!self.opts.x || self.at(*loc + 1) != b'*')
            {
                l_pos = Position::new(*loc);
                *loc += 1;
            }
            self.parse3(
                false,
                loc,
                &mut firstpos1,
                &mut lastpos1,
                &mut nullable1,
                followpos,
                &mut lazypos1,
                modifiers,
                lookahead,
                &mut iter1,
            )?;
            if c == b'/' && !l_pos.is_npos() {
                firstpos1.insert(l_pos);
            }
            if !lazypos.is_empty() {
                // a pending lazy quantifier spills over the next fragment
                let mut firstpos2 = Positions::new();
                lazy_into(lazypos, &firstpos1, &mut firstpos2);
                firstpos1.extend(firstpos2);
            }
            if *nullable {
                firstpos.extend(firstpos1.iter().copied());
            }
            for p in lastpos.iter() {
                followpos
                    .entry(p.pos())
                    .or_default()
                    .extend(firstpos1.iter().copied());
            }
            if nullable1 {
                lastpos.extend(lastpos1.iter().copied());
            } else {
                std::mem::swap(lastpos, &mut lastpos1);
                *nullable = false;
            }
            lazypos.extend(lazypos1.iter().copied());
            if iter1 > *iter {
                *iter = iter1;
            }
        }
        for p in a_pos.iter().copied().collect::<Vec<_>>() {
            for k in lastpos.iter().copied() {
                let kc = self.at(k.loc());
                if (kc == b')' || (self.opts.l && kc == b'/'))
                    && lookahead.contains(k.loc())
                {
                    followpos.entry(p.pos()).or_default().insert(k);
                }
            }
            for k in lastpos.iter().copied() {
                followpos
                    .entry(k.pos())
                    .or_default()
                    .insert(p.anchor(!*nullable || k.pos() != p.pos()));
            }
            lastpos.clear();
            lastpos.insert(p);
            if *nullable {
                firstpos.insert(p);
                *nullable = false;
            }
        }
        if !l_pos.is_npos() {
            let stop = l_pos.ticked(true);
            for p in lastpos.iter() {
                followpos.entry(p.pos()).or_default().insert(stop);
            }
            lastpos.insert(stop);
            lookahead.insert(l_pos.loc(), l_pos.loc());
        }
        Ok(())
    }

    /// Postfix quantifiers, including `{n,m}` unrolling.
    #[allow(clippy::too_many_arguments)]
    fn parse3(
        &mut self,
        begin: bool,
        loc: &mut Location,
        firstpos: &mut Positions,
        lastpos: &mut Positions,
        nullable: &mut bool,
        followpos: &mut Follow,
        lazypos: &mut Positions,
        modifiers: &mut ModMap,
        lookahead: &mut Ranges,
        iter: &mut Index,
    ) -> Result<()> {
        trace!("parse3 at {}", loc);
        let b_pos = Position::new(*loc);
        self.parse4(
            begin, loc, firstpos, lastpos, nullable, followpos, lazypos,
            modifiers, lookahead, iter,
        )?;
        let mut c = self.at(*loc);
        if self.opts.x {
            while is_space(c) {
                *loc += 1;
                c = self.at(*loc);
            }
        }
        if c == b'*' || c == b'+' || c == b'?' {
            if c == b'*' || c == b'?' {
                *nullable = true;
            }
            *loc += 1;
            if self.at(*loc) == b'?' {
                lazypos.insert(Position::new(*loc));
                if *nullable {
                    lazy(&*lazypos, firstpos);
                }
                *loc += 1;
            } else {
                greedy(firstpos);
            }
            if c == b'+' && !*nullable && !lazypos.is_empty() {
                let mut firstpos1 = Positions::new();
                lazy_into(&*lazypos, firstpos, &mut firstpos1);
                for p in lastpos.iter() {
                    followpos
                        .entry(p.pos())
                        .or_default()
                        .extend(firstpos1.iter().copied());
                }
                firstpos.extend(firstpos1);
            } else if c == b'*' || c == b'+' {
                for p in lastpos.iter() {
                    followpos
                        .entry(p.pos())
                        .or_default()
                        .extend(firstpos.iter().copied());
                }
            }
        } else if c == b'{' {
            // {n,m} repeats the fragment min n to max m times
            let mut k: u32 = 0;
            let mut digits = 0;
            while digits < 7 {
                *loc += 1;
                c = self.at(*loc);
                if !c.is_ascii_digit() {
                    break;
                }
                k = 10 * k + (c - b'0') as u32;
                digits += 1;
            }
            if k > IMAX as u32 {
                self.report(Error::range("{min,max} range overflow", *loc))?;
                k = IMAX as u32;
            }
            let mut n = k as Index;
            let mut m = n;
            let mut unlimited = false;
            if self.at(*loc) == b',' {
                if self.at(*loc + 1).is_ascii_digit() {
                    let mut km: u32 = 0;
                    let mut digits = 0;
                    while digits < 7 {
                        *loc += 1;
                        c = self.at(*loc);
                        if !c.is_ascii_digit() {
                            break;
                        }
                        km = 10 * km + (c - b'0') as u32;
                        digits += 1;
                    }
                    m = km.min(IMAX as u32) as Index;
                } else {
                    unlimited = true;
                    *loc += 1;
                }
            }
            if self.at(*loc) == b'}' {
                let nullable1 = *nullable;
                if n == 0 {
                    *nullable = true;
                }
                if n > m {
                    self.report(Error::range(
                        "min > max in range {min,max}",
                        *loc,
                    ))?;
                }
                *loc += 1;
                if self.at(*loc) == b'?' {
                    lazypos.insert(Position::new(*loc));
                    if *nullable {
                        lazy(&*lazypos, firstpos);
                    }
                    *loc += 1;
                } else if n < m && lazypos.is_empty() {
                    greedy(firstpos);
                }
                // the lazy-adjusted firstpos drives the copies when the
                // fragment itself is not nullable
                let pfirstpos: Positions =
                    if !*nullable && !lazypos.is_empty() {
                        let mut firstpos1 = Positions::new();
                        lazy_into(&*lazypos, firstpos, &mut firstpos1);
                        firstpos1
                    } else {
                        firstpos.clone()
                    };
                if *nullable && unlimited {
                    // {0,} is the Kleene closure
                    for p in lastpos.iter() {
                        followpos
                            .entry(p.pos())
                            .or_default()
                            .extend(pfirstpos.iter().copied());
                    }
                } else if m > 0 {
                    if (*iter as u32) * (m as u32) >= IMAX as u32 {
                        self.report(Error::range(
                            "{min,max} range overflow",
                            *loc,
                        ))?;
                        m = ((IMAX as u32 - 1) / (*iter as u32).max(1))
                            as Index;
                        if n > m {
                            n = m;
                        }
                    }
                    if m == 0 {
                        firstpos.clear();
                        lastpos.clear();
                        lazypos.clear();
                    } else {
                        // replicate the fragment's follow entries for
                        // every copy, shifting iteration indices
                        let mut followpos1 = Follow::new();
                        for (key, set) in followpos.range(b_pos..) {
                            for i in 1..m {
                                let shifted = followpos1
                                    .entry(key.iter(*iter * i))
                                    .or_default();
                                for p in set.iter() {
                                    shifted.insert(p.iter(*iter * i));
                                }
                            }
                        }
                        for (key, set) in followpos1 {
                            followpos.entry(key).or_default().extend(set);
                        }
                        // concatenate each copy's lastpos to the next
                        // copy's firstpos
                        for i in 0..m - 1 {
                            for k in lastpos.iter() {
                                let entry = followpos
                                    .entry(k.pos().iter(*iter * i))
                                    .or_default();
                                for j in pfirstpos.iter() {
                                    entry.insert(j.iter(*iter * i + *iter));
                                }
                            }
                        }
                        if unlimited {
                            for k in lastpos.iter() {
                                let entry = followpos
                                    .entry(k.pos().iter(*iter * m - *iter))
                                    .or_default();
                                for j in pfirstpos.iter() {
                                    entry.insert(j.iter(*iter * m - *iter));
                                }
                            }
                        }
                        if nullable1 {
                            // a nullable fragment exposes every copy's
                            // firstpos
                            for i in 1..m {
                                for k in pfirstpos.iter() {
                                    firstpos.insert(k.iter(*iter * i));
                                }
                            }
                        }
                        // copies n-1..m-1 are optional exits; all copies
                        // when the whole repeat is nullable
                        let mut lastpos1 = Positions::new();
                        let start = if *nullable { 0 } else { n - 1 };
                        for i in start..m {
                            for k in lastpos.iter() {
                                lastpos1.insert(k.iter(*iter * i));
                            }
                        }
                        std::mem::swap(lastpos, &mut lastpos1);
                        *iter *= m;
                    }
                } else {
                    // zero range {0} erases the fragment
                    firstpos.clear();
                    lastpos.clear();
                    lazypos.clear();
                }
            } else {
                self.report(Error::syntax(
                    "malformed range {min,max}",
                    *loc,
                ))?;
            }
        } else if c == b'}' {
            self.report(Error::syntax("missing {", *loc))?;
            *loc += 1;
        }
        Ok(())
    }

    /// Atoms: groups, bracket lists, quoted spans, comments and leaves.
    #[allow(clippy::too_many_arguments)]
    fn parse4(
        &mut self,
        begin: bool,
        loc: &mut Location,
        firstpos: &mut Positions,
        lastpos: &mut Positions,
        nullable: &mut bool,
        followpos: &mut Follow,
        lazypos: &mut Positions,
        modifiers: &mut ModMap,
        lookahead: &mut Ranges,
        iter: &mut Index,
    ) -> Result<()> {
        trace!("parse4 at {}", loc);
        firstpos.clear();
        lastpos.clear();
        *nullable = true;
        lazypos.clear();
        *iter = 1;
        let c = self.at(*loc);
        if c == b'(' {
            *loc += 1;
            let mut cc = c;
            if self.at(*loc) == b'?' {
                *loc += 1;
                let mut c = self.at(*loc);
                cc = c;
                if c == b'#' {
                    // (?# comment
                    loop {
                        *loc += 1;
                        c = self.at(*loc);
                        if c == 0 || c == b')' {
                            break;
                        }
                    }
                    cc = c;
                    if c == b')' {
                        *loc += 1;
                    }
                } else if c == b'^' {
                    // (?^ negative pattern: match and ignore
                    *loc += 1;
                    self.parse1(
                        begin, loc, firstpos, lastpos, nullable, followpos,
                        lazypos, modifiers, lookahead, iter,
                    )?;
                    for p in lastpos.iter() {
                        followpos
                            .entry(p.pos())
                            .or_default()
                            .insert(Position::rule(0).accept(true));
                    }
                } else if c == b'=' {
                    // (?= lookahead; the open paren is the head marker
                    let l_pos = Position::new(*loc - 2);
                    *loc += 1;
                    self.parse1(
                        begin, loc, firstpos, lastpos, nullable, followpos,
                        lazypos, modifiers, lookahead, iter,
                    )?;
                    firstpos.insert(l_pos);
                    if *nullable {
                        lastpos.insert(l_pos);
                    }
                    // nested lookaheads are not recorded twice
                    if !lookahead.overlaps(l_pos.loc(), *loc) {
                        lookahead.insert(l_pos.loc(), *loc);
                    }
                    let stop = Position::new(*loc).ticked(true);
                    for p in lastpos.iter() {
                        followpos.entry(p.pos()).or_default().insert(stop);
                    }
                    lastpos.insert(stop);
                    if *nullable {
                        firstpos.insert(stop);
                        lastpos.insert(l_pos);
                    }
                } else if c == b':' {
                    *loc += 1;
                    self.parse1(
                        begin, loc, firstpos, lastpos, nullable, followpos,
                        lazypos, modifiers, lookahead, iter,
                    )?;
                } else {
                    // (?imqsx inline modifiers, local or global
                    let m_loc = *loc;
                    let saved = self.opts.clone();
                    loop {
                        match c {
                            b'i' => self.opts.i = true,
                            b'l' => self.opts.l = true,
                            b'm' => self.opts.m = true,
                            b'q' => self.opts.q = true,
                            b's' => self.opts.s = true,
                            b'x' => self.opts.x = true,
                            _ => self.report(Error::syntax(
                                "unrecognized modifier",
                                *loc,
                            ))?,
                        }
                        *loc += 1;
                        c = self.at(*loc);
                        if c == 0 || c == b':' || c == b')' {
                            break;
                        }
                    }
                    cc = c;
                    if c != 0 {
                        *loc += 1;
                    }
                    if m_loc == 2 && c == b')' {
                        // (?imqsx) opening the pattern applies globally
                        self.parse2(
                            begin, loc, firstpos, lastpos, nullable,
                            followpos, lazypos, modifiers, lookahead, iter,
                        )?;
                    } else {
                        self.parse1(
                            begin, loc, firstpos, lastpos, nullable,
                            followpos, lazypos, modifiers, lookahead, iter,
                        )?;
                        let mut m_loc = m_loc;
                        loop {
                            let mc = self.at(m_loc);
                            m_loc += 1;
                            if mc != 0
                                && mc != b'q'
                                && mc != b'x'
                                && mc != b':'
                                && mc != b')'
                            {
                                modifiers
                                    .entry(mc)
                                    .or_default()
                                    .insert(m_loc, *loc);
                            }
                            if mc == 0 || mc == b':' || mc == b')' {
                                break;
                            }
                        }
                        self.opts.i = saved.i;
                        self.opts.q = saved.q;
                        self.opts.m = saved.m;
                        self.opts.s = saved.s;
                        self.opts.x = saved.x;
                    }
                }
            } else {
                self.parse1(
                    begin, loc, firstpos, lastpos, nullable, followpos,
                    lazypos, modifiers, lookahead, iter,
                )?;
            }
            if cc != b')' {
                if self.at(*loc) == b')' {
                    *loc += 1;
                } else {
                    self.report(Error::syntax("missing )", *loc))?;
                }
            }
        } else if c == b'[' {
            // bracket list: only scanned for balance here; the semantic
            // walk happens at compile time
            firstpos.insert(Position::new(*loc));
            lastpos.insert(Position::new(*loc));
            *nullable = false;
            *loc += 1;
            let mut c = self.at(*loc);
            if c == b'^' {
                *loc += 1;
                c = self.at(*loc);
            }
            while c != 0 {
                if c == b'[' && self.at(*loc + 1) == b':' {
                    if let Some(c_loc) = self.find_at(*loc + 2, b':') {
                        if self.at(c_loc + 1) == b']' {
                            *loc = c_loc + 1;
                        }
                    }
                }
                *loc += 1;
                c = self.at(*loc);
                if c == b']' {
                    *loc += 1;
                    break;
                }
            }
            if c == 0 {
                self.report(Error::syntax("missing ]", *loc))?;
            }
        } else if (c == b'"' && self.opts.q) || self.escape_at(*loc) == b'Q'
        {
            // quoted span: positions chain through the follow map directly
            let quoted = c == b'"';
            if !quoted {
                *loc += 1;
            }
            let q_loc = *loc;
            *loc += 1;
            let mut c = self.at(*loc);
            let done = |parser: &Parser, c: u8, loc: Location| {
                c == 0
                    || (quoted && c == b'"')
                    || (!quoted
                        && c == parser.opts.e
                        && parser.at(loc + 1) == b'E')
            };
            if !done(self, c, *loc) {
                firstpos.insert(Position::new(*loc));
                let mut p = Position::NPOS;
                loop {
                    if c == b'\\' && self.at(*loc + 1) == b'"' && quoted {
                        *loc += 1;
                    }
                    if !p.is_npos() {
                        followpos
                            .entry(p.pos())
                            .or_default()
                            .insert(Position::new(*loc));
                    }
                    p = Position::new(*loc);
                    *loc += 1;
                    c = self.at(*loc);
                    if done(self, c, *loc) {
                        break;
                    }
                }
                lastpos.insert(p);
                *nullable = false;
            }
            modifiers.entry(b'q').or_default().insert(q_loc, *loc);
            if c != 0 {
                if !quoted {
                    *loc += 1;
                }
                if self.at(*loc) != 0 {
                    *loc += 1;
                }
            } else {
                self.report(Error::syntax(
                    if quoted { "missing \"" } else { "missing \\E" },
                    *loc,
                ))?;
            }
        } else if c == b'#' && self.opts.x {
            // free-spacing line comment
            *loc += 1;
            let mut c = self.at(*loc);
            while c != 0 && c != b'\n' {
                *loc += 1;
                c = self.at(*loc);
            }
            if c == b'\n' {
                *loc += 1;
            }
        } else if c == b'/'
            && self.opts.l
            && self.opts.x
            && self.at(*loc + 1) == b'*'
        {
            // /* ... */ comment in free-spacing lookahead mode
            *loc += 2;
            loop {
                let c = self.at(*loc);
                if c == 0 {
                    self.report(Error::syntax("missing */", *loc))?;
                    break;
                }
                if c == b'*' && self.at(*loc + 1) == b'/' {
                    *loc += 2;
                    break;
                }
                *loc += 1;
            }
        } else if is_space(c) && self.opts.x {
            *loc += 1;
        } else if c != 0
            && c != b'|'
            && c != b')'
            && c != b'?'
            && c != b'*'
            && c != b'+'
        {
            if begin
                && (c == b'$' || self.escapes_at(*loc, b"AZBb<>ij") != 0)
            {
                self.report(Error::syntax("empty pattern", *loc + 1))?;
            }
            if self.opts.e == 0 && c == b'\\' {
                self.report(Error::syntax(
                    "escape character is disabled",
                    *loc,
                ))?;
            }
            firstpos.insert(Position::new(*loc));
            lastpos.insert(Position::new(*loc));
            *nullable = false;
            self.parse_esc(loc)?;
        } else if c == b'*' || c == b'+' || c == b'?' {
            self.report(Error::repeat(
                "quantifier without a preceding pattern",
                *loc,
            ))?;
        } else if !begin || c != 0 {
            // an empty top-level pattern is permitted; empty subpatterns
            // are not
            self.report(Error::syntax("empty pattern", *loc))?;
        }
        Ok(())
    }

    /// Scan past an escape sequence, validating its shape.
    fn parse_esc(&self, loc: &mut Location) -> Result<()> {
        let first = self.at(*loc);
        *loc += 1;
        if self.opts.e == 0 || first != self.opts.e {
            return Ok(());
        }
        let c = self.at(*loc);
        if c == 0 {
            return Ok(());
        }
        if c == b'0' {
            *loc += 1;
            let mut digits = 0;
            while digits < 3 && self.at(*loc).is_ascii_digit() {
                *loc += 1;
                digits += 1;
            }
        } else if c == b'p' && self.at(*loc + 1) == b'{' {
            *loc += 1;
            loop {
                *loc += 1;
                if !self.at(*loc).is_ascii_alphanumeric() {
                    break;
                }
            }
            if self.at(*loc) == b'}' {
                *loc += 1;
            } else {
                self.report(Error::syntax("malformed \\p{}", *loc))?;
            }
        } else if c == b'u' && self.at(*loc + 1) == b'{' {
            *loc += 1;
            loop {
                *loc += 1;
                if !self.at(*loc).is_ascii_hexdigit() {
                    break;
                }
            }
            if self.at(*loc) == b'}' {
                *loc += 1;
            } else {
                self.report(Error::syntax("malformed \\u{}", *loc))?;
            }
        } else if c == b'x' && self.at(*loc + 1) == b'{' {
            *loc += 1;
            loop {
                *loc += 1;
                if !self.at(*loc).is_ascii_hexdigit() {
                    break;
                }
            }
            if self.at(*loc) == b'}' {
                *loc += 1;
            } else {
                self.report(Error::syntax("malformed \\x{}", *loc))?;
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
            } else {
                self.report(Error::syntax("malformed \\c", *loc))?;
            }
        }
        Ok(())
    }
}
