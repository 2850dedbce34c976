use std::collections::BTreeSet;

use regex_fsm::{is_meta, Char, Opcode, Pattern, IMAX};

/// One state reconstructed from the opcode stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedState {
    pub pc: u16,
    pub take: Option<u16>,
    pub redo: bool,
    pub heads: Vec<u16>,
    pub tails: Vec<u16>,
    /// (lo, hi, target pc); `IMAX` as target means halt. Ranges are in
    /// emission order, so the matcher takes the first one that contains
    /// its input.
    pub gotos: Vec<(Char, Char, u16)>,
}

/// Split the opcode stream back into states. State boundaries are the
/// entry point plus every live GOTO target.
pub fn decode(code: &[Opcode]) -> Vec<DecodedState> {
    let mut starts: BTreeSet<u16> = BTreeSet::new();
    starts.insert(0);
    for op in code {
        if (op.is_goto() || op.is_meta_goto()) && op.index() != IMAX {
            starts.insert(op.index());
        }
    }
    let starts: Vec<u16> = starts.into_iter().collect();
    let mut states = vec![];
    for (i, &pc) in starts.iter().enumerate() {
        let end =
            starts.get(i + 1).copied().unwrap_or(code.len() as u16);
        let mut state = DecodedState {
            pc,
            take: None,
            redo: false,
            heads: vec![],
            tails: vec![],
            gotos: vec![],
        };
        for &op in &code[pc as usize..end as usize] {
            if op.is_redo() {
                state.redo = true;
            } else if op.is_take() {
                state.take = Some(op.index());
            } else if op.is_tail() {
                state.tails.push(op.index());
            } else if op.is_head() {
                state.heads.push(op.index());
            } else {
                assert!(op.is_goto() || op.is_meta_goto());
                state.gotos.push((op.lo(), op.hi(), op.index()));
            }
        }
        states.push(state);
    }
    states
}

pub fn state_at(states: &[DecodedState], pc: u16) -> &DecodedState {
    states.iter().find(|s| s.pc == pc).expect("no state at pc")
}

/// The transition taken for a byte: the first emitted range containing
/// it. Returns `None` on halt.
pub fn step(states: &[DecodedState], pc: u16, byte: u8) -> Option<u16> {
    for &(lo, hi, target) in &state_at(states, pc).gotos {
        if is_meta(lo) {
            continue;
        }
        if lo <= byte as Char && byte as Char <= hi {
            return if target == IMAX { None } else { Some(target) };
        }
    }
    None
}

/// Walk the DFA over the input, reporting the last accept seen as
/// (consumed length, rule). Meta edges are ignored; patterns under test
/// that use them are checked structurally instead.
pub fn match_len(pattern: &Pattern, input: &[u8]) -> Option<(usize, u16)> {
    let states = decode(pattern.opcodes());
    let mut pc = 0u16;
    let mut best = None;
    if let Some(rule) = state_at(&states, pc).take {
        best = Some((0, rule));
    }
    for (i, &byte) in input.iter().enumerate() {
        pc = match step(&states, pc, byte) {
            None => break,
            Some(next) => next,
        };
        if let Some(rule) = state_at(&states, pc).take {
            best = Some((i + 1, rule));
        }
    }
    best
}

/// Whether the whole input matches some rule.
pub fn matches_fully(pattern: &Pattern, input: &[u8]) -> Option<u16> {
    match match_len(pattern, input) {
        Some((len, rule)) if len == input.len() => Some(rule),
        _ => None,
    }
}
