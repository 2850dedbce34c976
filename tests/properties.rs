use pretty_assertions::assert_eq;

use regex_fsm::{is_meta, ErrorKind, Pattern, IMAX};

use crate::util::{decode, step};

const SAMPLES: &[(&str, &str)] = &[
    ("a|b", "r"),
    ("a*b", "r"),
    ("(a|b)*?b", "r"),
    ("a{2,3}", "r"),
    ("foo/bar", "rl"),
    ("[A-Za-z_][A-Za-z0-9_]*", "r"),
    ("abc", "ri"),
    (r"\d+\.\d+|0x[[:xdigit:]]+", "r"),
    ("(?i)select|insert|update", "r"),
    ("((a|b)*?b){2}", "r"),
    ("(a|b)??(a|b)??aa", "r"),
    (r"^-- .*$", "rm"),
];

#[test]
fn compilation_is_deterministic() {
    for &(pattern, flags) in SAMPLES {
        let a = Pattern::with_options(pattern, flags).unwrap();
        let b = Pattern::with_options(pattern, flags).unwrap();
        assert_eq!(a.opcodes(), b.opcodes(), "{}", pattern);
        assert_eq!(
            a.to_bytes_little_endian(),
            b.to_bytes_little_endian(),
            "{}",
            pattern
        );
    }
}

#[test]
fn every_byte_resolves_in_every_state() {
    for &(pattern, flags) in SAMPLES {
        let p = Pattern::with_options(pattern, flags).unwrap();
        let states = decode(p.opcodes());
        for state in &states {
            for byte in 0..=0xFFu16 {
                let covered = state.gotos.iter().any(|&(lo, hi, _)| {
                    !is_meta(lo) && lo <= byte && byte <= hi
                });
                assert!(
                    covered,
                    "{}: byte {:#x} uncovered at pc {}",
                    pattern, byte, state.pc
                );
            }
        }
    }
}

#[test]
fn live_edges_are_pairwise_disjoint() {
    for &(pattern, flags) in SAMPLES {
        let p = Pattern::with_options(pattern, flags).unwrap();
        for state in decode(p.opcodes()) {
            let live: Vec<_> = state
                .gotos
                .iter()
                .filter(|&&(_, _, target)| target != IMAX)
                .collect();
            for (i, &&(lo_a, hi_a, _)) in live.iter().enumerate() {
                for &&(lo_b, hi_b, _) in live.iter().skip(i + 1) {
                    assert!(
                        hi_a < lo_b || hi_b < lo_a,
                        "{}: [{:#x},{:#x}] overlaps [{:#x},{:#x}] at pc {}",
                        pattern,
                        lo_a,
                        hi_a,
                        lo_b,
                        hi_b,
                        state.pc
                    );
                }
            }
        }
    }
}

#[test]
fn the_halt_catch_all_never_shadows_a_live_edge() {
    // the trailing HALT edge runs to 0xFF and may span live ranges; it
    // is emitted last, so every byte of a live range still reaches that
    // range's target
    for &(pattern, flags) in SAMPLES {
        let p = Pattern::with_options(pattern, flags).unwrap();
        let states = decode(p.opcodes());
        for state in &states {
            for &(lo, hi, target) in &state.gotos {
                if target == IMAX || is_meta(lo) {
                    continue;
                }
                for byte in [lo, hi] {
                    assert_eq!(
                        step(&states, state.pc, byte as u8),
                        Some(target),
                        "{}: byte {:#x} misrouted at pc {}",
                        pattern,
                        byte,
                        state.pc
                    );
                }
            }
        }
    }
}

#[test]
fn goto_targets_are_state_starts() {
    for &(pattern, flags) in SAMPLES {
        let p = Pattern::with_options(pattern, flags).unwrap();
        let states = decode(p.opcodes());
        for state in &states {
            for &(_, _, target) in &state.gotos {
                if target != IMAX {
                    assert!(
                        states.iter().any(|s| s.pc == target),
                        "{}: target {} is no state start",
                        pattern,
                        target
                    );
                }
            }
        }
    }
}

#[test]
fn decoded_state_count_matches_the_graph() {
    for &(pattern, flags) in SAMPLES {
        let p = Pattern::with_options(pattern, flags).unwrap();
        let states = decode(p.opcodes());
        assert_eq!(states.len(), p.nodes(), "{}", pattern);
    }
}

#[test]
fn accept_is_the_minimum_rule() {
    // both rules accept the same input; the state takes the lower one
    let p = Pattern::with_options("a|a", "r").unwrap();
    let states = decode(p.opcodes());
    let takes: Vec<_> =
        states.iter().filter_map(|s| s.take).collect();
    assert_eq!(takes, vec![1]);
    assert!(p.reachable(1));
    assert!(!p.reachable(2));
}

#[test]
fn byte_range_words_round_trip() {
    for &(pattern, flags) in SAMPLES {
        let p = Pattern::with_options(pattern, flags).unwrap();
        for op in p.opcodes() {
            let word = op.to_u32();
            assert_eq!(regex_fsm::Opcode::from_u32(word), *op);
            // exactly one variant claims each word
            let variants = [
                op.is_goto(),
                op.is_meta_goto(),
                op.is_take(),
                op.is_redo(),
                op.is_tail(),
                op.is_head(),
            ];
            assert_eq!(
                variants.iter().filter(|&&v| v).count(),
                1,
                "{}: ambiguous word {:#010x}",
                pattern,
                word
            );
        }
    }
}

#[test]
fn serialized_bytes_reassemble_to_the_program() {
    use byteorder::{ByteOrder, LittleEndian};
    let p = Pattern::with_options("a*b|c", "r").unwrap();
    let bytes = p.to_bytes_little_endian();
    let words: Vec<u32> = bytes
        .chunks(4)
        .map(LittleEndian::read_u32)
        .collect();
    let original: Vec<u32> =
        p.opcodes().iter().map(|op| op.to_u32()).collect();
    assert_eq!(words, original);
}

#[test]
fn errors_carry_their_location() {
    let cases: &[(&str, u32)] = &[
        ("(ab", 3),
        ("a||b", 2),
        ("*a", 0),
        ("a{3,2}", 5),
    ];
    for &(pattern, loc) in cases {
        let err = Pattern::with_options(pattern, "r").unwrap_err();
        assert_eq!(err.loc(), loc, "{}", pattern);
        assert!((err.loc() as usize) <= pattern.len());
    }
}

#[test]
fn repeat_errors_are_distinct_from_syntax_errors() {
    let err = Pattern::with_options("+a", "r").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Repeat(_)));
    let err = Pattern::with_options("(a", "r").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Syntax(_)));
}

#[test]
fn soft_errors_still_compile_without_r() {
    for pattern in &["(ab", "[x", "a{2,"] {
        assert!(Pattern::new(pattern).is_ok(), "{}", pattern);
    }
}
