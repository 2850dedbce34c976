use std::fs::{File, OpenOptions};
use std::io::{self, Write};

use log::warn;

use crate::builder::Options;
use crate::classes::{is_meta, meta_label};
use crate::dfa::{Dfa, DEAD};
use crate::encode::{DisplayByte, Opcode};

/// Write the Graphviz exports requested by the `f` option. Runs against
/// the DFA before compaction, so every edge shows its original range.
/// Failures are logged and never fail the compilation.
pub(crate) fn export_dfa(opts: &Options, dfa: &Dfa) {
    for filename in &opts.f {
        if !filename.ends_with(".gv") {
            continue;
        }
        match open_target(filename) {
            Ok(mut w) => {
                if let Err(err) = write_dot(&mut w, opts, dfa) {
                    warn!("cannot export {}: {}", filename, err);
                }
            }
            Err(err) => warn!("cannot export {}: {}", filename, err),
        }
    }
}

/// Write the opcode-array source exports requested by the `f` option.
pub(crate) fn export_code(opts: &Options, code: &[Opcode]) {
    if code.is_empty() {
        return;
    }
    for filename in &opts.f {
        let source = [".h", ".hpp", ".cc", ".cpp"]
            .iter()
            .any(|suffix| filename.ends_with(suffix));
        if !source {
            continue;
        }
        match open_target(filename) {
            Ok(mut w) => {
                if let Err(err) = write_code(&mut w, opts, code) {
                    warn!("cannot export {}: {}", filename, err);
                }
            }
            Err(err) => warn!("cannot export {}: {}", filename, err),
        }
    }
}

/// A `stdout.`-prefixed name writes to stdout; a `+` prefix appends.
fn open_target(filename: &str) -> io::Result<Box<dyn Write>> {
    if filename.starts_with("stdout.") {
        Ok(Box::new(io::stdout()))
    } else if let Some(path) = filename.strip_prefix('+') {
        Ok(Box::new(OpenOptions::new().append(true).create(true).open(path)?))
    } else {
        Ok(Box::new(File::create(filename)?))
    }
}

fn fsm_name(opts: &Options) -> &str {
    if opts.n.is_empty() {
        "FSM"
    } else {
        &opts.n
    }
}

/// Render the DFA as a Graphviz digraph. Accept states get a double
/// periphery, redo states and meta edges render dashed. Debug builds
/// label every node with its defining position set.
pub(crate) fn write_dot<W: Write>(
    w: &mut W,
    opts: &Options,
    dfa: &Dfa,
) -> io::Result<()> {
    write!(
        w,
        "digraph {} {{\n\t\trankdir=LR;\n\t\tconcentrate=true;\n\t\tnode \
         [fontname=\"ArialNarrow\"];\n\t\tedge [fontname=\"Courier\"];\n\n\t\t\
         init [root=true,peripheries=0,label=\"{}\",fontname=\"Courier\"];\
         \n\t\tinit -> N0;\n",
        fsm_name(opts),
        opts.n
    )?;
    for (id, state) in dfa.states.iter().enumerate() {
        if id == 0 {
            write!(w, "\n/*START*/\t")?;
        }
        if state.redo {
            write!(w, "\n/*REDO*/\t")?;
        } else if state.accept > 0 {
            write!(w, "\n/*ACCEPT {}*/\t", state.accept)?;
        }
        for head in &state.heads {
            write!(w, "\n/*HEAD {}*/\t", head)?;
        }
        for tail in &state.tails {
            write!(w, "\n/*TAIL {}*/\t", tail)?;
        }
        if id != 0
            && state.accept == 0
            && state.heads.is_empty()
            && state.tails.is_empty()
        {
            write!(w, "\n/*STATE*/\t")?;
        }
        write!(w, "N{} [label=\"", id)?;
        if cfg!(debug_assertions) {
            let mut sep = "";
            for p in state.positions.iter() {
                write!(w, "{}{:?}", sep, p)?;
                sep = " ";
            }
            if (state.accept > 0 && !state.redo)
                || !state.heads.is_empty()
                || !state.tails.is_empty()
            {
                write!(w, "\\n")?;
            }
        }
        if state.accept > 0 && !state.redo {
            write!(w, "[{}]", state.accept)?;
        }
        for tail in &state.tails {
            write!(w, "{}>", tail)?;
        }
        for head in &state.heads {
            write!(w, "<{}", head)?;
        }
        if state.redo {
            writeln!(w, "\",style=dashed,peripheries=1];")?;
        } else if state.accept > 0 {
            writeln!(w, "\",peripheries=2];")?;
        } else if !state.heads.is_empty() {
            writeln!(w, "\",style=dashed,peripheries=2];")?;
        } else {
            writeln!(w, "\"];")?;
        }
        for (&lo, &(hi, target)) in state.edges.iter() {
            if target == DEAD {
                continue;
            }
            if !is_meta(lo) {
                write!(w, "\t\tN{} -> N{} [label=\"", id, target)?;
                write!(w, "{}", DotByte(lo as u8))?;
                if lo != hi {
                    write!(w, "-{}", DotByte(hi as u8))?;
                }
                writeln!(w, "\"];")?;
            } else {
                for meta in lo..=hi {
                    writeln!(
                        w,
                        "\t\tN{} -> N{} [label=\"{}\",style=\"dashed\"];",
                        id,
                        target,
                        meta_label(meta)
                    )?;
                }
            }
        }
        if state.redo {
            writeln!(
                w,
                "\t\tN{} -> R{};\n\t\tR{} [peripheries=0,label=\"redo\"];",
                id, id, id
            )?;
        }
    }
    writeln!(w, "}}")
}

/// Render the opcode array as C/C++ source with a per-line disassembly
/// comment.
pub(crate) fn write_code<W: Write>(
    w: &mut W,
    opts: &Options,
    code: &[Opcode],
) -> io::Result<()> {
    write!(
        w,
        "#ifndef FSM_CODE_DECL\n#define FSM_CODE_DECL static const unsigned \
         int\n#endif\n\nFSM_CODE_DECL fsm_code_{}[{}] =\n{{\n",
        fsm_name(opts),
        code.len()
    )?;
    for (pc, op) in code.iter().enumerate() {
        writeln!(w, "  0x{:08X}, // {}: {}", op.to_u32(), pc, op)?;
    }
    write!(w, "}};\n\n")
}

/// Byte rendering inside DOT labels, where `"` and `\` need their own
/// escapes.
struct DotByte(u8);

impl std::fmt::Display for DotByte {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let b = self.0;
        match b {
            0x07..=0x0D => {
                write!(f, "\\\\{}", b"abtnvfr"[(b - 0x07) as usize] as char)
            }
            b'"' => write!(f, "\\\""),
            b'\\' => write!(f, "\\\\"),
            _ if b.is_ascii_graphic() => write!(f, "{}", b as char),
            0..=7 => write!(f, "\\\\{}", b),
            _ => write!(f, "\\\\x{:02x}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Options;
    use crate::encode::Opcode;
    use crate::position::IMAX;

    fn options(flags: &str) -> Options {
        let mut opts = Options::default();
        opts.parse_flags(flags);
        opts
    }

    #[test]
    fn code_export_carries_disassembly() {
        let code = vec![
            Opcode::take(1),
            Opcode::goto_byte(b'a', b'z', 0),
            Opcode::goto_byte(0, 0xFF, IMAX),
        ];
        let mut out = vec![];
        write_code(&mut out, &options("n=scanner"), &code).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("fsm_code_scanner[3]"));
        assert!(text.contains("// 0: TAKE 1"));
        assert!(text.contains("// 1: GOTO 0 ON a-z"));
        assert!(text.contains("// 2: HALT ON"));
    }

    #[test]
    fn dot_export_names_the_graph() {
        use crate::determinize::Determinizer;
        use crate::nfa::Parser;

        let opts = options("n=lexer;r");
        let mut nfa =
            Parser::new("ab", opts.clone()).parse().unwrap();
        let dfa = Determinizer::new("ab", &mut nfa).build().unwrap();
        let mut out = vec![];
        write_dot(&mut out, &opts, &dfa).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("digraph lexer {"));
        assert!(text.contains("init -> N0;"));
        assert!(text.contains("[label=\"a\"];"));
        assert!(text.contains("/*ACCEPT 1*/"));
        assert!(text.ends_with("}\n"));
    }
}
