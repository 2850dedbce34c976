use byteorder::{BigEndian, LittleEndian, NativeEndian};
use log::debug;

use crate::builder::Options;
use crate::determinize::Determinizer;
use crate::encode::{encode, to_bytes, Opcode};
use crate::error::Result;
use crate::export;
use crate::nfa::Parser;
use crate::position::{Index, Location};

/// A compiled pattern: a byte-oriented DFA program ready for a matcher
/// runtime.
///
/// Compilation runs the whole pipeline up front: the recursive-descent
/// parser computes the position sets of the pattern, subset construction
/// turns them into a DFA, and the encoder linearizes the DFA into the
/// opcode array described in [`Opcode`]. All intermediate structures are
/// torn down before the constructor returns; a `Pattern` owns only the
/// source, the program and its small accept tables, and is safe to share
/// across matcher threads read-only.
///
/// ```
/// use regex_fsm::Pattern;
///
/// let pattern = Pattern::new("a|b").unwrap();
/// assert_eq!(pattern.size(), 2);
/// assert!(pattern.reachable(1));
/// assert!(pattern.reachable(2));
/// ```
#[derive(Clone, Debug)]
pub struct Pattern {
    rex: String,
    opts: Options,
    end: Vec<Location>,
    acc: Vec<bool>,
    code: Vec<Opcode>,
    nodes: usize,
    edges: usize,
}

impl Pattern {
    /// Compile a pattern with the default options.
    pub fn new(pattern: &str) -> Result<Pattern> {
        Pattern::with_options(pattern, "")
    }

    /// Compile a pattern with an option string.
    ///
    /// The option string concatenates single-letter tokens: `b` disables
    /// escapes inside bracket lists, `e=C` sets the escape character
    /// (`e=;` disables escapes), `i` makes matching case-insensitive, `l`
    /// enables `/` trailing context, `m` makes `^` and `$` match at line
    /// boundaries, `q` quotes `"..."` literally, `r` raises errors, `s`
    /// lets `.` match newline, `w` emits diagnostics, `x` enables free
    /// spacing, `n=NAME` names the emitted FSM and `f=FILE,...` requests
    /// exports (`.gv` Graphviz, `.h`/`.hpp`/`.cc`/`.cpp` opcode source).
    pub fn with_options(pattern: &str, opt: &str) -> Result<Pattern> {
        let mut opts = Options::default();
        opts.parse_flags(opt);
        Pattern::compile(pattern.to_string(), opts)
    }

    pub(crate) fn compile(rex: String, opts: Options) -> Result<Pattern> {
        debug!("compile pattern {:?}", rex);
        let mut nfa = Parser::new(&rex, opts).parse()?;
        let mut dfa = Determinizer::new(&rex, &mut nfa).build()?;
        export::export_dfa(&nfa.opts, &dfa);
        dfa.compact();
        let code = encode(&mut dfa)?;
        export::export_code(&nfa.opts, &code);
        let nodes = dfa.len();
        let edges = dfa.edge_count;
        Ok(Pattern {
            rex,
            opts: nfa.opts,
            end: nfa.end,
            acc: dfa.acc,
            nodes,
            edges,
            code,
        })
    }

    /// The pattern source.
    pub fn source(&self) -> &str {
        &self.rex
    }

    /// The number of top-level alternatives (rules).
    pub fn size(&self) -> usize {
        self.end.len()
    }

    /// The source of the given 1-based alternative; rule 0 names the
    /// whole pattern.
    pub fn subpattern(&self, choice: Index) -> &str {
        if choice == 0 {
            return &self.rex;
        }
        let choice = choice as usize;
        if choice > self.end.len() {
            return "";
        }
        let end = (self.end[choice - 1] as usize).min(self.rex.len());
        let start = if choice >= 2 {
            (self.end[choice - 2] as usize + 1).min(end)
        } else {
            0
        };
        self.rex.get(start..end).unwrap_or("")
    }

    /// Whether the accept state of the given 1-based rule is reachable.
    pub fn reachable(&self, rule: Index) -> bool {
        rule >= 1
            && (rule as usize) <= self.acc.len()
            && self.acc[rule as usize - 1]
    }

    /// The compiled opcode program.
    pub fn opcodes(&self) -> &[Opcode] {
        &self.code
    }

    /// The number of DFA states behind the program.
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// The number of input characters covered by all DFA edges.
    pub fn edges(&self) -> usize {
        self.edges
    }

    /// The name given to the emitted FSM, if any.
    pub fn name(&self) -> &str {
        &self.opts.n
    }

    /// Serialize the program in little-endian byte order.
    pub fn to_bytes_little_endian(&self) -> Vec<u8> {
        to_bytes::<LittleEndian>(&self.code)
    }

    /// Serialize the program in big-endian byte order.
    pub fn to_bytes_big_endian(&self) -> Vec<u8> {
        to_bytes::<BigEndian>(&self.code)
    }

    /// Serialize the program in native byte order.
    pub fn to_bytes_native_endian(&self) -> Vec<u8> {
        to_bytes::<NativeEndian>(&self.code)
    }
}
