/*!
The opcode format and the DFA encoder.

A compiled pattern is an array of fixed-width 32-bit opcodes. The matcher
executes the array directly: it enters a state at its first opcode,
handles the bookkeeping prefix, then scans the GOTO suffix for the first
range containing its input byte.

Encoding
--------

The top two bytes of a word distinguish the variants. A byte-range GOTO
carries its bounds there, and since a range always has `lo <= hi`, every
tag byte pairs with a smaller second byte and stays disjoint from the
GOTO space:

```text
GOTO lo-hi -> pc     [ lo:8   | hi:8   | pc:16   ]   lo <= hi
GOTO meta  -> pc     [ 0xFF   | code:8 | pc:16   ]   code = meta - 0x100
TAKE rule            [ 0xFE   | 0x00   | rule:16 ]
REDO                 [ 0xFD   | 0x00   | 0x0000  ]
TAIL id              [ 0xFC   | 0x00   | id:16   ]
HEAD id              [ 0xFB   | 0x00   | id:16   ]
```

A `pc` equal to `IMAX` means HALT: there is no transition and the last
TAKE decides. Meta GOTOs are emitted one per meta value; their code byte
lies in `1..=12`, well below `0xFF`, so they never collide with a GOTO
on the byte `0xFF` itself.

Every state is laid out in the same order: REDO or TAKE first, then
TAILs, then HEADs, then the edges in reverse order of their low bound.
The live edges of a state are pairwise disjoint; only the trailing
catch-all HALT edge, which runs from the first unrouted byte to 0xFF,
may span live ranges. The reverse emission order places it last, so the
matcher's first-containing-range scan reaches it only for bytes no live
edge claims.
*/

use std::fmt;

use byteorder::ByteOrder;
use log::debug;

use crate::classes::{is_meta, meta_label, Char, META_MIN};
use crate::dfa::{Dfa, DEAD};
use crate::error::{Error, Result};
use crate::position::{Index, IMAX};

const TAG_META: u32 = 0xFF;
const TAG_TAKE: u32 = 0xFE;
const TAG_REDO: u32 = 0xFD;
const TAG_TAIL: u32 = 0xFC;
const TAG_HEAD: u32 = 0xFB;

/// One 32-bit instruction of a compiled pattern.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct Opcode(u32);

impl Opcode {
    pub(crate) fn goto_byte(lo: u8, hi: u8, pc: Index) -> Opcode {
        debug_assert!(lo <= hi);
        Opcode(((lo as u32) << 24) | ((hi as u32) << 16) | pc as u32)
    }

    pub(crate) fn goto_meta(meta: Char, pc: Index) -> Opcode {
        debug_assert!(is_meta(meta));
        let code = (meta - META_MIN) as u32;
        Opcode((TAG_META << 24) | (code << 16) | pc as u32)
    }

    pub(crate) fn take(rule: Index) -> Opcode {
        Opcode((TAG_TAKE << 24) | rule as u32)
    }

    pub(crate) fn redo() -> Opcode {
        Opcode(TAG_REDO << 24)
    }

    pub(crate) fn tail(id: Index) -> Opcode {
        Opcode((TAG_TAIL << 24) | id as u32)
    }

    pub(crate) fn head(id: Index) -> Opcode {
        Opcode((TAG_HEAD << 24) | id as u32)
    }

    #[inline]
    fn b1(self) -> u32 {
        self.0 >> 24
    }

    #[inline]
    fn b2(self) -> u32 {
        (self.0 >> 16) & 0xFF
    }

    /// Whether this is a GOTO on a byte range.
    #[inline]
    pub fn is_goto(self) -> bool {
        self.b1() <= self.b2()
    }

    /// Whether this is a GOTO on a meta character.
    #[inline]
    pub fn is_meta_goto(self) -> bool {
        self.b1() == TAG_META && self.b2() < TAG_META
    }

    #[inline]
    pub fn is_take(self) -> bool {
        self.b1() == TAG_TAKE && self.b2() == 0
    }

    #[inline]
    pub fn is_redo(self) -> bool {
        self.0 == TAG_REDO << 24
    }

    #[inline]
    pub fn is_tail(self) -> bool {
        self.b1() == TAG_TAIL && self.b2() == 0
    }

    #[inline]
    pub fn is_head(self) -> bool {
        self.b1() == TAG_HEAD && self.b2() == 0
    }

    /// Whether this GOTO has no live target.
    #[inline]
    pub fn is_halt(self) -> bool {
        (self.is_goto() || self.is_meta_goto()) && self.index() == IMAX
    }

    /// The low input unit of a GOTO: a byte, or a meta character.
    #[inline]
    pub fn lo(self) -> Char {
        if self.is_meta_goto() {
            META_MIN + self.b2() as Char
        } else {
            self.b1() as Char
        }
    }

    /// The high input unit of a GOTO.
    #[inline]
    pub fn hi(self) -> Char {
        if self.is_meta_goto() {
            self.lo()
        } else {
            self.b2() as Char
        }
    }

    /// The 16-bit payload: the target pc of a GOTO, the rule of a TAKE,
    /// or the lookahead ID of a HEAD/TAIL.
    #[inline]
    pub fn index(self) -> Index {
        (self.0 & 0xFFFF) as Index
    }

    #[inline]
    pub fn to_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_u32(word: u32) -> Opcode {
        Opcode(word)
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Opcode(0x{:08X}: {})", self.0, self)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_redo() {
            write!(f, "REDO")
        } else if self.is_take() {
            write!(f, "TAKE {}", self.index())
        } else if self.is_tail() {
            write!(f, "TAIL {}", self.index())
        } else if self.is_head() {
            write!(f, "HEAD {}", self.index())
        } else if self.is_meta_goto() {
            if self.index() == IMAX {
                write!(f, "HALT ON {}", meta_label(self.lo()))
            } else {
                write!(f, "GOTO {} ON {}", self.index(), meta_label(self.lo()))
            }
        } else if self.is_goto() {
            if self.index() == IMAX {
                write!(f, "HALT ON ")?;
            } else {
                write!(f, "GOTO {} ON ", self.index())?;
            }
            write!(f, "{}", DisplayByte(self.lo() as u8))?;
            if self.lo() != self.hi() {
                write!(f, "-{}", DisplayByte(self.hi() as u8))?;
            }
            Ok(())
        } else {
            write!(f, "0x{:08X}", self.0)
        }
    }
}

/// Renders a byte the way the disassembly and the exporters spell it.
pub(crate) struct DisplayByte(pub u8);

impl fmt::Display for DisplayByte {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = self.0;
        match b {
            0x07..=0x0D => {
                write!(f, "\\{}", b"abtnvfr"[(b - 0x07) as usize] as char)
            }
            b'\\' => write!(f, "'\\'"),
            _ if b.is_ascii_graphic() => write!(f, "{}", b as char),
            0..=7 => write!(f, "\\{}", b),
            _ => write!(f, "\\x{:02x}", b),
        }
    }
}

/// Linearize the DFA into the opcode array.
///
/// The first pass assigns every state its program counter, counts the
/// emitted words and installs the trailing HALT edge where the byte
/// cover starting at 0 stops short of 0xFF. The second pass emits the
/// words. Overflowing the pc field is a fatal error.
pub(crate) fn encode(dfa: &mut Dfa) -> Result<Vec<Opcode>> {
    let mut nop: u32 = 0;
    for state in &mut dfa.states {
        if nop >= IMAX as u32 {
            return Err(Error::code_overflow(0));
        }
        state.index = nop as Index;
        let mut cover: Char = 0;
        for (&lo, &(hi, _)) in state.edges.iter() {
            if lo == cover {
                cover = hi + 1;
            }
            nop += 1;
            if is_meta(lo) {
                nop += (hi - lo) as u32;
            }
        }
        if cover <= 0xFF {
            state.edges.insert(cover, (0xFF, DEAD));
            nop += 1;
        }
        nop += state.tails.len() as u32
            + state.heads.len() as u32
            + (state.accept > 0 || state.redo) as u32;
    }
    if nop > IMAX as u32 {
        return Err(Error::code_overflow(0));
    }
    let mut code = Vec::with_capacity(nop as usize);
    for state in &dfa.states {
        debug_assert_eq!(code.len(), state.index as usize);
        if state.redo {
            code.push(Opcode::redo());
        } else if state.accept > 0 {
            code.push(Opcode::take(state.accept));
        }
        for &id in &state.tails {
            code.push(Opcode::tail(id));
        }
        for &id in &state.heads {
            code.push(Opcode::head(id));
        }
        for (&lo, &(hi, target)) in state.edges.iter().rev() {
            let pc = if target == DEAD {
                IMAX
            } else {
                dfa.states[target as usize].index
            };
            if !is_meta(lo) {
                code.push(Opcode::goto_byte(lo as u8, hi as u8, pc));
            } else {
                for meta in lo..=hi {
                    code.push(Opcode::goto_meta(meta, pc));
                }
            }
        }
    }
    debug!("encode: {} opcodes over {} states", code.len(), dfa.len());
    Ok(code)
}

/// Serialize the opcode array in the requested byte order.
pub(crate) fn to_bytes<B: ByteOrder>(code: &[Opcode]) -> Vec<u8> {
    let mut bytes = vec![0u8; 4 * code.len()];
    for (i, op) in code.iter().enumerate() {
        B::write_u32(&mut bytes[4 * i..4 * i + 4], op.to_u32());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::{META_BOL, META_DED, META_IND};

    #[test]
    fn goto_round_trips() {
        let op = Opcode::goto_byte(b'a', b'z', 42);
        assert!(op.is_goto());
        assert!(!op.is_take() && !op.is_redo());
        assert_eq!(op.lo(), b'a' as Char);
        assert_eq!(op.hi(), b'z' as Char);
        assert_eq!(op.index(), 42);
        assert!(!op.is_halt());
        assert!(Opcode::goto_byte(0, 0xFF, IMAX).is_halt());
    }

    #[test]
    fn meta_goto_round_trips() {
        for meta in [META_BOL, META_IND, META_DED] {
            let op = Opcode::goto_meta(meta, 7);
            assert!(op.is_meta_goto());
            assert!(!op.is_goto());
            assert_eq!(op.lo(), meta);
            assert_eq!(op.hi(), meta);
            assert_eq!(op.index(), 7);
        }
    }

    #[test]
    fn tags_never_collide_with_byte_ranges() {
        // a range on the byte 0xFF itself is a GOTO, not a meta word
        let op = Opcode::goto_byte(0xFF, 0xFF, 3);
        assert!(op.is_goto());
        assert!(!op.is_meta_goto());
        // and the bookkeeping words are no GOTOs
        for op in [
            Opcode::take(1),
            Opcode::redo(),
            Opcode::tail(0),
            Opcode::head(0),
        ] {
            assert!(!op.is_goto());
            assert!(!op.is_meta_goto());
        }
        assert!(Opcode::take(1).is_take());
        assert!(Opcode::redo().is_redo());
        assert!(Opcode::tail(9).is_tail());
        assert!(Opcode::head(9).is_head());
    }

    #[test]
    fn disassembly_spells_ranges() {
        assert_eq!(Opcode::goto_byte(b'a', b'z', 3).to_string(), "GOTO 3 ON a-z");
        assert_eq!(Opcode::goto_byte(b'\n', b'\n', 0).to_string(), "GOTO 0 ON \\n");
        assert_eq!(
            Opcode::goto_byte(0, 0xFF, IMAX).to_string(),
            "HALT ON \\0-\\xff"
        );
        assert_eq!(Opcode::take(2).to_string(), "TAKE 2");
        assert_eq!(Opcode::goto_meta(META_BOL, 5).to_string(), "GOTO 5 ON BOL");
    }

    #[test]
    fn serialization_by_byte_order() {
        use byteorder::{BigEndian, LittleEndian};
        let code = [Opcode::take(1), Opcode::goto_byte(b'a', b'b', 2)];
        let le = to_bytes::<LittleEndian>(&code);
        let be = to_bytes::<BigEndian>(&code);
        assert_eq!(le.len(), 8);
        assert_eq!(&le[0..4], &[0x01, 0x00, 0x00, 0xFE]);
        assert_eq!(&be[4..8], &[0x61, 0x62, 0x00, 0x02]);
    }
}
