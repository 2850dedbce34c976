use std::fmt;

/// A single input unit seen by the compiled automaton.
///
/// Values `0..=0xFF` are literal input bytes. Values at and above
/// [`META_MIN`] are meta characters: pseudo-inputs standing for anchor and
/// word-boundary conditions that the matcher checks against its input
/// context rather than against a byte.
pub type Char = u16;

pub const META_MIN: Char = 0x100;
/// Non-word boundary at match begin (`\B` on an anchor position).
pub const META_NWB: Char = 0x101;
/// Non-word boundary at match end.
pub const META_NWE: Char = 0x102;
/// Begin of word at match begin (`\<`, `\b`).
pub const META_BWB: Char = 0x103;
/// End of word at match begin (`\>`, `\b`).
pub const META_EWB: Char = 0x104;
/// Begin of word at match end.
pub const META_BWE: Char = 0x105;
/// End of word at match end.
pub const META_EWE: Char = 0x106;
/// Begin of line (`^` in multi-line mode).
pub const META_BOL: Char = 0x107;
/// End of line (`$` in multi-line mode).
pub const META_EOL: Char = 0x108;
/// Begin of buffer (`\A`, `^`).
pub const META_BOB: Char = 0x109;
/// End of buffer (`\Z`, `$`).
pub const META_EOB: Char = 0x10A;
/// Indent boundary (`\i`).
pub const META_IND: Char = 0x10B;
/// Dedent boundary (`\j`).
pub const META_DED: Char = 0x10C;
pub const META_MAX: Char = 0x10C;

#[inline]
pub fn is_meta(c: Char) -> bool {
    c >= META_MIN
}

/// The display label of a meta character, as used by the exporters.
pub(crate) fn meta_label(c: Char) -> &'static str {
    match c {
        META_NWB => "NWB",
        META_NWE => "NWE",
        META_BWB => "BWB",
        META_EWB => "EWB",
        META_BWE => "BWE",
        META_EWE => "EWE",
        META_BOL => "BOL",
        META_EOL => "EOL",
        META_BOB => "BOB",
        META_EOB => "EOB",
        META_IND => "IND",
        META_DED => "DED",
        _ => "",
    }
}

/// A set of input units, stored as sorted disjoint closed ranges.
///
/// Ranges are kept maximally coalesced, with one exception: a byte range
/// never fuses with a meta range across the `0xFF`/`0x100` boundary, so
/// bytes and meta characters never share a range.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Chars {
    ranges: Vec<(Char, Char)>,
}

impl Chars {
    pub fn new() -> Chars {
        Chars { ranges: vec![] }
    }

    pub fn any(&self) -> bool {
        !self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[(Char, Char)] {
        &self.ranges
    }

    pub fn contains(&self, c: Char) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if c < lo {
                    std::cmp::Ordering::Greater
                } else if c > hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn insert(&mut self, c: Char) {
        self.insert_range(c, c);
    }

    pub fn insert_range(&mut self, lo: Char, hi: Char) {
        debug_assert!(lo <= hi);
        let (mut lo, mut hi) = (lo, hi);
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        let mut placed = false;
        for &(a, b) in &self.ranges {
            if coalesces((a, b), (lo, hi)) {
                lo = lo.min(a);
                hi = hi.max(b);
            } else if b < lo {
                out.push((a, b));
            } else {
                if !placed {
                    out.push((lo, hi));
                    placed = true;
                }
                out.push((a, b));
            }
        }
        if !placed {
            out.push((lo, hi));
        }
        self.ranges = out;
    }

    pub fn union_with(&mut self, other: &Chars) {
        for &(lo, hi) in &other.ranges {
            self.insert_range(lo, hi);
        }
    }

    pub fn intersection(&self, other: &Chars) -> Chars {
        let mut out = vec![];
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a1, b1) = self.ranges[i];
            let (a2, b2) = other.ranges[j];
            let (lo, hi) = (a1.max(a2), b1.min(b2));
            if lo <= hi {
                out.push((lo, hi));
            }
            if b1 < b2 {
                i += 1;
            } else {
                j += 1;
            }
        }
        let mut chars = Chars { ranges: out };
        chars.coalesce();
        chars
    }

    pub fn intersects(&self, other: &Chars) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a1, b1) = self.ranges[i];
            let (a2, b2) = other.ranges[j];
            if a1.max(a2) <= b1.min(b2) {
                return true;
            }
            if b1 < b2 {
                i += 1;
            } else {
                j += 1;
            }
        }
        false
    }

    pub fn subtract(&mut self, other: &Chars) {
        let mut out = Vec::with_capacity(self.ranges.len());
        for &(lo, hi) in &self.ranges {
            let mut cur = lo;
            let mut consumed = false;
            for &(c, d) in &other.ranges {
                if d < cur {
                    continue;
                }
                if c > hi {
                    break;
                }
                if c > cur {
                    out.push((cur, c - 1));
                }
                if d >= hi {
                    consumed = true;
                    break;
                }
                cur = d + 1;
            }
            if !consumed && cur <= hi {
                out.push((cur, hi));
            }
        }
        self.ranges = out;
    }

    /// Complement this set within the byte alphabet `0..=0xFF`. Meta
    /// characters are left untouched; character lists never contain them.
    pub fn flip(&mut self) {
        let mut out = vec![];
        let mut next: Char = 0;
        for &(a, b) in self.ranges.iter().take_while(|r| r.0 < META_MIN) {
            if next < a {
                out.push((next, a - 1));
            }
            next = b + 1;
        }
        if next <= 0xFF {
            out.push((next, 0xFF));
        }
        out.extend(self.ranges.iter().copied().filter(|r| r.0 >= META_MIN));
        self.ranges = out;
    }

    fn coalesce(&mut self) {
        let mut out: Vec<(Char, Char)> =
            Vec::with_capacity(self.ranges.len());
        for &(lo, hi) in &self.ranges {
            match out.last_mut() {
                Some(last) if coalesces(*last, (lo, hi)) => {
                    last.1 = last.1.max(hi);
                }
                _ => out.push((lo, hi)),
            }
        }
        self.ranges = out;
    }
}

fn coalesces(r: (Char, Char), s: (Char, Char)) -> bool {
    let overlap = r.0 <= s.1 && s.0 <= r.1;
    let adjacent = (r.1 != 0xFF && r.1 + 1 == s.0)
        || (s.1 != 0xFF && s.1 + 1 == r.0);
    overlap || adjacent
}

impl fmt::Display for Chars {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for &(lo, hi) in &self.ranges {
            if is_meta(lo) {
                for m in lo..=hi {
                    write!(f, " {}", meta_label(m))?;
                }
            } else if lo == hi {
                write!(f, " {:#04x}", lo)?;
            } else {
                write!(f, " {:#04x}-{:#04x}", lo, hi)?;
            }
        }
        write!(f, " ]")
    }
}

/// The names of the supported POSIX character classes. The table index is
/// the argument `posix` expects; the escape classes (`\s`, `\d`, ...) map
/// into the same table.
pub(crate) const POSIX_CLASSES: [&str; 14] = [
    "ASCII", "Space", "Xdigit", "Cntrl", "Print", "Alnum", "Alpha",
    "Blank", "Digit", "Graph", "Lower", "Punct", "Upper", "Word",
];

/// Insert the bytes of the POSIX class with the given table index.
pub(crate) fn posix(index: usize, chars: &mut Chars) {
    match index {
        0 => chars.insert_range(0x00, 0x7F),
        1 => {
            chars.insert_range(b'\t' as Char, b'\r' as Char);
            chars.insert(b' ' as Char);
            chars.insert(0x85);
        }
        2 => {
            chars.insert_range(b'0' as Char, b'9' as Char);
            chars.insert_range(b'A' as Char, b'F' as Char);
            chars.insert_range(b'a' as Char, b'f' as Char);
        }
        3 => {
            chars.insert_range(0x00, 0x1F);
            chars.insert(0x7F);
        }
        4 => chars.insert_range(b' ' as Char, b'~' as Char),
        5 => {
            chars.insert_range(b'0' as Char, b'9' as Char);
            chars.insert_range(b'A' as Char, b'Z' as Char);
            chars.insert_range(b'a' as Char, b'z' as Char);
        }
        6 => {
            chars.insert_range(b'A' as Char, b'Z' as Char);
            chars.insert_range(b'a' as Char, b'z' as Char);
        }
        7 => {
            chars.insert(b'\t' as Char);
            chars.insert(b' ' as Char);
        }
        8 => chars.insert_range(b'0' as Char, b'9' as Char),
        9 => chars.insert_range(b'!' as Char, b'~' as Char),
        10 => chars.insert_range(b'a' as Char, b'z' as Char),
        11 => {
            chars.insert_range(b'!' as Char, b'/' as Char);
            chars.insert_range(b':' as Char, b'@' as Char);
            chars.insert_range(b'[' as Char, b'`' as Char);
            chars.insert_range(b'{' as Char, b'~' as Char);
        }
        12 => chars.insert_range(b'A' as Char, b'Z' as Char),
        13 => {
            chars.insert_range(b'0' as Char, b'9' as Char);
            chars.insert_range(b'A' as Char, b'Z' as Char);
            chars.insert_range(b'a' as Char, b'z' as Char);
            chars.insert(b'_' as Char);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_coalesces_overlap_and_adjacency() {
        let mut c = Chars::new();
        c.insert_range(b'a' as Char, b'f' as Char);
        c.insert_range(b'g' as Char, b'z' as Char);
        assert_eq!(c.ranges(), &[(b'a' as Char, b'z' as Char)]);
        c.insert(b'A' as Char);
        c.insert_range(b'B' as Char, b'Z' as Char);
        assert_eq!(
            c.ranges(),
            &[(b'A' as Char, b'Z' as Char), (b'a' as Char, b'z' as Char)]
        );
    }

    #[test]
    fn bytes_and_metas_never_share_a_range() {
        let mut c = Chars::new();
        c.insert(0xFF);
        c.insert(META_NWB);
        c.insert(META_MIN);
        assert_eq!(c.ranges(), &[(0xFF, 0xFF), (META_MIN, META_NWB)]);
    }

    #[test]
    fn flip_complements_the_byte_alphabet() {
        let mut c = Chars::new();
        c.insert(b'\n' as Char);
        c.flip();
        assert_eq!(c.ranges(), &[(0, 9), (11, 0xFF)]);
        c.flip();
        assert_eq!(c.ranges(), &[(10, 10)]);
    }

    #[test]
    fn flip_of_empty_is_all_bytes() {
        let mut c = Chars::new();
        c.flip();
        assert_eq!(c.ranges(), &[(0, 0xFF)]);
    }

    #[test]
    fn subtract_splits_ranges() {
        let mut c = Chars::new();
        c.insert_range(0, 0xFF);
        let mut cut = Chars::new();
        cut.insert_range(b'a' as Char, b'z' as Char);
        c.subtract(&cut);
        assert_eq!(c.ranges(), &[(0, 0x60), (0x7B, 0xFF)]);
    }

    #[test]
    fn intersection_walks_both_sets() {
        let mut a = Chars::new();
        a.insert_range(b'0' as Char, b'9' as Char);
        a.insert_range(b'a' as Char, b'f' as Char);
        let mut b = Chars::new();
        b.insert_range(b'5' as Char, b'c' as Char);
        let i = a.intersection(&b);
        assert_eq!(
            i.ranges(),
            &[(b'5' as Char, b'9' as Char), (b'a' as Char, b'c' as Char)]
        );
        assert!(a.intersects(&b));
        let mut d = Chars::new();
        d.insert(b'z' as Char);
        assert!(!a.intersects(&d));
    }

    #[test]
    fn posix_word_class() {
        let mut c = Chars::new();
        posix(13, &mut c);
        assert!(c.contains(b'_' as Char));
        assert!(c.contains(b'0' as Char));
        assert!(c.contains(b'Z' as Char));
        assert!(!c.contains(b'-' as Char));
    }
}
