use crate::error::Result;
use crate::pattern::Pattern;

/// The parsed option set controlling compilation.
///
/// Options come either from an option string (`Options::parse_flags`, the
/// format described on [`Pattern::with_options`]) or from the chained
/// setters of [`PatternBuilder`]. Inline `(?imqsx:...)` modifier groups
/// adjust a copy of these options while the enclosed group parses.
#[derive(Clone, Debug)]
pub(crate) struct Options {
    /// Disable escapes inside bracket lists.
    pub b: bool,
    /// Case-insensitive matching.
    pub i: bool,
    /// Enable `/` trailing-context lookahead.
    pub l: bool,
    /// Multi-line anchors: `^` and `$` match at line boundaries.
    pub m: bool,
    /// `"..."` quotes literal text.
    pub q: bool,
    /// Raise errors instead of logging and continuing.
    pub r: bool,
    /// `.` matches newline.
    pub s: bool,
    /// Emit a diagnostic for every reported error.
    pub w: bool,
    /// Free-spacing mode: insignificant whitespace and `#` comments.
    pub x: bool,
    /// The escape character; 0 disables escapes entirely.
    pub e: u8,
    /// The name of the emitted FSM, used by the exporters.
    pub n: String,
    /// Export targets; the filename suffix selects the format.
    pub f: Vec<String>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            b: false,
            i: false,
            l: false,
            m: false,
            q: false,
            r: false,
            s: false,
            w: false,
            x: false,
            e: b'\\',
            n: String::new(),
            f: vec![],
        }
    }
}

impl Options {
    /// Scan an option string. Tokens are single letters from
    /// `b e i l m q r s w x f n`; `e`, `f` and `n` take a value after an
    /// optional `=`. Unknown letters are ignored.
    pub fn parse_flags(&mut self, opt: &str) {
        let s = opt.as_bytes();
        let mut i = 0;
        while i < s.len() {
            match s[i] {
                b'b' => self.b = true,
                b'i' => self.i = true,
                b'l' => self.l = true,
                b'm' => self.m = true,
                b'q' => self.q = true,
                b'r' => self.r = true,
                b's' => self.s = true,
                b'w' => self.w = true,
                b'x' => self.x = true,
                b'e' => {
                    i += if s.get(i + 1) == Some(&b'=') { 2 } else { 1 };
                    self.e = match s.get(i) {
                        None | Some(&b';') => 0,
                        Some(&c) => c,
                    };
                }
                b'f' | b'n' => {
                    if s.get(i + 1) == Some(&b'=') {
                        i += 1;
                    }
                    let rest = &s[i + 1..];
                    let stop = rest
                        .iter()
                        .position(|&c| c == b';')
                        .unwrap_or(rest.len());
                    for name in rest[..stop].split(|&c| {
                        c == b',' || (c as char).is_ascii_whitespace()
                    }) {
                        if name.is_empty() {
                            continue;
                        }
                        let name =
                            String::from_utf8_lossy(name).into_owned();
                        if name.contains('.') {
                            self.f.push(name);
                        } else {
                            self.n = name;
                        }
                    }
                    i += 1 + stop;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// A builder for compiled patterns.
///
/// The builder exposes every option of the option-string syntax through a
/// chained setter, which reads better when options are not data-driven:
///
/// ```
/// use regex_fsm::PatternBuilder;
///
/// let pattern = PatternBuilder::new()
///     .case_insensitive(true)
///     .dot_matches_new_line(true)
///     .build(r"-- .*")
///     .unwrap();
/// assert!(pattern.reachable(1));
/// ```
#[derive(Clone, Debug, Default)]
pub struct PatternBuilder {
    opts: Options,
}

impl PatternBuilder {
    /// Create a new builder with the default configuration.
    pub fn new() -> PatternBuilder {
        PatternBuilder { opts: Options::default() }
    }

    /// Compile the given pattern with this builder's configuration.
    pub fn build(&self, pattern: &str) -> Result<Pattern> {
        Pattern::compile(pattern.to_string(), self.opts.clone())
    }

    /// Merge an option string (see [`Pattern::with_options`]) into this
    /// builder's configuration.
    pub fn flags(&mut self, opt: &str) -> &mut PatternBuilder {
        self.opts.parse_flags(opt);
        self
    }

    /// Enable or disable case-insensitive matching (option `i`).
    ///
    /// By default this is disabled. It may alternatively be selectively
    /// enabled in the pattern itself via an inline `(?i:...)` group.
    pub fn case_insensitive(&mut self, yes: bool) -> &mut PatternBuilder {
        self.opts.i = yes;
        self
    }

    /// Enable or disable multi-line mode (option `m`).
    ///
    /// When enabled, `^` and `$` match at line boundaries instead of
    /// buffer boundaries. By default this is disabled.
    pub fn multi_line(&mut self, yes: bool) -> &mut PatternBuilder {
        self.opts.m = yes;
        self
    }

    /// Enable or disable the "dot matches any character" mode (option
    /// `s`). By default `.` matches every byte except `\n`.
    pub fn dot_matches_new_line(&mut self, yes: bool) -> &mut PatternBuilder {
        self.opts.s = yes;
        self
    }

    /// Enable free-spacing mode (option `x`): whitespace outside bracket
    /// lists is insignificant and `#` starts a line comment.
    pub fn free_spacing(&mut self, yes: bool) -> &mut PatternBuilder {
        self.opts.x = yes;
        self
    }

    /// Treat `"..."` as quoted literal text (option `q`). `\Q...\E`
    /// quoting is always available, independent of this option.
    pub fn quoting(&mut self, yes: bool) -> &mut PatternBuilder {
        self.opts.q = yes;
        self
    }

    /// Enable `/` trailing-context lookahead (option `l`).
    pub fn lookahead(&mut self, yes: bool) -> &mut PatternBuilder {
        self.opts.l = yes;
        self
    }

    /// Disable escapes inside bracket lists (option `b`).
    pub fn bracket_lists(&mut self, yes: bool) -> &mut PatternBuilder {
        self.opts.b = yes;
        self
    }

    /// Emit a caret diagnostic for every reported error (option `w`).
    pub fn warnings(&mut self, yes: bool) -> &mut PatternBuilder {
        self.opts.w = yes;
        self
    }

    /// Return an error from `build` for every reported problem (option
    /// `r`). When disabled, only overflow errors fail the build; other
    /// problems are logged and compilation continues with degraded
    /// semantics.
    pub fn raise_errors(&mut self, yes: bool) -> &mut PatternBuilder {
        self.opts.r = yes;
        self
    }

    /// Set the escape character (option `e`); `None` disables escapes.
    pub fn escape(&mut self, e: Option<u8>) -> &mut PatternBuilder {
        self.opts.e = e.unwrap_or(0);
        self
    }

    /// Set the name of the emitted FSM (option `n`), used by the
    /// exporters.
    pub fn name(&mut self, name: &str) -> &mut PatternBuilder {
        self.opts.n = name.to_string();
        self
    }

    /// Add an export target (option `f`). A `.gv` suffix selects the
    /// Graphviz exporter; `.h`, `.hpp`, `.cc` and `.cpp` select the
    /// opcode-array source exporter.
    pub fn dump_file(&mut self, path: &str) -> &mut PatternBuilder {
        self.opts.f.push(path.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_scan() {
        let mut o = Options::default();
        o.parse_flags("imsx");
        assert!(o.i && o.m && o.s && o.x);
        assert!(!o.l && !o.q);
        assert_eq!(o.e, b'\\');
    }

    #[test]
    fn escape_value_with_and_without_equals() {
        let mut o = Options::default();
        o.parse_flags("e=%");
        assert_eq!(o.e, b'%');
        let mut o = Options::default();
        o.parse_flags("e%");
        assert_eq!(o.e, b'%');
    }

    #[test]
    fn escape_semicolon_disables_escapes() {
        let mut o = Options::default();
        o.parse_flags("e=;i");
        assert_eq!(o.e, 0);
        assert!(o.i);
    }

    #[test]
    fn names_and_files_split_on_dot() {
        let mut o = Options::default();
        o.parse_flags("f=lexer,dump.gv,code.h;m");
        assert_eq!(o.n, "lexer");
        assert_eq!(o.f, vec!["dump.gv".to_string(), "code.h".to_string()]);
        assert!(o.m);
    }

    #[test]
    fn unknown_letters_are_ignored() {
        let mut o = Options::default();
        o.parse_flags("zi");
        assert!(o.i);
    }
}
