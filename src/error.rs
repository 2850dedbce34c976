use std::error;
use std::fmt;
use std::result;

use crate::position::Location;

pub type Result<T> = result::Result<T, Error>;

/// An error that occurred while compiling a pattern.
///
/// Every error carries the byte offset into the pattern source at which the
/// problem was detected. The offset always lies within `0..=source.len()`
/// and points at or before the first ill-formed character.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    loc: Location,
}

/// The kind of error that occurred.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Malformed input: unbalanced brackets or quotes, an empty subpattern,
    /// a bad escape or an unknown modifier. The message names the specific
    /// problem.
    Syntax(&'static str),
    /// A `{min,max}` bound is out of range, or `min > max`.
    Range(&'static str),
    /// An inverted `[lo-hi]` range in a character list.
    List(&'static str),
    /// A quantifier with nothing to repeat, such as a leading `*`, `+` or
    /// `?`.
    Repeat(&'static str),
    /// The emitted program or a position iteration index exceeds the
    /// representable maximum. This error is always fatal, regardless of
    /// whether the `r` option was set.
    CodeOverflow,
}

impl Error {
    /// Return the kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Return the byte offset into the pattern source where the error was
    /// detected.
    pub fn loc(&self) -> Location {
        self.loc
    }

    pub(crate) fn syntax(msg: &'static str, loc: Location) -> Error {
        Error { kind: ErrorKind::Syntax(msg), loc }
    }

    pub(crate) fn range(msg: &'static str, loc: Location) -> Error {
        Error { kind: ErrorKind::Range(msg), loc }
    }

    pub(crate) fn list(msg: &'static str, loc: Location) -> Error {
        Error { kind: ErrorKind::List(msg), loc }
    }

    pub(crate) fn repeat(msg: &'static str, loc: Location) -> Error {
        Error { kind: ErrorKind::Repeat(msg), loc }
    }

    pub(crate) fn code_overflow(loc: Location) -> Error {
        Error { kind: ErrorKind::CodeOverflow, loc }
    }

    /// Whether this error must be raised even when the `r` option is off.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::CodeOverflow)
    }

    /// Render a one-line diagnostic with a caret pointing at the error
    /// offset in the given pattern source. The source is shown in an
    /// 80-column window around the offset.
    pub fn display_with(&self, source: &str) -> String {
        let mut out = String::from("pattern error ");
        if self.loc > 0 {
            let loc = self.loc as usize;
            let row = loc / 80;
            let col = loc % 80;
            let window: String =
                source.chars().skip(80 * row).take(79).collect();
            out.push_str(&format!(
                "at {}\n{}\n{:>width$}",
                loc,
                window,
                "^~~ ",
                width = col + 4
            ));
        }
        out.push_str(&self.to_string());
        out
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match self.kind {
            ErrorKind::Syntax(_) => "syntax error",
            ErrorKind::Range(_) => "invalid repetition range",
            ErrorKind::List(_) => "invalid character list",
            ErrorKind::Repeat(_) => "invalid quantifier",
            ErrorKind::CodeOverflow => "code overflow",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ErrorKind::Syntax(msg)
            | ErrorKind::Range(msg)
            | ErrorKind::List(msg)
            | ErrorKind::Repeat(msg) => write!(f, "{}", msg),
            ErrorKind::CodeOverflow => write!(f, "out of code memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_points_into_source() {
        let err = Error::syntax("missing )", 4);
        let rendered = err.display_with("(abc");
        assert!(rendered.contains("at 4"));
        assert!(rendered.contains("^~~ "));
        assert!(rendered.ends_with("missing )"));
    }

    #[test]
    fn overflow_is_fatal() {
        assert!(Error::code_overflow(0).is_fatal());
        assert!(!Error::syntax("empty pattern", 0).is_fatal());
    }
}
