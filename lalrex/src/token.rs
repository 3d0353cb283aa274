use smartstring::alias::String as SmartString;
use std::fmt::Debug;

/// Short interned-ish name type used for token kinds and grammar symbols.
pub type Name = SmartString;

/// Reserved terminal matched by error-recovery productions.
pub const ERROR_KIND: &str = "error";
/// Reserved terminal marking end of input.
pub const END_KIND: &str = "$end";

/// Payload carried by a [`Token`].
///
/// The lexer constructs values directly from matched text; rule actions may
/// replace them afterwards (turning digits into integers and so on).
pub trait TokenValue: Clone + Debug + Default {
    fn from_text(text: &str) -> Self;
}

impl TokenValue for () {
    fn from_text(_text: &str) -> Self {}
}

impl TokenValue for std::string::String {
    fn from_text(text: &str) -> Self {
        text.to_owned()
    }
}

impl TokenValue for SmartString {
    fn from_text(text: &str) -> Self {
        text.into()
    }
}

/// A lexed token: kind, payload and the source position it started at.
///
/// `line` is 1-based and advanced only by user rules; `offset` is the
/// absolute position in the input fed to the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<V> {
    pub kind: Name,
    pub value: V,
    pub line: usize,
    pub offset: usize,
}

impl<V: TokenValue> Token<V> {
    pub fn new(kind: impl Into<Name>, value: V, line: usize, offset: usize) -> Self {
        Self {
            kind: kind.into(),
            value,
            line,
            offset,
        }
    }

    /// Builds a token whose value is derived from the matched text.
    pub fn from_text(kind: impl Into<Name>, text: &str, line: usize, offset: usize) -> Self {
        Self {
            kind: kind.into(),
            value: V::from_text(text),
            line,
            offset,
        }
    }

    pub(crate) fn end_marker(line: usize, offset: usize) -> Self {
        Self {
            kind: END_KIND.into(),
            value: V::default(),
            line,
            offset,
        }
    }

    pub fn is_end(&self) -> bool {
        self.kind == END_KIND
    }

    pub fn is_error(&self) -> bool {
        self.kind == ERROR_KIND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_text_builds_value() {
        let t: Token<std::string::String> = Token::from_text("NUMBER", "42", 1, 0);
        assert_eq!(t.kind, "NUMBER");
        assert_eq!(t.value, "42");
        assert!(!t.is_end());
        assert!(!t.is_error());
    }

    #[test]
    fn end_marker_is_reserved() {
        let t: Token<()> = Token::end_marker(3, 17);
        assert!(t.is_end());
        assert_eq!(t.line, 3);
        assert_eq!(t.offset, 17);
    }
}
