//! Error and diagnostic types shared by the lexer and parser halves.
//!
//! Construction problems are fail-fast [`ConfigError`]s; runtime problems
//! reach the installed hooks as [`LexError`]/[`ParseError`] and the engine
//! continues where it can. Grammar conflicts are not errors at all: they are
//! collected as [`Diagnostic`]s and construction succeeds.

use crate::token::Name;
use thiserror::Error;

/// Fatal configuration problems detected while building a lexer or parser.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("token {0:?} declared more than once")]
    DuplicateToken(Name),

    #[error("illegal token name {0:?}")]
    BadTokenName(Name),

    #[error("token name {0:?} is reserved")]
    ReservedToken(Name),

    #[error("rule {0:?} defined more than once")]
    DuplicateRule(Name),

    #[error("rule {name:?} is not a declared token")]
    UnknownRuleToken { name: Name },

    #[error("rule {name:?}: invalid regular expression {pattern:?}: {source}")]
    BadPattern {
        name: Name,
        pattern: std::string::String,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("rule {0:?} matches the empty string")]
    EmptyMatch(Name),

    #[error("rule {rule:?} references undefined lexer state {state:?}")]
    UndefinedLexerState { rule: Name, state: Name },

    #[error("lexer state {0:?} declared more than once")]
    DuplicateLexerState(Name),

    #[error("no rules defined for lexer state {0:?}")]
    EmptyLexerState(Name),

    #[error("symbol {symbol:?} on line {line} of rule for {lhs:?} is undefined")]
    UndefinedSymbol {
        symbol: Name,
        lhs: Name,
        line: usize,
    },

    #[error("token {0:?} used as the left-hand side of a rule")]
    TerminalOnLhs(Name),

    #[error("precedence already specified for token {0:?}")]
    DuplicatePrecedence(Name),

    #[error("precedence for {0:?} declared after rules were added")]
    LatePrecedence(Name),

    #[error("nothing known about the precedence of {0:?}")]
    UnknownPrecedence(Name),

    #[error("%prec requires a following token name")]
    DanglingPrec,

    #[error("start symbol {0:?} is undefined")]
    UndefinedStart(Name),

    #[error("start symbol {0:?} must be a nonterminal")]
    TerminalStart(Name),

    #[error("grammar has no rules")]
    EmptyGrammar,

    #[error("symbol {0:?} never derives a terminal string (infinite recursion)")]
    InfiniteRecursion(Name),
}

/// Runtime lexing failures.
#[derive(Debug, Error)]
pub enum LexError {
    #[error("illegal character {ch:?} at line {line}, offset {offset}")]
    NoMatch { ch: char, line: usize, offset: usize },

    #[error("undefined lexer state {0:?}")]
    UndefinedState(Name),

    #[error("lexer state stack underflow")]
    StateUnderflow,

    #[error(transparent)]
    Action(#[from] UserActionError),
}

/// Runtime parsing failures that are not absorbed by error recovery.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("rule action failed: {0}")]
    Action(UserActionError),

    #[error("token kind {0:?} is not part of the grammar")]
    UnknownToken(Name),

    #[error("no goto entry for {symbol:?} from state {state}")]
    MissingGoto { state: usize, symbol: Name },
}

/// Failure raised by a user-supplied rule or lexer action.
///
/// `Syntax` is the synchronous recovery signal: the engine treats it as a
/// syntax error at the most recently shifted symbol and does not call the
/// error handler. Every other variant propagates to the caller unchanged
/// and invalidates the parsing session.
#[derive(Debug, Error)]
pub enum UserActionError {
    #[error("syntax error signalled by rule action")]
    Syntax,

    #[error("{0}")]
    Message(std::string::String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl UserActionError {
    pub fn msg(m: impl Into<std::string::String>) -> Self {
        Self::Message(m.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A non-fatal finding produced while building a grammar.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: std::string::String,
}

impl Diagnostic {
    pub fn warning(message: impl Into<std::string::String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_error_trait_obj(e: &dyn std::error::Error) -> &dyn std::error::Error {
        e
    }

    #[test]
    fn config_error_displays_context() {
        let e = ConfigError::UndefinedLexerState {
            rule: "NUMBER".into(),
            state: "ccode".into(),
        };
        assert!(e.to_string().contains("NUMBER"));
        assert!(e.to_string().contains("ccode"));
        let _ = _assert_error_trait_obj(&e);
    }

    #[test]
    fn user_action_error_wraps_others() {
        let inner: Box<dyn std::error::Error + Send + Sync> =
            "7x".parse::<i64>().unwrap_err().into();
        let e = UserActionError::from(inner);
        assert!(matches!(e, UserActionError::Other(_)));
        let pe = ParseError::Action(e);
        assert!(pe.to_string().contains("rule action failed"));
    }

    fn _assert_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn errors_are_send_sync_static() {
        _assert_send_sync_static::<ConfigError>();
        _assert_send_sync_static::<LexError>();
        _assert_send_sync_static::<ParseError>();
    }
}
