//! Runtime-constructed lexers and LALR(1) parsers.
//!
//! `lalrex` builds a programming-language front end from data: a
//! [`LexerSpec`] describing token rules (combined into one master regex per
//! lexer state) and a [`GrammarSpec`] describing productions, precedence
//! and actions. Building the grammar spec runs the full LALR(1)
//! construction (canonical LR(0) collection, DeRemer/Pennello lookaheads,
//! conflict resolution) and yields a table-driven [`Parser`] with
//! yacc-style error recovery.
//!
//! The compiled artifacts (master patterns, grammar, tables) are immutable
//! after construction; lexers and parsers own only their own cursors and
//! stacks, so clones and separate sessions can share them freely.

mod error;
mod grammar;
mod lalr;
mod lexer;
mod lritems;
mod master;
mod parser;
mod report;
mod symtab;
mod token;

pub use crate::error::{
    ConfigError, Diagnostic, LexError, ParseError, Severity, UserActionError,
};
pub use crate::grammar::{Assoc, Grammar, Production, SourceLoc, AUGMENTED_LHS, EMPTY_MARK};
pub use crate::lalr::{LrAction, LrTables, Resolved, RrConflict, SrConflict};
pub use crate::lexer::{
    EofHook, LexAction, LexErrorHook, LexOutcome, LexRule, Lexer, LexerCtx, LexerSpec,
    LexerStats, StateMode, INITIAL_STATE,
};
pub use crate::master::DEFAULT_FLAGS;
pub use crate::parser::{
    GrammarSpec, ParseErrorHook, Parser, ParserStats, ProdSpec, Recovery, Reduction, RuleAction,
    TokenStream, VecStream,
};
pub use crate::report::write_tables;
pub use crate::symtab::Symtab;
pub use crate::token::{Name, Token, TokenValue, END_KIND, ERROR_KIND};
