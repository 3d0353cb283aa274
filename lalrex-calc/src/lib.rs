//! A small statement/expression calculator built on `lalrex`.
//!
//! Serves as the worked example for the toolkit: reserved words resolved in
//! a lexer action, an exclusive comment state with nesting, precedence and
//! `%prec UMINUS`, a nonassociative comparison operator, and `error`-rule
//! recovery that resynchronizes on semicolons.

pub mod error;
pub mod lexer;
pub mod parser;
pub mod symtab;
pub mod token;

pub use error::CalcError;
pub use lexer::{build_lexer, LexState};
pub use parser::{Calc, Env, StmtResult};
pub use symtab::SymTab;
pub use token::CalcValue;
