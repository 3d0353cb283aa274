use thiserror::Error;

/// Unified error surface for the calculator pipeline.
#[derive(Debug, Error)]
pub enum CalcError {
    /// The lexer or parser could not be constructed.
    #[error("configuration error: {0}")]
    Config(#[from] lalrex::ConfigError),

    /// The parse failed hard (lexer error, unknown token, raised action).
    #[error("parse failed: {0}")]
    Parse(#[from] lalrex::ParseError),

    /// The parse was abandoned after error recovery failed.
    #[error("syntax errors made the input unparseable")]
    Aborted,
}
