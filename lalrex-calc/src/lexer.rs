use crate::token::CalcValue;
use lalrex::{
    ConfigError, LexOutcome, Lexer, LexerCtx, LexerSpec, StateMode, UserActionError,
    INITIAL_STATE,
};

/// Terminal alphabet shared by the lexer and the grammar.
pub const TOKENS: &[&str] = &[
    "NAME", "NUMBER", "PLUS", "MINUS", "TIMES", "DIVIDE", "EQUALS", "LPAREN", "RPAREN", "LT",
    "SEMI", "PRINT",
];

/// Mutable lexer-side state: comment nesting and a count of characters the
/// error hook had to skip.
#[derive(Debug, Default)]
pub struct LexState {
    pub comment_depth: usize,
    pub bad_chars: usize,
}

/// Builds the calculator lexer: identifiers with a reserved-word lookup,
/// integers, one-character operators, nestable `/* */` comments in an
/// exclusive state, and newline counting.
pub fn build_lexer() -> Result<Lexer<CalcValue, LexState>, ConfigError> {
    LexerSpec::new()
        .tokens(TOKENS)
        .ignore(INITIAL_STATE, " \t\r")
        .state("comment", StateMode::Exclusive)
        .action_rule(&[], "NAME", r"[A-Za-z_]\w*", |_ctx: &mut LexerCtx<LexState>, tok| {
            if let CalcValue::Ident(s) = &tok.value {
                if s == "print" {
                    tok.kind = "PRINT".into();
                }
            }
            Ok(LexOutcome::Emit)
        })
        .action_rule(&[], "NUMBER", r"\d+", |_ctx, tok| {
            let CalcValue::Ident(s) = &tok.value else {
                return Ok(LexOutcome::Emit);
            };
            let n: i64 = s
                .parse()
                .map_err(|e| UserActionError::Other(Box::new(e)))?;
            tok.value = CalcValue::Number(n);
            Ok(LexOutcome::Emit)
        })
        .action_rule(&[INITIAL_STATE, "comment"], "comment_begin", r"/\*", |ctx, _tok| {
            ctx.user_mut().comment_depth += 1;
            ctx.begin("comment")
                .map_err(|e| UserActionError::Other(Box::new(e)))?;
            Ok(LexOutcome::Discard)
        })
        .action_rule(&["comment"], "comment_end", r"\*/", |ctx, _tok| {
            ctx.user_mut().comment_depth -= 1;
            if ctx.user_mut().comment_depth == 0 {
                ctx.begin(INITIAL_STATE)
                    .map_err(|e| UserActionError::Other(Box::new(e)))?;
            }
            Ok(LexOutcome::Discard)
        })
        .action_rule(&["comment"], "comment_text", r"[^*/\n]+", |_ctx, _tok| {
            Ok(LexOutcome::Discard)
        })
        .action_rule(&["comment"], "comment_punct", r"[*/]", |_ctx, _tok| {
            Ok(LexOutcome::Discard)
        })
        .action_rule(&["*"], "newline", r"\n", |ctx, _tok| {
            ctx.advance_line(1);
            Ok(LexOutcome::Discard)
        })
        .rule("PLUS", r"\+")
        .rule("MINUS", r"-")
        .rule("TIMES", r"\*")
        .rule("DIVIDE", r"/")
        .rule("EQUALS", r"=")
        .rule("LPAREN", r"\(")
        .rule("RPAREN", r"\)")
        .rule("LT", r"<")
        .rule("SEMI", r";")
        .on_error(|ctx, _tok| {
            ctx.user_mut().bad_chars += 1;
            ctx.skip(1);
            Ok(())
        })
        .build(LexState::default())
}
