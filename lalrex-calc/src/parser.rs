use crate::error::CalcError;
use crate::lexer::{build_lexer, LexState, TOKENS};
use crate::symtab::SymTab;
use crate::token::CalcValue;
use lalrex::{
    Assoc, ConfigError, GrammarSpec, Lexer, Parser, Recovery, Reduction, UserActionError,
};
use smartstring::alias::String;
use std::io::{self, Write};

/// Outcome of one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtResult {
    Value(i64),
    Assigned(String, i64),
    Printed(i64),
    Recovered,
}

/// Parser-side state: the variable store and the per-run statement log.
#[derive(Default)]
pub struct Env {
    pub vars: SymTab,
    pub out: Vec<StmtResult>,
    pub syntax_errors: usize,
}

fn num(red: &Reduction<'_, CalcValue>, i: isize) -> i64 {
    red.get(i).number()
}

/// Builds the statement grammar: assignments, printed and bare
/// expressions, arithmetic with the usual precedence plus unary minus via
/// `%prec UMINUS`, a nonassociative `<`, and two `error` productions that
/// resynchronize on semicolons.
pub fn build_parser() -> Result<Parser<CalcValue, Env>, ConfigError> {
    GrammarSpec::new()
        .tokens(TOKENS)
        .start("statements")
        .prec(Assoc::Nonassoc, &["LT"])
        .prec(Assoc::Left, &["PLUS", "MINUS"])
        .prec(Assoc::Left, &["TIMES", "DIVIDE"])
        .prec(Assoc::Right, &["UMINUS"])
        .prod("statements", &["statements", "statement"])
        .prod("statements", &["statement"])
        .prod_with(
            "statement",
            &["NAME", "EQUALS", "expr", "SEMI"],
            |red: &mut Reduction<'_, CalcValue>, env: &mut Env| {
                let CalcValue::Ident(name) = red.get(1).clone() else {
                    return Err(UserActionError::msg("NAME token without an identifier"));
                };
                let v = num(red, 3);
                env.vars.set(&name, v);
                env.out.push(StmtResult::Assigned(name, v));
                Ok(())
            },
        )
        .prod_with("statement", &["expr", "SEMI"], |red, env: &mut Env| {
            env.out.push(StmtResult::Value(num(red, 1)));
            Ok(())
        })
        .prod_with(
            "statement",
            &["PRINT", "expr", "SEMI"],
            |red, env: &mut Env| {
                env.out.push(StmtResult::Printed(num(red, 2)));
                Ok(())
            },
        )
        .prod_with(
            "statement",
            &["PRINT", "error", "SEMI"],
            |_red, env: &mut Env| {
                env.out.push(StmtResult::Recovered);
                Ok(())
            },
        )
        .prod_with("statement", &["error", "SEMI"], |_red, env: &mut Env| {
            env.out.push(StmtResult::Recovered);
            Ok(())
        })
        .prod_with("expr", &["expr", "PLUS", "expr"], |red, _| {
            red.set(CalcValue::Number(num(red, 1) + num(red, 3)));
            Ok(())
        })
        .prod_with("expr", &["expr", "MINUS", "expr"], |red, _| {
            red.set(CalcValue::Number(num(red, 1) - num(red, 3)));
            Ok(())
        })
        .prod_with("expr", &["expr", "TIMES", "expr"], |red, _| {
            red.set(CalcValue::Number(num(red, 1) * num(red, 3)));
            Ok(())
        })
        .prod_with("expr", &["expr", "DIVIDE", "expr"], |red, _| {
            let d = num(red, 3);
            if d == 0 {
                return Err(UserActionError::msg("division by zero"));
            }
            red.set(CalcValue::Number(num(red, 1) / d));
            Ok(())
        })
        .prod_with("expr", &["expr", "LT", "expr"], |red, _| {
            red.set(CalcValue::Number((num(red, 1) < num(red, 3)) as i64));
            Ok(())
        })
        .prod_with("expr", &["MINUS", "expr", "%prec", "UMINUS"], |red, _| {
            red.set(CalcValue::Number(-num(red, 2)));
            Ok(())
        })
        .prod_with("expr", &["LPAREN", "expr", "RPAREN"], |red, _| {
            let v = red.take(2);
            red.set(v);
            Ok(())
        })
        .prod_with("expr", &["NUMBER"], |red, _| {
            let v = red.take(1);
            red.set(v);
            Ok(())
        })
        .prod_with("expr", &["NAME"], |red, env: &mut Env| {
            let CalcValue::Ident(name) = red.get(1) else {
                return Err(UserActionError::msg("NAME token without an identifier"));
            };
            let v = env.vars.get(name);
            red.set(CalcValue::Number(v));
            Ok(())
        })
        .on_error(|tok, env: &mut Env| {
            env.syntax_errors += 1;
            match tok {
                Some(t) => log::warn!("syntax error at line {} near {:?}", t.line, t.kind),
                None => log::warn!("syntax error at end of input"),
            }
            Recovery::None
        })
        .build(Env::default())
}

/// A complete calculator session: lexer plus parser.
pub struct Calc {
    lexer: Lexer<CalcValue, LexState>,
    parser: Parser<CalcValue, Env>,
}

impl Calc {
    pub fn new() -> Result<Self, CalcError> {
        Ok(Self {
            lexer: build_lexer()?,
            parser: build_parser()?,
        })
    }

    /// Evaluates a batch of statements and returns one result per
    /// statement, including recovered error statements.
    pub fn eval(&mut self, input: &str) -> Result<Vec<StmtResult>, CalcError> {
        self.lexer.feed(input);
        let outcome = self.parser.parse(&mut self.lexer)?;
        let results = std::mem::take(&mut self.parser.user_mut().out);
        if outcome.is_none() {
            return Err(CalcError::Aborted);
        }
        Ok(results)
    }

    pub fn vars(&self) -> &SymTab {
        &self.parser.user().vars
    }

    pub fn syntax_errors(&self) -> usize {
        self.parser.user().syntax_errors
    }

    pub fn write_tables<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.parser.write_tables(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn eval(input: &str) -> Vec<StmtResult> {
        let mut calc = Calc::new().unwrap();
        calc.eval(input).unwrap()
    }

    #[test]
    fn builds_without_conflicts() {
        init_logger();
        let parser = build_parser().unwrap();
        for d in parser.diagnostics() {
            assert!(
                !d.message.contains("conflict"),
                "unexpected diagnostic: {}",
                d.message
            );
        }
    }

    #[test]
    fn times_binds_tighter_than_plus() {
        init_logger();
        assert_eq!(eval("1 + 2 * 3;"), [StmtResult::Value(7)]);
    }

    #[test]
    fn minus_is_left_associative() {
        init_logger();
        assert_eq!(eval("1 - 2 - 3;"), [StmtResult::Value(-4)]);
    }

    #[test]
    fn unary_minus_binds_tightest() {
        init_logger();
        assert_eq!(eval("3 + 4 * -5;"), [StmtResult::Value(-17)]);
        assert_eq!(eval("-2 - 3;"), [StmtResult::Value(-5)]);
    }

    #[test]
    fn parenthesized_subexpressions() {
        init_logger();
        assert_eq!(eval("2 * 3 + 4 * (5 - 10);"), [StmtResult::Value(-14)]);
    }

    #[test]
    fn assignment_and_lookup() {
        init_logger();
        let mut calc = Calc::new().unwrap();
        let out = calc.eval("a = 5; a + 1;").unwrap();
        assert_eq!(
            out,
            [
                StmtResult::Assigned("a".into(), 5),
                StmtResult::Value(6)
            ]
        );
        assert_eq!(calc.vars().get("a"), 5);
        // Undefined names read as zero.
        assert_eq!(calc.eval("b + 1;").unwrap(), [StmtResult::Value(1)]);
    }

    #[test]
    fn comparison_is_nonassociative() {
        init_logger();
        assert_eq!(eval("1 < 2;"), [StmtResult::Value(1)]);
        let mut calc = Calc::new().unwrap();
        let out = calc.eval("1 < 2 < 3;").unwrap();
        assert_eq!(out, [StmtResult::Recovered]);
        assert_eq!(calc.syntax_errors(), 1);
    }

    #[test]
    fn print_statement_recovers_at_semicolon() {
        init_logger();
        let mut calc = Calc::new().unwrap();
        // The ??? is skipped by the lexer's error hook, leaving the parser
        // with "print ;" which the error rule absorbs.
        let out = calc.eval("print ??? ; print 1 ;").unwrap();
        assert_eq!(out, [StmtResult::Recovered, StmtResult::Printed(1)]);
        assert_eq!(calc.syntax_errors(), 1);
    }

    #[test]
    fn comments_are_invisible_to_the_grammar() {
        init_logger();
        assert_eq!(
            eval("1 /* one /* nested */ more */ + 2;"),
            [StmtResult::Value(3)]
        );
    }

    #[test]
    fn division_by_zero_raises() {
        init_logger();
        let mut calc = Calc::new().unwrap();
        let err = calc.eval("1 / 0;").unwrap_err();
        assert!(matches!(err, CalcError::Parse(_)));
    }

    #[test]
    fn unparseable_input_aborts() {
        init_logger();
        let mut calc = Calc::new().unwrap();
        let err = calc.eval(")").unwrap_err();
        assert!(matches!(err, CalcError::Aborted));
        assert_eq!(calc.syntax_errors(), 1);
    }

    #[test]
    fn multiple_statements_across_lines() {
        init_logger();
        assert_eq!(
            eval("x = 2;\ny = x * 3;\nprint x + y;\n"),
            [
                StmtResult::Assigned("x".into(), 2),
                StmtResult::Assigned("y".into(), 6),
                StmtResult::Printed(8)
            ]
        );
    }

    #[test]
    fn tables_dump_renders() {
        init_logger();
        let calc = Calc::new().unwrap();
        let mut buf = Vec::new();
        calc.write_tables(&mut buf).unwrap();
        let text = std::string::String::from_utf8(buf).unwrap();
        assert!(text.contains("Grammar"));
        assert!(text.contains("statement"));
    }
}
