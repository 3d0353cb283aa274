//! Master-pattern assembly for the lexer.
//!
//! Every token rule is wrapped in a named capture group and the groups are
//! joined into one alternation per lexer state, so a single anchored match
//! both finds the next token and identifies its kind. Ordering inside the
//! alternation is the whole contract: rules with actions come first in
//! declaration order, plain rules follow sorted by decreasing pattern
//! length (so `==` cannot be masked by `=`), and single-character literals
//! are not part of the pattern at all; the lexer tries them only after the
//! master pattern fails.

use crate::error::ConfigError;
use crate::token::Name;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Compile flags applied to every pattern unless the caller overrides them.
/// Verbose mode, matching classical lex toolkits: whitespace and `#`
/// comments inside patterns are ignored.
pub const DEFAULT_FLAGS: &str = "x";

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// One rule as seen by the assembler.
pub(crate) struct MasterRule {
    pub name: Name,
    pub pattern: std::string::String,
    pub has_action: bool,
}

/// A compiled per-state master pattern plus the group names in trial order.
#[derive(Debug)]
pub(crate) struct MasterPattern {
    pub regex: Regex,
    names: Vec<Name>,
}

impl MasterPattern {
    /// Returns the rule whose alternative produced this match.
    ///
    /// Exactly one top-level named group participates in an anchored
    /// leftmost-first match; groups nested inside user patterns carry
    /// different names and are skipped.
    pub fn winner<'a>(&'a self, caps: &Captures<'_>) -> Option<&'a Name> {
        self.names.iter().find(|n| caps.name(n).is_some())
    }
}

fn anchored(flags: &str, body: &str) -> std::string::String {
    if flags.is_empty() {
        format!(r"\A(?:{body})")
    } else {
        format!(r"(?{flags})\A(?:{body})")
    }
}

pub(crate) fn validate_name(name: &Name) -> Result<(), ConfigError> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::BadTokenName(name.clone()))
    }
}

/// Compiles a single rule on its own, rejecting bad regexes and patterns
/// that match the empty string. Runs before assembly so failures name the
/// offending rule.
pub(crate) fn validate_pattern(
    name: &Name,
    pattern: &str,
    flags: &str,
) -> Result<(), ConfigError> {
    let re = Regex::new(&anchored(flags, pattern)).map_err(|e| ConfigError::BadPattern {
        name: name.clone(),
        pattern: pattern.to_owned(),
        source: Box::new(e),
    })?;
    if re.is_match("") {
        return Err(ConfigError::EmptyMatch(name.clone()));
    }
    Ok(())
}

/// Orders the rules of one lexer state and compiles them into a single
/// anchored pattern.
pub(crate) fn assemble(rules: &[MasterRule], flags: &str) -> Result<MasterPattern, ConfigError> {
    let mut ordered: Vec<&MasterRule> = rules.iter().filter(|r| r.has_action).collect();
    let mut plain: Vec<&MasterRule> = rules.iter().filter(|r| !r.has_action).collect();
    // Stable sort keeps declaration order among equal-length patterns.
    plain.sort_by(|a, b| b.pattern.len().cmp(&a.pattern.len()));
    ordered.extend(plain);

    let body = ordered
        .iter()
        .map(|r| format!("(?P<{}>{})", r.name, r.pattern))
        .collect::<Vec<_>>()
        .join("|");
    let regex = Regex::new(&anchored(flags, &body)).map_err(|e| ConfigError::BadPattern {
        name: "<master>".into(),
        pattern: body.clone(),
        source: Box::new(e),
    })?;
    Ok(MasterPattern {
        regex,
        names: ordered.iter().map(|r| r.name.clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, pattern: &str, has_action: bool) -> MasterRule {
        MasterRule {
            name: name.into(),
            pattern: pattern.to_owned(),
            has_action,
        }
    }

    #[test]
    fn longer_plain_patterns_win_over_shorter() {
        let m = assemble(
            &[rule("ASSIGN", "=", false), rule("EQ", "==", false)],
            DEFAULT_FLAGS,
        )
        .unwrap();
        let caps = m.regex.captures("==").unwrap();
        assert_eq!(m.winner(&caps).unwrap(), "EQ");
        let caps = m.regex.captures("=1").unwrap();
        assert_eq!(m.winner(&caps).unwrap(), "ASSIGN");
    }

    #[test]
    fn action_rules_precede_plain_rules() {
        // The plain NUMBER pattern is longer, but ID has an action and is
        // tried first.
        let m = assemble(
            &[
                rule("ID", r"[a-z]+", true),
                rule("NUMBER", r"[a-z0-9]+", false),
            ],
            DEFAULT_FLAGS,
        )
        .unwrap();
        let caps = m.regex.captures("abc").unwrap();
        assert_eq!(m.winner(&caps).unwrap(), "ID");
    }

    #[test]
    fn verbose_mode_is_the_default() {
        let m = assemble(
            &[rule("NUMBER", "\\d+   # digits\n", false)],
            DEFAULT_FLAGS,
        )
        .unwrap();
        let caps = m.regex.captures("123").unwrap();
        assert_eq!(m.winner(&caps).unwrap(), "NUMBER");
    }

    #[test]
    fn flags_override_drops_verbose() {
        let m = assemble(&[rule("WORD", "[a-z] [a-z]", false)], "i").unwrap();
        assert!(m.regex.is_match("a b"));
        assert!(m.regex.is_match("A B"));
        assert!(!m.regex.is_match("ab"));
    }

    #[test]
    fn bad_pattern_is_reported_with_rule_name() {
        let name: Name = "BROKEN".into();
        let err = validate_pattern(&name, "(unclosed", DEFAULT_FLAGS).unwrap_err();
        assert!(matches!(err, ConfigError::BadPattern { name, .. } if name == "BROKEN"));
    }

    #[test]
    fn empty_matching_pattern_is_rejected() {
        let name: Name = "MAYBE".into();
        let err = validate_pattern(&name, "x?", DEFAULT_FLAGS).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyMatch(n) if n == "MAYBE"));
    }

    #[test]
    fn bad_names_are_rejected() {
        assert!(validate_name(&"bad&rule".into()).is_err());
        assert!(validate_name(&"NUMBER".into()).is_ok());
    }
}
