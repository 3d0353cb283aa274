use crate::error::{ConfigError, LexError, UserActionError};
use crate::master::{self, MasterPattern, MasterRule, DEFAULT_FLAGS};
use crate::token::{Name, Token, TokenValue, ERROR_KIND};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Name of the implicit start condition every lexer has.
pub const INITIAL_STATE: &str = "INITIAL";

/// Whether a lexer state stands alone or falls back to INITIAL rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    Inclusive,
    Exclusive,
}

/// What a rule action decided about the token it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexOutcome {
    Emit,
    Discard,
}

pub type LexAction<V, U> =
    Rc<dyn Fn(&mut LexerCtx<U>, &mut Token<V>) -> Result<LexOutcome, UserActionError>>;
pub type LexErrorHook<V, U> =
    Rc<dyn Fn(&mut LexerCtx<U>, &Token<V>) -> Result<(), UserActionError>>;
pub type EofHook<U> = Rc<dyn Fn(&mut LexerCtx<U>) -> Option<std::string::String>>;

/// One tokenization rule of a [`LexerSpec`].
pub struct LexRule<V, U> {
    pub name: Name,
    pub pattern: std::string::String,
    pub action: Option<LexAction<V, U>>,
    /// States the rule is active in. Empty means INITIAL; `"*"` means all.
    pub states: Vec<Name>,
}

/// Declarative description of a lexer, consumed by [`LexerSpec::build`].
///
/// Mirrors the rule-set contract: declared token kinds, single-character
/// literals, ordered rules, per-state ignore sets, extra states and the
/// error/EOF hooks. All validation happens in `build`; scanning never
/// reports configuration problems.
pub struct LexerSpec<V, U> {
    tokens: Vec<Name>,
    literals: std::string::String,
    rules: Vec<LexRule<V, U>>,
    ignore: Vec<(Name, std::string::String)>,
    states: Vec<(Name, StateMode)>,
    on_error: Option<LexErrorHook<V, U>>,
    on_eof: Option<EofHook<U>>,
    flags: std::string::String,
}

impl<V: TokenValue, U> Default for LexerSpec<V, U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: TokenValue, U> LexerSpec<V, U> {
    pub fn new() -> Self {
        Self {
            tokens: Vec::new(),
            literals: std::string::String::new(),
            rules: Vec::new(),
            ignore: Vec::new(),
            states: Vec::new(),
            on_error: None,
            on_eof: None,
            flags: DEFAULT_FLAGS.to_owned(),
        }
    }

    pub fn tokens(mut self, names: &[&str]) -> Self {
        self.tokens.extend(names.iter().map(|n| Name::from(*n)));
        self
    }

    pub fn literals(mut self, lits: &str) -> Self {
        self.literals.push_str(lits);
        self
    }

    pub fn state(mut self, name: &str, mode: StateMode) -> Self {
        self.states.push((name.into(), mode));
        self
    }

    pub fn ignore(mut self, state: &str, chars: &str) -> Self {
        self.ignore.push((state.into(), chars.to_owned()));
        self
    }

    /// Plain rule: the name doubles as the emitted token kind.
    pub fn rule(self, name: &str, pattern: &str) -> Self {
        self.rule_for(&[], name, pattern)
    }

    pub fn rule_for(mut self, states: &[&str], name: &str, pattern: &str) -> Self {
        self.rules.push(LexRule {
            name: name.into(),
            pattern: pattern.to_owned(),
            action: None,
            states: states.iter().map(|s| Name::from(*s)).collect(),
        });
        self
    }

    /// Rule with an action. Action rules are tried before all plain rules,
    /// in the order they were added.
    pub fn action_rule(
        mut self,
        states: &[&str],
        name: &str,
        pattern: &str,
        action: impl Fn(&mut LexerCtx<U>, &mut Token<V>) -> Result<LexOutcome, UserActionError>
            + 'static,
    ) -> Self {
        self.rules.push(LexRule {
            name: name.into(),
            pattern: pattern.to_owned(),
            action: Some(Rc::new(action)),
            states: states.iter().map(|s| Name::from(*s)).collect(),
        });
        self
    }

    pub fn on_error(
        mut self,
        hook: impl Fn(&mut LexerCtx<U>, &Token<V>) -> Result<(), UserActionError> + 'static,
    ) -> Self {
        self.on_error = Some(Rc::new(hook));
        self
    }

    pub fn on_eof(
        mut self,
        hook: impl Fn(&mut LexerCtx<U>) -> Option<std::string::String> + 'static,
    ) -> Self {
        self.on_eof = Some(Rc::new(hook));
        self
    }

    /// Replaces the default verbose compile flags. Callers overriding this
    /// must re-include `x` themselves if they still want verbose mode.
    pub fn flags(mut self, flags: &str) -> Self {
        self.flags = flags.to_owned();
        self
    }

    /// Validates the whole specification and compiles one master pattern
    /// per state.
    pub fn build(mut self, user: U) -> Result<Lexer<V, U>, ConfigError> {
        let mut declared: HashSet<Name> = HashSet::new();
        for t in &self.tokens {
            master::validate_name(t)?;
            if !declared.insert(t.clone()) {
                return Err(ConfigError::DuplicateToken(t.clone()));
            }
        }

        let mut table = StateTable {
            names: vec![INITIAL_STATE.into()],
            ids: HashMap::new(),
            modes: vec![StateMode::Inclusive],
        };
        table.ids.insert(INITIAL_STATE.into(), 0);
        for (name, mode) in &self.states {
            master::validate_name(name)?;
            if table.ids.contains_key(name) {
                return Err(ConfigError::DuplicateLexerState(name.clone()));
            }
            table.ids.insert(name.clone(), table.names.len());
            table.names.push(name.clone());
            table.modes.push(*mode);
        }

        let mut seen_rules: HashSet<Name> = HashSet::new();
        for rule in &mut self.rules {
            master::validate_name(&rule.name)?;
            if !seen_rules.insert(rule.name.clone()) {
                return Err(ConfigError::DuplicateRule(rule.name.clone()));
            }
            if rule.action.is_none() && !declared.contains(&rule.name) {
                return Err(ConfigError::UnknownRuleToken {
                    name: rule.name.clone(),
                });
            }
            if rule.states.is_empty() {
                rule.states.push(INITIAL_STATE.into());
            }
            for s in &rule.states {
                if s != "*" && !table.ids.contains_key(s) {
                    return Err(ConfigError::UndefinedLexerState {
                        rule: rule.name.clone(),
                        state: s.clone(),
                    });
                }
            }
            master::validate_pattern(&rule.name, &rule.pattern, &self.flags)?;
        }

        let mut ignore_by_state: HashMap<Name, std::string::String> = HashMap::new();
        for (state, chars) in &self.ignore {
            if !table.ids.contains_key(state) {
                return Err(ConfigError::UndefinedLexerState {
                    rule: "<ignore>".into(),
                    state: state.clone(),
                });
            }
            ignore_by_state
                .entry(state.clone())
                .or_default()
                .push_str(chars);
        }

        let initial_ignore = ignore_by_state
            .get(INITIAL_STATE)
            .cloned()
            .unwrap_or_default();

        let mut states = Vec::with_capacity(table.names.len());
        for (sid, sname) in table.names.iter().enumerate() {
            let inclusive = table.modes[sid] == StateMode::Inclusive;
            let applies = |rule: &LexRule<V, U>| {
                rule.states.iter().any(|s| s == "*" || s == sname)
                    || (inclusive && sid != 0 && rule.states.iter().any(|s| s == INITIAL_STATE))
            };
            let selected: Vec<MasterRule> = self
                .rules
                .iter()
                .filter(|r| applies(r))
                .map(|r| MasterRule {
                    name: r.name.clone(),
                    pattern: r.pattern.clone(),
                    has_action: r.action.is_some(),
                })
                .collect();
            if selected.is_empty() {
                return Err(ConfigError::EmptyLexerState(sname.clone()));
            }
            let ignore = match ignore_by_state.get(sname) {
                Some(chars) => chars.clone(),
                None if inclusive => initial_ignore.clone(),
                None => std::string::String::new(),
            };
            states.push(StateData {
                master: master::assemble(&selected, &self.flags)?,
                ignore,
            });
        }

        let actions = self
            .rules
            .iter()
            .filter_map(|r| r.action.clone().map(|a| (r.name.clone(), a)))
            .collect();

        let table = Rc::new(table);
        let data = Rc::new(LexerData {
            states,
            actions,
            literals: self.literals,
            on_error: self.on_error,
            on_eof: self.on_eof,
        });
        Ok(Lexer {
            data,
            ctx: LexerCtx::new(table, user),
        })
    }
}

struct StateData {
    master: MasterPattern,
    ignore: std::string::String,
}

/// Names, ids and modes of the declared lexer states. Shared between the
/// compiled data and every context so `begin` can resolve names.
pub struct StateTable {
    names: Vec<Name>,
    ids: HashMap<Name, usize>,
    modes: Vec<StateMode>,
}

struct LexerData<V, U> {
    states: Vec<StateData>,
    actions: HashMap<Name, LexAction<V, U>>,
    literals: std::string::String,
    on_error: Option<LexErrorHook<V, U>>,
    on_eof: Option<EofHook<U>>,
}

#[derive(Debug, Clone, Default)]
pub struct LexerStats {
    pub matches: usize,
    pub ignored: usize,
    pub errors: usize,
}

/// Mutable scanning state, separated from the shared compiled data so rule
/// actions can receive it by `&mut` while the master patterns stay behind
/// an `Rc`.
pub struct LexerCtx<U> {
    input: std::string::String,
    pos: usize,
    line: usize,
    state_stack: Vec<usize>,
    text: std::string::String,
    pending: std::string::String,
    /// Line and offset of the first fragment of a `more`-accumulated
    /// match; the eventual token reports this position, not that of its
    /// last fragment.
    pending_pos: Option<(usize, usize)>,
    more_flag: bool,
    user: Rc<RefCell<U>>,
    states: Rc<StateTable>,
    stats: LexerStats,
}

impl<U> LexerCtx<U> {
    fn new(states: Rc<StateTable>, user: U) -> Self {
        Self {
            input: std::string::String::new(),
            pos: 0,
            line: 1,
            state_stack: vec![0],
            text: std::string::String::new(),
            pending: std::string::String::new(),
            pending_pos: None,
            more_flag: false,
            user: Rc::new(RefCell::new(user)),
            states,
            stats: LexerStats::default(),
        }
    }

    /// Installs new input: cursor to 0, state stack back to INITIAL. The
    /// line counter is deliberately left alone.
    pub fn feed(&mut self, input: impl Into<std::string::String>) {
        self.input = input.into();
        self.pos = 0;
        self.state_stack.clear();
        self.state_stack.push(0);
        self.text.clear();
        self.pending.clear();
        self.pending_pos = None;
        self.more_flag = false;
    }

    /// Advances the cursor by `n` bytes without producing a token.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Carries the current match text over into the next token.
    pub fn more(&mut self) {
        self.more_flag = true;
    }

    pub fn begin(&mut self, state: &str) -> Result<(), LexError> {
        let id = self.resolve(state)?;
        *self.state_stack.last_mut().expect("state stack is never empty") = id;
        Ok(())
    }

    pub fn push_state(&mut self, state: &str) -> Result<(), LexError> {
        let id = self.resolve(state)?;
        self.state_stack.push(id);
        Ok(())
    }

    pub fn pop_state(&mut self) -> Result<(), LexError> {
        if self.state_stack.len() <= 1 {
            return Err(LexError::StateUnderflow);
        }
        self.state_stack.pop();
        Ok(())
    }

    fn resolve(&self, state: &str) -> Result<usize, LexError> {
        self.states
            .ids
            .get(state)
            .copied()
            .ok_or_else(|| LexError::UndefinedState(state.into()))
    }

    pub fn current_state(&self) -> &str {
        let id = *self.state_stack.last().expect("state stack is never empty");
        &self.states.names[id]
    }

    fn state_id(&self) -> usize {
        *self.state_stack.last().expect("state stack is never empty")
    }

    /// Text of the current match, including anything accumulated by `more`.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Unscanned remainder of the input.
    pub fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn set_line(&mut self, line: usize) {
        self.line = line;
    }

    /// Line numbers are user-maintained; a newline rule calls this.
    pub fn advance_line(&mut self, n: usize) {
        self.line += n;
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn user(&self) -> Ref<'_, U> {
        self.user.borrow()
    }

    pub fn user_mut(&self) -> RefMut<'_, U> {
        self.user.borrow_mut()
    }

    pub fn stats(&self) -> LexerStats {
        self.stats.clone()
    }
}

impl<U> Clone for LexerCtx<U> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            pos: self.pos,
            line: self.line,
            state_stack: self.state_stack.clone(),
            text: self.text.clone(),
            pending: self.pending.clone(),
            pending_pos: self.pending_pos,
            more_flag: self.more_flag,
            // User state stays shared between clones.
            user: Rc::clone(&self.user),
            states: Rc::clone(&self.states),
            stats: self.stats.clone(),
        }
    }
}

/// The scanning engine: compiled per-state master patterns plus a cursor.
///
/// `clone` produces an independent cursor over the same compiled data;
/// user state remains shared between the clones, which is a documented
/// limitation.
pub struct Lexer<V, U> {
    data: Rc<LexerData<V, U>>,
    ctx: LexerCtx<U>,
}

impl<V, U> std::fmt::Debug for Lexer<V, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer").finish_non_exhaustive()
    }
}

impl<V: TokenValue, U> Lexer<V, U> {
    pub fn ctx(&self) -> &LexerCtx<U> {
        &self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut LexerCtx<U> {
        &mut self.ctx
    }

    pub fn feed(&mut self, input: impl Into<std::string::String>) {
        self.ctx.feed(input);
    }

    pub fn skip(&mut self, n: usize) {
        self.ctx.skip(n);
    }

    pub fn begin(&mut self, state: &str) -> Result<(), LexError> {
        self.ctx.begin(state)
    }

    pub fn push_state(&mut self, state: &str) -> Result<(), LexError> {
        self.ctx.push_state(state)
    }

    pub fn pop_state(&mut self) -> Result<(), LexError> {
        self.ctx.pop_state()
    }

    pub fn current_state(&self) -> &str {
        self.ctx.current_state()
    }

    pub fn line(&self) -> usize {
        self.ctx.line()
    }

    pub fn offset(&self) -> usize {
        self.ctx.offset()
    }

    pub fn stats(&self) -> LexerStats {
        self.ctx.stats()
    }

    /// Produces the next token, or `None` at end of input once the EOF
    /// hook (if any) declines to supply more.
    pub fn try_next(&mut self) -> Result<Option<Token<V>>, LexError> {
        let data = Rc::clone(&self.data);
        loop {
            if self.ctx.pos >= self.ctx.input.len() {
                if let Some(hook) = &data.on_eof {
                    if let Some(chunk) = hook(&mut self.ctx) {
                        if !chunk.is_empty() {
                            self.ctx.input.push_str(&chunk);
                            continue;
                        }
                    }
                }
                return Ok(None);
            }

            let sid = self.ctx.state_id();
            let sd = &data.states[sid];
            let ch = self.ctx.input[self.ctx.pos..]
                .chars()
                .next()
                .expect("cursor is always on a char boundary");

            if sd.ignore.contains(ch) {
                self.ctx.pos += ch.len_utf8();
                self.ctx.stats.ignored += 1;
                continue;
            }

            let hit = sd
                .master
                .regex
                .captures(&self.ctx.input[self.ctx.pos..])
                .map(|caps| {
                    let m = caps.get(0).expect("whole-match group always present");
                    let name = sd
                        .master
                        .winner(&caps)
                        .expect("anchored match always names a rule");
                    (name.clone(), m.end())
                });
            if let Some((name, mlen)) = hit {
                self.ctx.stats.matches += 1;
                let start = self.ctx.pos;
                self.ctx.pos += mlen;
                if self.ctx.pending.is_empty() {
                    self.ctx.text.clear();
                } else {
                    self.ctx.text = std::mem::take(&mut self.ctx.pending);
                }
                // Accumulated tokens keep the position of their first
                // fragment.
                let (tok_line, tok_offset) = self
                    .ctx
                    .pending_pos
                    .take()
                    .unwrap_or((self.ctx.line, start));
                let matched = &self.ctx.input[start..start + mlen];
                self.ctx.text.push_str(matched);
                log::trace!(
                    "MATCHED: state={}, rule={}, text={:?}",
                    self.ctx.current_state(),
                    name,
                    self.ctx.text,
                );

                let mut token =
                    Token::from_text(name.clone(), &self.ctx.text, tok_line, tok_offset);
                match data.actions.get(&name) {
                    None => return Ok(Some(token)),
                    Some(action) => {
                        let action = Rc::clone(action);
                        let outcome = action(&mut self.ctx, &mut token)?;
                        if self.ctx.more_flag {
                            self.ctx.more_flag = false;
                            self.ctx.pending = std::mem::take(&mut self.ctx.text);
                            self.ctx.pending_pos = Some((tok_line, tok_offset));
                            continue;
                        }
                        match outcome {
                            LexOutcome::Emit => return Ok(Some(token)),
                            LexOutcome::Discard => continue,
                        }
                    }
                }
            }

            if data.literals.contains(ch) {
                let mut kind = Name::new();
                kind.push(ch);
                let token =
                    Token::from_text(kind, &self.ctx.input[self.ctx.pos..][..ch.len_utf8()], self.ctx.line, self.ctx.pos);
                self.ctx.pos += ch.len_utf8();
                return Ok(Some(token));
            }

            self.ctx.stats.errors += 1;
            let bad = &self.ctx.input[self.ctx.pos..][..ch.len_utf8()];
            let token: Token<V> = Token::from_text(ERROR_KIND, bad, self.ctx.line, self.ctx.pos);
            match &data.on_error {
                Some(hook) => {
                    let hook = Rc::clone(hook);
                    let before = self.ctx.pos;
                    hook(&mut self.ctx, &token)?;
                    if self.ctx.pos == before {
                        // The hook did not advance; guarantee progress.
                        self.ctx.pos += ch.len_utf8();
                    }
                    continue;
                }
                None => {
                    return Err(LexError::NoMatch {
                        ch,
                        line: self.ctx.line,
                        offset: self.ctx.pos,
                    })
                }
            }
        }
    }
}

impl<V, U> Clone for Lexer<V, U> {
    fn clone(&self) -> Self {
        Self {
            data: Rc::clone(&self.data),
            ctx: self.ctx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    type SLexer = Lexer<std::string::String, ()>;

    fn kinds(lexer: &mut SLexer) -> Vec<std::string::String> {
        let mut out = Vec::new();
        while let Some(t) = lexer.try_next().unwrap() {
            out.push(t.kind.to_string());
        }
        out
    }

    #[test]
    fn plain_rules_and_ignore() {
        init_logger();
        let mut lexer: SLexer = LexerSpec::new()
            .tokens(&["NUMBER", "ID"])
            .ignore(INITIAL_STATE, " \t")
            .rule("NUMBER", r"\d+")
            .rule("ID", r"[A-Za-z_]\w*")
            .build(())
            .unwrap();
        lexer.feed("abc  42");
        assert_eq!(kinds(&mut lexer), ["ID", "NUMBER"]);
        assert_eq!(lexer.stats().ignored, 2);
    }

    #[test]
    fn reserved_words_via_action() {
        init_logger();
        let mut lexer: SLexer = LexerSpec::new()
            .tokens(&["ID", "IF", "THEN"])
            .ignore(INITIAL_STATE, " ")
            .action_rule(&[], "ID", r"[A-Za-z_]\w*", |_ctx, tok: &mut Token<std::string::String>| {
                match tok.value.as_str() {
                    "if" => tok.kind = "IF".into(),
                    "then" => tok.kind = "THEN".into(),
                    _ => {}
                }
                Ok(LexOutcome::Emit)
            })
            .build(())
            .unwrap();
        lexer.feed("ifx if");
        let t1 = lexer.try_next().unwrap().unwrap();
        assert_eq!((t1.kind.as_str(), t1.value.as_str()), ("ID", "ifx"));
        let t2 = lexer.try_next().unwrap().unwrap();
        assert_eq!((t2.kind.as_str(), t2.value.as_str()), ("IF", "if"));
        assert!(lexer.try_next().unwrap().is_none());
    }

    #[test]
    fn literals_after_named_patterns() {
        init_logger();
        let mut lexer: SLexer = LexerSpec::new()
            .tokens(&["NUMBER"])
            .literals("+-()")
            .rule("NUMBER", r"\d+")
            .build(())
            .unwrap();
        lexer.feed("(1+2)");
        assert_eq!(kinds(&mut lexer), ["(", "NUMBER", "+", "NUMBER", ")"]);
    }

    #[test]
    fn newline_rule_advances_line() {
        init_logger();
        let mut lexer: SLexer = LexerSpec::new()
            .tokens(&["WORD"])
            .ignore(INITIAL_STATE, " ")
            .rule("WORD", r"[a-z]+")
            .action_rule(&[], "newline", r"\n+", |ctx: &mut LexerCtx<()>, tok: &mut Token<std::string::String>| {
                ctx.advance_line(tok.value.len());
                Ok(LexOutcome::Discard)
            })
            .build(())
            .unwrap();
        lexer.feed("one\n\ntwo");
        let t1 = lexer.try_next().unwrap().unwrap();
        assert_eq!(t1.line, 1);
        let t2 = lexer.try_next().unwrap().unwrap();
        assert_eq!(t2.line, 3);
        assert_eq!(t2.offset, 5);
    }

    #[test]
    fn error_hook_skips_bad_input() {
        init_logger();
        let mut lexer: SLexer = LexerSpec::new()
            .tokens(&["NUMBER"])
            .rule("NUMBER", r"\d+")
            .on_error(|ctx, _tok| {
                ctx.skip(1);
                Ok(())
            })
            .build(())
            .unwrap();
        lexer.feed("?!3");
        let t = lexer.try_next().unwrap().unwrap();
        assert_eq!(t.value, "3");
        assert_eq!(lexer.stats().errors, 2);
    }

    #[test]
    fn missing_error_hook_is_fatal() {
        init_logger();
        let mut lexer: SLexer = LexerSpec::new()
            .tokens(&["NUMBER"])
            .rule("NUMBER", r"\d+")
            .build(())
            .unwrap();
        lexer.feed("?");
        assert!(matches!(
            lexer.try_next(),
            Err(LexError::NoMatch { ch: '?', .. })
        ));
    }

    #[test]
    fn eof_hook_supplies_more_input() {
        init_logger();
        let fed = Rc::new(RefCell::new(false));
        let fed2 = Rc::clone(&fed);
        let mut lexer: SLexer = LexerSpec::new()
            .tokens(&["NUMBER"])
            .rule("NUMBER", r"\d+")
            .on_eof(move |_ctx| {
                if *fed2.borrow() {
                    None
                } else {
                    *fed2.borrow_mut() = true;
                    Some("99".to_owned())
                }
            })
            .ignore(INITIAL_STATE, " ")
            .build(())
            .unwrap();
        lexer.feed("1");
        // A match never extends across a refill; the hook's chunk is
        // scanned as fresh input.
        assert_eq!(lexer.try_next().unwrap().unwrap().value, "1");
        assert_eq!(lexer.try_next().unwrap().unwrap().value, "99");
        assert!(lexer.try_next().unwrap().is_none());
    }

    #[test]
    fn exclusive_state_with_nested_braces() {
        init_logger();
        // Collects a brace-delimited block as one CCODE token, handling
        // nested braces and string literals containing braces.
        struct Depth {
            braces: usize,
        }
        let mut lexer: Lexer<std::string::String, Depth> = LexerSpec::new()
            .tokens(&["CCODE", "WORD"])
            .ignore(INITIAL_STATE, " ")
            .state("ccode", StateMode::Exclusive)
            .rule("WORD", r"[a-z]+")
            .action_rule(&[], "ccstart", r"\{", |ctx: &mut LexerCtx<Depth>, _tok| {
                ctx.user_mut().braces = 1;
                ctx.begin("ccode").map_err(|e| UserActionError::Other(Box::new(e)))?;
                ctx.more();
                Ok(LexOutcome::Discard)
            })
            .action_rule(&["ccode"], "cclbrace", r"\{", |ctx, _tok| {
                ctx.user_mut().braces += 1;
                ctx.more();
                Ok(LexOutcome::Discard)
            })
            .action_rule(&["ccode"], "ccrbrace", r"\}", |ctx, tok| {
                ctx.user_mut().braces -= 1;
                if ctx.user_mut().braces == 0 {
                    tok.kind = "CCODE".into();
                    ctx.begin(INITIAL_STATE)
                        .map_err(|e| UserActionError::Other(Box::new(e)))?;
                    Ok(LexOutcome::Emit)
                } else {
                    ctx.more();
                    Ok(LexOutcome::Discard)
                }
            })
            .action_rule(&["ccode"], "ccstring", r#""([^"\\]|\\.)*""#, |ctx, _tok| {
                ctx.more();
                Ok(LexOutcome::Discard)
            })
            .action_rule(&["ccode"], "cctext", r#"[^{}"]+"#, |ctx, _tok| {
                ctx.more();
                Ok(LexOutcome::Discard)
            })
            .build(Depth { braces: 0 })
            .unwrap();

        lexer.feed(r#"pre { a { "}" } b } post"#);
        let t = lexer.try_next().unwrap().unwrap();
        assert_eq!(t.kind, "WORD");
        let t = lexer.try_next().unwrap().unwrap();
        assert_eq!(t.kind, "CCODE");
        assert_eq!(t.value, r#"{ a { "}" } b }"#);
        // The accumulated token is positioned at its opening brace, not
        // at the fragment that finished it.
        assert_eq!(t.offset, 4);
        assert_eq!(t.line, 1);
        let t = lexer.try_next().unwrap().unwrap();
        assert_eq!((t.kind.as_str(), t.value.as_str()), ("WORD", "post"));
        assert_eq!(t.offset, 20);
    }

    #[test]
    fn inclusive_state_inherits_initial_rules() {
        init_logger();
        let mut lexer: SLexer = LexerSpec::new()
            .tokens(&["NUMBER", "COLON"])
            .state("extra", StateMode::Inclusive)
            .rule("NUMBER", r"\d+")
            .action_rule(&["extra"], "COLON", r":", |ctx, _tok| {
                ctx.begin(INITIAL_STATE)
                    .map_err(|e| UserActionError::Other(Box::new(e)))?;
                Ok(LexOutcome::Emit)
            })
            .build(())
            .unwrap();
        lexer.feed("7:");
        lexer.ctx_mut().begin("extra").unwrap();
        assert_eq!(kinds(&mut lexer), ["NUMBER", "COLON"]);
    }

    #[test]
    fn undefined_state_is_a_config_error() {
        let err = LexerSpec::<std::string::String, ()>::new()
            .tokens(&["A"])
            .rule_for(&["nosuch"], "A", "a")
            .build(())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UndefinedLexerState { .. }));
    }

    #[test]
    fn duplicate_rule_is_a_config_error() {
        let err = LexerSpec::<std::string::String, ()>::new()
            .tokens(&["A"])
            .rule("A", "a")
            .rule("A", "aa")
            .build(())
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRule(_)));
    }

    #[test]
    fn clones_share_user_state_but_not_cursor() {
        init_logger();
        struct Count {
            seen: usize,
        }
        let mut lexer: Lexer<std::string::String, Count> = LexerSpec::new()
            .tokens(&["NUMBER"])
            .ignore(INITIAL_STATE, " ")
            .action_rule(&[], "NUMBER", r"\d+", |ctx: &mut LexerCtx<Count>, _tok| {
                ctx.user_mut().seen += 1;
                Ok(LexOutcome::Emit)
            })
            .build(Count { seen: 0 })
            .unwrap();
        lexer.feed("1 2 3");
        lexer.try_next().unwrap();

        let mut copy = lexer.clone();
        lexer.try_next().unwrap();
        copy.try_next().unwrap();
        // Both cursors advanced independently from the same point.
        assert_eq!(lexer.ctx().offset(), copy.ctx().offset());
        // The user count saw every action from both clones.
        assert_eq!(lexer.ctx().user().seen, 3);
    }
}
