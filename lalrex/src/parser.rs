//! Shift-reduce parse engine and the grammar-spec binding layer.
//!
//! The engine drives a single stack of (state, value, position) records
//! over the frozen [`LrTables`]: defaulted states reduce without fetching
//! a lookahead, rule actions see their rhs through a one-indexed
//! [`Reduction`] view, and errors run the classical recovery machine built
//! around the reserved `error` terminal.

use crate::error::{ConfigError, Diagnostic, LexError, ParseError, UserActionError};
use crate::grammar::{Assoc, Grammar, SourceLoc};
use crate::lalr::{LrAction, LrTables};
use crate::lexer::Lexer;
use crate::report;
use crate::token::{Name, Token, TokenValue, ERROR_KIND};
use std::io::{self, Write};
use std::rc::Rc;

/// Number of tokens that must be shifted before the error handler may be
/// called again.
const ERROR_WINDOW: usize = 3;

/// Anything that can feed tokens to the engine. The lexer implements it;
/// tests can drive the parser from plain vectors.
pub trait TokenStream<V> {
    fn try_next(&mut self) -> Result<Option<Token<V>>, LexError>;
}

impl<V: TokenValue, U> TokenStream<V> for Lexer<V, U> {
    fn try_next(&mut self) -> Result<Option<Token<V>>, LexError> {
        Lexer::try_next(self)
    }
}

/// Token stream over a pre-built vector.
pub struct VecStream<V> {
    tokens: std::vec::IntoIter<Token<V>>,
}

impl<V> VecStream<V> {
    pub fn new(tokens: Vec<Token<V>>) -> Self {
        Self {
            tokens: tokens.into_iter(),
        }
    }
}

impl<V: TokenValue> TokenStream<V> for VecStream<V> {
    fn try_next(&mut self) -> Result<Option<Token<V>>, LexError> {
        Ok(self.tokens.next())
    }
}

#[derive(Debug, Clone)]
struct SymEntry<V> {
    kind: Name,
    value: V,
    line: usize,
    offset: usize,
    end_line: usize,
    end_offset: usize,
}

/// One-indexed view over the symbols of the rule being reduced.
///
/// Index 1 is the leftmost rhs symbol; the result slot is written through
/// [`Reduction::set`]. Negative indices peek at values already on the
/// stack to the left of the rule, which is what embedded mid-rule actions
/// use.
pub struct Reduction<'a, V> {
    lhs: &'a Name,
    rhs: &'a mut [SymEntry<V>],
    below: &'a [SymEntry<V>],
    result: &'a mut V,
}

impl<'a, V: TokenValue> Reduction<'a, V> {
    pub fn lhs(&self) -> &str {
        self.lhs
    }

    /// Number of rhs symbols.
    pub fn len(&self) -> usize {
        self.rhs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }

    fn entry(&self, i: isize) -> &SymEntry<V> {
        if i >= 1 {
            &self.rhs[(i - 1) as usize]
        } else if i < 0 {
            let k = (-i) as usize;
            &self.below[self.below.len() - k]
        } else {
            panic!("index 0 is the result slot; use set()")
        }
    }

    /// Returns the value at `i`: positive for rhs symbols, negative for
    /// stack records left of the rule.
    /// Panics on index 0 or out-of-range indices.
    pub fn get(&self, i: isize) -> &V {
        &self.entry(i).value
    }

    /// Moves the value at rhs position `i` out, leaving a default.
    /// Panics if `i` is not in `1..=len()`.
    pub fn take(&mut self, i: usize) -> V {
        assert!(i >= 1 && i <= self.rhs.len(), "take index out of range");
        std::mem::take(&mut self.rhs[i - 1].value)
    }

    pub fn kind(&self, i: isize) -> &str {
        &self.entry(i).kind
    }

    pub fn set(&mut self, value: V) {
        *self.result = value;
    }

    pub fn line(&self, i: isize) -> usize {
        self.entry(i).line
    }

    pub fn offset(&self, i: isize) -> usize {
        self.entry(i).offset
    }

    pub fn end_line(&self, i: isize) -> usize {
        self.entry(i).end_line
    }

    pub fn end_offset(&self, i: isize) -> usize {
        self.entry(i).end_offset
    }
}

/// What the parse-error handler wants the engine to do.
#[derive(Debug)]
pub enum Recovery<V> {
    /// No opinion: inject the synthetic `error` token.
    None,
    /// Clear recovery mode and keep the current lookahead.
    Ok,
    /// Clear recovery mode and continue with this lookahead instead.
    Replace(Token<V>),
    /// Discard the stack and restart from the initial state.
    Restart,
}

pub type RuleAction<V, U> =
    Rc<dyn Fn(&mut Reduction<'_, V>, &mut U) -> Result<(), UserActionError>>;
pub type ParseErrorHook<V, U> = Rc<dyn Fn(Option<&Token<V>>, &mut U) -> Recovery<V>>;

/// One production of a [`GrammarSpec`].
pub struct ProdSpec<V, U> {
    pub lhs: Name,
    pub rhs: Vec<Name>,
    pub action: Option<RuleAction<V, U>>,
    /// Explicit `%prec` terminal; the rhs may embed `%prec TERM` instead.
    pub prec: Option<Name>,
    pub loc: SourceLoc,
}

/// Declarative description of a grammar, consumed by
/// [`GrammarSpec::build`] to produce a ready [`Parser`].
pub struct GrammarSpec<V, U> {
    tokens: Vec<Name>,
    start: Option<Name>,
    precedence: Vec<(Assoc, Vec<Name>)>,
    productions: Vec<ProdSpec<V, U>>,
    on_error: Option<ParseErrorHook<V, U>>,
}

impl<V: TokenValue, U> Default for GrammarSpec<V, U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: TokenValue, U> GrammarSpec<V, U> {
    pub fn new() -> Self {
        Self {
            tokens: Vec::new(),
            start: None,
            precedence: Vec::new(),
            productions: Vec::new(),
            on_error: None,
        }
    }

    pub fn tokens(mut self, names: &[&str]) -> Self {
        self.tokens.extend(names.iter().map(|n| Name::from(*n)));
        self
    }

    pub fn start(mut self, name: &str) -> Self {
        self.start = Some(name.into());
        self
    }

    /// Appends one precedence level, lowest first.
    pub fn prec(mut self, assoc: Assoc, terms: &[&str]) -> Self {
        self.precedence
            .push((assoc, terms.iter().map(|t| Name::from(*t)).collect()));
        self
    }

    pub fn prod(mut self, lhs: &str, rhs: &[&str]) -> Self {
        self.productions.push(ProdSpec {
            lhs: lhs.into(),
            rhs: rhs.iter().map(|s| Name::from(*s)).collect(),
            action: None,
            prec: None,
            loc: SourceLoc::default(),
        });
        self
    }

    pub fn prod_with(
        mut self,
        lhs: &str,
        rhs: &[&str],
        action: impl Fn(&mut Reduction<'_, V>, &mut U) -> Result<(), UserActionError> + 'static,
    ) -> Self {
        self.productions.push(ProdSpec {
            lhs: lhs.into(),
            rhs: rhs.iter().map(|s| Name::from(*s)).collect(),
            action: Some(Rc::new(action)),
            prec: None,
            loc: SourceLoc::default(),
        });
        self
    }

    /// Pushes a fully-specified production (explicit `%prec`, source
    /// location).
    pub fn production(mut self, spec: ProdSpec<V, U>) -> Self {
        self.productions.push(spec);
        self
    }

    pub fn on_error(
        mut self,
        hook: impl Fn(Option<&Token<V>>, &mut U) -> Recovery<V> + 'static,
    ) -> Self {
        self.on_error = Some(Rc::new(hook));
        self
    }

    /// Runs the whole pipeline: grammar construction and validation, LR
    /// items, lookaheads, table fill. Fatal problems come back as
    /// [`ConfigError`]; conflicts and unused-symbol findings end up in the
    /// parser's diagnostics.
    pub fn build(self, user: U) -> Result<Parser<V, U>, ConfigError> {
        let mut g = Grammar::new(&self.tokens)?;
        for (level, (assoc, terms)) in self.precedence.iter().enumerate() {
            for t in terms {
                g.set_precedence(t, *assoc, level + 1)?;
            }
        }

        let mut actions: Vec<Option<RuleAction<V, U>>> = vec![None];
        for p in &self.productions {
            let mut rhs: Vec<&str> = p.rhs.iter().map(|s| s.as_str()).collect();
            if let Some(prec) = &p.prec {
                rhs.push("%prec");
                rhs.push(prec);
            }
            let number = g.add_production(&p.lhs, &rhs, p.loc.clone())?;
            debug_assert_eq!(number, actions.len());
            actions.push(p.action.clone());
        }
        g.set_start(self.start.as_deref())?;

        if let Some((symbol, pn)) = g.undefined_symbols().into_iter().next() {
            let p = g.production(pn);
            return Err(ConfigError::UndefinedSymbol {
                symbol,
                lhs: p.lhs.clone(),
                line: p.loc.line,
            });
        }
        if let Some(sym) = g.infinite_cycles().into_iter().next() {
            return Err(ConfigError::InfiniteRecursion(sym));
        }

        let mut diagnostics = Vec::new();
        for t in g.unused_terminals() {
            diagnostics.push(Diagnostic::warning(format!(
                "token {:?} defined, but not used",
                t
            )));
        }
        for n in g.unreachable() {
            diagnostics.push(Diagnostic::warning(format!(
                "symbol {:?} is unreachable",
                n
            )));
        }
        for (t, assoc) in g.unused_precedence() {
            diagnostics.push(Diagnostic::warning(format!(
                "precedence rule {:?} defined for unused symbol {:?}",
                assoc.as_str(),
                t
            )));
        }

        g.build_lritems();
        g.compute_first();
        g.compute_follow();
        let tables = LrTables::build(&g);

        if !tables.sr_conflicts.is_empty() {
            diagnostics.push(Diagnostic::warning(format!(
                "{} shift/reduce conflicts",
                tables.sr_conflicts.len()
            )));
        }
        for c in &tables.rr_conflicts {
            diagnostics.push(Diagnostic::warning(format!(
                "reduce/reduce conflict in state {} on {:?} resolved using rule {} ({})",
                c.state,
                c.token,
                c.chosen,
                g.production(c.chosen)
            )));
        }

        Ok(Parser {
            grammar: Rc::new(g),
            tables: Rc::new(tables),
            actions: Rc::new(actions),
            on_error: self.on_error,
            user,
            tracking: false,
            use_defaults: true,
            error_flag: false,
            stats: ParserStats::default(),
            diagnostics,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParserStats {
    pub tokens: usize,
    pub shifts: usize,
    pub reductions: usize,
    pub errors: usize,
}

/// A ready-to-run parser: frozen grammar and tables behind `Rc`, the rule
/// actions, the error hook and the user state.
pub struct Parser<V, U> {
    grammar: Rc<Grammar>,
    tables: Rc<LrTables>,
    actions: Rc<Vec<Option<RuleAction<V, U>>>>,
    on_error: Option<ParseErrorHook<V, U>>,
    user: U,
    tracking: bool,
    use_defaults: bool,
    error_flag: bool,
    stats: ParserStats,
    diagnostics: Vec<Diagnostic>,
}

impl<V, U> std::fmt::Debug for Parser<V, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser").finish_non_exhaustive()
    }
}

impl<V: TokenValue, U> Parser<V, U> {
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn tables(&self) -> &LrTables {
        &self.tables
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn stats(&self) -> ParserStats {
        self.stats.clone()
    }

    pub fn user(&self) -> &U {
        &self.user
    }

    pub fn user_mut(&mut self) -> &mut U {
        &mut self.user
    }

    /// Track start/end positions on reductions too, not just terminals.
    pub fn set_tracking(&mut self, on: bool) {
        self.tracking = on;
    }

    /// Turns off the defaulted-state optimization. Needed when mid-rule
    /// actions must observe the lookahead.
    pub fn disable_defaulted_states(&mut self) {
        self.use_defaults = false;
    }

    /// True when the previous `parse` returned `Ok(None)` after failed
    /// recovery.
    pub fn had_error(&self) -> bool {
        self.error_flag
    }

    /// Writes the human-readable tables dump.
    pub fn write_tables<W: Write>(&self, out: &mut W) -> io::Result<()> {
        report::write_tables(out, &self.grammar, &self.tables)
    }

    /// Parses one unit from the stream. `Ok(None)` means the parse was
    /// abandoned after error recovery failed; `Err` means a hard failure
    /// (lexer error, unknown token kind, or a rule action that raised).
    pub fn parse<S: TokenStream<V>>(&mut self, stream: &mut S) -> Result<Option<V>, ParseError> {
        let grammar = Rc::clone(&self.grammar);
        let tables = Rc::clone(&self.tables);
        let actions = Rc::clone(&self.actions);

        self.error_flag = false;
        let mut statestack: Vec<usize> = vec![0];
        let mut symstack: Vec<SymEntry<V>> = Vec::new();
        let mut lookahead: Option<Token<V>> = None;
        let mut lookaheadstack: Vec<Token<V>> = Vec::new();
        let mut errorcount: usize = 0;
        let mut state: usize = 0;
        let mut last_line: usize = 1;
        let mut last_offset: usize = 0;

        loop {
            let action = match tables.default_reduction(state) {
                Some(p) if self.use_defaults => LrAction::Reduce(p),
                _ => {
                    if lookahead.is_none() {
                        lookahead = match lookaheadstack.pop() {
                            Some(t) => Some(t),
                            None => match stream.try_next()? {
                                Some(t) => {
                                    self.stats.tokens += 1;
                                    last_line = t.line;
                                    last_offset = t.offset;
                                    Some(t)
                                }
                                None => Some(Token::end_marker(last_line, last_offset)),
                            },
                        };
                    }
                    let la = lookahead.as_ref().expect("lookahead was just filled");
                    if log::log_enabled!(log::Level::Trace) {
                        dump_state(&symstack, &statestack, la);
                    }
                    let col = tables
                        .sym_id(&la.kind)
                        .ok_or_else(|| ParseError::UnknownToken(la.kind.clone()))?;
                    tables.action(state, col)
                }
            };

            match action {
                LrAction::Shift(s) => {
                    let tok = lookahead.take().expect("shift consumes the lookahead");
                    log::trace!("shift {:?}, go to state {}", tok.kind, s);
                    symstack.push(SymEntry {
                        kind: tok.kind,
                        value: tok.value,
                        line: tok.line,
                        offset: tok.offset,
                        end_line: tok.line,
                        end_offset: tok.offset,
                    });
                    statestack.push(s);
                    state = s;
                    self.stats.shifts += 1;
                    if errorcount > 0 {
                        errorcount -= 1;
                    }
                }

                LrAction::Reduce(p) => {
                    let prod = grammar.production(p);
                    let plen = prod.rhs.len();
                    log::trace!("reduce using rule {} ({})", p, prod);
                    self.stats.reductions += 1;
                    let act = actions[p].clone();
                    let mut result = V::default();

                    if plen > 0 {
                        let split = symstack.len() - plen;
                        let mut rhs: Vec<SymEntry<V>> = symstack.split_off(split);
                        let (line, offset) = (rhs[0].line, rhs[0].offset);
                        let (end_line, end_offset) = if self.tracking {
                            (rhs[plen - 1].end_line, rhs[plen - 1].end_offset)
                        } else {
                            (line, offset)
                        };

                        let mut failed = false;
                        match &act {
                            Some(action) => {
                                let mut red = Reduction {
                                    lhs: &prod.lhs,
                                    rhs: &mut rhs,
                                    below: &symstack,
                                    result: &mut result,
                                };
                                match action(&mut red, &mut self.user) {
                                    Ok(()) => {}
                                    Err(UserActionError::Syntax) => failed = true,
                                    Err(e) => return Err(ParseError::Action(e)),
                                }
                            }
                            None => {
                                // Classic default: the value of the first
                                // rhs symbol.
                                result = std::mem::take(&mut rhs[0].value);
                            }
                        }

                        if failed {
                            // A rule action signalled a syntax error: the
                            // most recently shifted symbol is treated as
                            // the culprit and `error` becomes the
                            // lookahead. The error handler is not called.
                            let last = rhs.pop().expect("plen > 0");
                            for e in rhs.drain(..) {
                                symstack.push(e);
                            }
                            statestack.pop();
                            state = *statestack.last().expect("s0 is never popped");
                            if let Some(la) = lookahead.take() {
                                lookaheadstack.push(la);
                            }
                            lookahead = Some(Token::new(
                                ERROR_KIND,
                                V::default(),
                                last.line,
                                last.offset,
                            ));
                            errorcount = ERROR_WINDOW;
                            continue;
                        }

                        statestack.truncate(statestack.len() - plen);
                        let top = *statestack.last().expect("s0 is never popped");
                        let col = tables
                            .sym_id(&prod.lhs)
                            .expect("every nonterminal has a column");
                        let LrAction::Goto(ns) = tables.action(top, col) else {
                            return Err(ParseError::MissingGoto {
                                state: top,
                                symbol: prod.lhs.clone(),
                            });
                        };
                        symstack.push(SymEntry {
                            kind: prod.lhs.clone(),
                            value: result,
                            line,
                            offset,
                            end_line,
                            end_offset,
                        });
                        statestack.push(ns);
                        state = ns;
                    } else {
                        let (line, offset) = if self.tracking {
                            symstack
                                .last()
                                .map(|t| (t.end_line, t.end_offset))
                                .unwrap_or((0, 0))
                        } else {
                            (0, 0)
                        };

                        let mut failed = false;
                        if let Some(action) = &act {
                            let mut red = Reduction {
                                lhs: &prod.lhs,
                                rhs: &mut [],
                                below: &symstack,
                                result: &mut result,
                            };
                            match action(&mut red, &mut self.user) {
                                Ok(()) => {}
                                Err(UserActionError::Syntax) => failed = true,
                                Err(e) => return Err(ParseError::Action(e)),
                            }
                        }

                        if failed {
                            let popped = symstack.pop();
                            if popped.is_some() {
                                statestack.pop();
                            }
                            state = *statestack.last().expect("s0 is never popped");
                            if let Some(la) = lookahead.take() {
                                lookaheadstack.push(la);
                            }
                            let (l, o) = popped.map(|e| (e.line, e.offset)).unwrap_or((0, 0));
                            lookahead = Some(Token::new(ERROR_KIND, V::default(), l, o));
                            errorcount = ERROR_WINDOW;
                            continue;
                        }

                        let top = *statestack.last().expect("s0 is never popped");
                        let col = tables
                            .sym_id(&prod.lhs)
                            .expect("every nonterminal has a column");
                        let LrAction::Goto(ns) = tables.action(top, col) else {
                            return Err(ParseError::MissingGoto {
                                state: top,
                                symbol: prod.lhs.clone(),
                            });
                        };
                        symstack.push(SymEntry {
                            kind: prod.lhs.clone(),
                            value: result,
                            line,
                            offset,
                            end_line: line,
                            end_offset: offset,
                        });
                        statestack.push(ns);
                        state = ns;
                    }
                }

                LrAction::Accept => {
                    log::trace!("accept");
                    debug_assert_eq!(symstack.len(), 1);
                    let top = symstack.pop().expect("accept with a result on the stack");
                    return Ok(Some(top.value));
                }

                LrAction::Error => {
                    log::trace!(
                        "error on {:?} in state {}",
                        lookahead.as_ref().map(|t| t.kind.as_str()),
                        state
                    );
                    if errorcount == 0 {
                        errorcount = ERROR_WINDOW;
                        self.stats.errors += 1;
                        let is_end = lookahead.as_ref().map(|t| t.is_end()).unwrap_or(true);
                        if let Some(hook) = &self.on_error {
                            let hook = Rc::clone(hook);
                            let errtoken = if is_end { None } else { lookahead.as_ref() };
                            match hook(errtoken, &mut self.user) {
                                Recovery::None => {}
                                Recovery::Ok => {
                                    errorcount = 0;
                                    continue;
                                }
                                Recovery::Replace(tok) => {
                                    errorcount = 0;
                                    lookahead = Some(tok);
                                    continue;
                                }
                                Recovery::Restart => {
                                    // Only the stack is discarded; the
                                    // current lookahead is retried from
                                    // the initial state.
                                    symstack.clear();
                                    statestack.clear();
                                    statestack.push(0);
                                    state = 0;
                                    continue;
                                }
                            }
                        } else if let Some(la) = &lookahead {
                            if la.is_end() {
                                log::warn!("syntax error at end of input");
                            } else {
                                log::warn!("syntax error at line {}, token {:?}", la.line, la.kind);
                            }
                        }
                    } else {
                        errorcount = ERROR_WINDOW;
                    }

                    let la_is_error = lookahead.as_ref().map(|t| t.is_error()).unwrap_or(false);
                    if !la_is_error {
                        if symstack
                            .last()
                            .map(|s| s.kind == ERROR_KIND)
                            .unwrap_or(false)
                        {
                            // `error` was already shifted: discard input
                            // tokens until one fits. End of input cannot
                            // be discarded.
                            if lookahead.as_ref().map(|t| t.is_end()).unwrap_or(false) {
                                self.error_flag = true;
                                return Ok(None);
                            }
                            log::trace!(
                                "discarding {:?}",
                                lookahead.as_ref().map(|t| t.kind.as_str())
                            );
                            lookahead = None;
                            continue;
                        }
                        // Turn the offending lookahead into the synthetic
                        // `error` token. End of input goes through the
                        // same machinery, so a grammar can recover via an
                        // `error` production at EOF.
                        let saved = lookahead.take().expect("lookahead present on error");
                        let err =
                            Token::new(ERROR_KIND, V::default(), saved.line, saved.offset);
                        lookaheadstack.push(saved);
                        lookahead = Some(err);
                    } else if symstack.pop().is_some() {
                        // Lookahead is already `error` and this state does
                        // not accept it: pop one record and retry.
                        statestack.pop();
                        state = *statestack.last().expect("s0 is never popped");
                    } else {
                        // Stack fully unwound with no state accepting
                        // `error`. With end-of-input as the offending
                        // token there is nothing left to scan; otherwise
                        // drop the token and restart from the initial
                        // state.
                        if lookaheadstack.last().map(|t| t.is_end()).unwrap_or(false) {
                            self.error_flag = true;
                            return Ok(None);
                        }
                        lookaheadstack.pop();
                        lookahead = None;
                        state = *statestack.last().expect("s0 is never popped");
                    }
                }

                LrAction::Goto(_) => unreachable!("goto looked up in a terminal column"),
            }
        }
    }
}

fn dump_state<V: TokenValue>(symstack: &[SymEntry<V>], statestack: &[usize], incoming: &Token<V>) {
    let mut output = std::string::String::new();
    for (i, st) in statestack.iter().enumerate() {
        let sym = if i == 0 {
            "$"
        } else {
            symstack[i - 1].kind.as_str()
        };
        output.push_str(&format!("<{}> {}  ", st, sym));
    }
    output.push_str(&format!("<-  {:?}", incoming.kind));
    log::trace!("{}", output);
}
